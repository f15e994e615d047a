use std::fmt::Write as _;

use kbload_core::scenario::{CellReport, MonitorLogs, PhaseReport, ProcessLog};
use kbload_core::stats::{DeltaSummary, IterationAverage, Summary};
use kbload_core::{BenchmarkReport, StressReport};

use super::format::*;
use crate::output::BaselineSection;

pub(crate) fn render_benchmark(report: &BenchmarkReport, baseline: Option<&BaselineSection>) -> String {
    let mut out = String::new();

    out.push_str("summary: benchmark\n");
    render_cells(&report.cells, &mut out);

    if !report.batch_sizes.is_empty() {
        out.push_str("batch sizes\n");
        for b in &report.batch_sizes {
            render_average(&format!("batch={} ingest", b.batch_size), &b.ingest, &mut out);
            if let Some(search) = &b.search {
                render_average(&format!("batch={} search", b.batch_size), search, &mut out);
            }
        }
        out.push('\n');
    }

    render_monitors(&report.monitors, &mut out);

    if let Some(section) = baseline {
        render_baseline(section, &mut out);
    }

    out
}

pub(crate) fn render_stress(report: &StressReport) -> String {
    let mut out = String::new();

    out.push_str("summary: stress\n");
    if !report.data_volume.is_empty() {
        out.push_str("data volume\n");
        render_cells(&report.data_volume, &mut out);
    }
    if !report.concurrency.is_empty() {
        out.push_str("concurrency\n");
        render_cells(&report.concurrency, &mut out);
    }

    for s in &report.skipped {
        writeln!(out, "skipped: {} ({})", s.cell, s.reason).ok();
    }
    for f in &report.failure_points {
        writeln!(out, "failure_point: {}: {}", f.cell, f.reason).ok();
    }

    match report.saturation_concurrency {
        Some(users) => writeln!(out, "saturation: users={users}").ok(),
        None => writeln!(out, "saturation: none").ok(),
    };
    match &report.degradation {
        Some(d) => writeln!(
            out,
            "degradation: records={} drop={:.1}%",
            d.level, d.drop_pct
        )
        .ok(),
        None => writeln!(out, "degradation: none").ok(),
    };
    out.push('\n');

    render_monitors(&report.monitors, &mut out);
    out
}

fn render_cells(cells: &[CellReport], out: &mut String) {
    for cell in cells {
        writeln!(
            out,
            "cell: {} ({})",
            cell.cell,
            format_ms((cell.finished_at - cell.started_at).max(0.0) * 1000.0)
        )
        .ok();
        write!(
            out,
            "  resource: create={} drop={}",
            format_duration(cell.setup_time),
            format_duration(cell.teardown_time)
        )
        .ok();
        if let Some(rows) = cell.row_count {
            write!(out, " rows={rows}").ok();
        }
        out.push('\n');
        for phase in &cell.phases {
            render_phase(phase, out);
        }
        if let Some(reason) = &cell.stop_reason {
            writeln!(out, "  stop: {reason}").ok();
        }
        out.push('\n');
    }
}

fn render_phase(phase: &PhaseReport, out: &mut String) {
    let s = &phase.summary;
    writeln!(
        out,
        "  {}: ops={} (failed {}) success={} concurrency={} policy={}",
        phase.kind,
        s.total,
        s.failures,
        format_pct(s.success_rate),
        phase.concurrency,
        phase.policy
    )
    .ok();
    render_throughput(s, out);

    if let Some(d) = &s.execution_time {
        writeln!(
            out,
            "    latency = median={} p95={} p99={} mean={} stdev={} max={} (n={})",
            format_ms(d.median),
            format_ms(d.p95),
            format_ms(d.p99),
            format_ms(d.mean),
            format_ms(d.stdev),
            format_ms(d.max),
            d.count
        )
        .ok();
    } else {
        out.push_str("    latency: n/a\n");
    }

    if let Some(d) = &s.target_delta {
        render_delta("target", d, out);
    }
    if let Some(d) = &s.driver_delta {
        render_delta("driver", d, out);
    }

    for e in &s.errors {
        writeln!(out, "    error x{}: {}", e.count, e.message).ok();
    }
}

fn render_throughput(s: &Summary, out: &mut String) {
    writeln!(
        out,
        "    throughput = ops/s={} aggregate_ops/s={} records/s={} bytes/s={} wall={}",
        format_rate(s.throughput.ops_per_sec),
        format_rate(s.throughput.aggregate_ops_per_sec),
        format_rate(s.throughput.records_per_sec),
        format_bytes(s.throughput.bytes_per_sec),
        format_duration(s.wall_time)
    )
    .ok();
}

fn render_delta(name: &str, d: &DeltaSummary, out: &mut String) {
    writeln!(
        out,
        "    {name} delta = cpu={:+.1}% rss={:+.2}MB fds={:+.1} conns={:+.1} io_read={:.2}MB io_write={:.2}MB (n={})",
        d.cpu_percent.mean,
        d.rss_mb.mean,
        d.fds.mean,
        d.connections.mean,
        d.io_read_mb.mean,
        d.io_write_mb.mean,
        d.samples
    )
    .ok();
}

fn render_average(label: &str, avg: &IterationAverage, out: &mut String) {
    writeln!(
        out,
        "  {label}: ops/s={}±{} records/s={}±{} mean={}±{} success={} (iterations {})",
        format_rate(avg.aggregate_ops_per_sec.mean),
        format_rate(avg.aggregate_ops_per_sec.stdev),
        format_rate(avg.records_per_sec.mean),
        format_rate(avg.records_per_sec.stdev),
        format_ms(avg.mean_latency_ms.mean),
        format_ms(avg.mean_latency_ms.stdev),
        format_pct(avg.success_rate.mean),
        avg.iterations
    )
    .ok();
}

fn render_monitors(logs: &MonitorLogs, out: &mut String) {
    out.push_str("monitors\n");
    render_process("target", &logs.target, out);
    render_process("driver", &logs.driver, out);
    out.push('\n');
}

fn render_process(name: &str, log: &ProcessLog, out: &mut String) {
    let pa = &log.peak_average;
    write!(
        out,
        "  {name} pid={}: samples={} cpu peak={:.1}% avg={:.1}% rss peak={:.1}MB avg={:.1}MB",
        log.pid,
        pa.samples,
        pa.peak_cpu_percent,
        pa.avg_cpu_percent,
        pa.peak_rss_mb,
        pa.avg_rss_mb
    )
    .ok();
    if let Some(reason) = &log.stop_reason {
        write!(out, " sampler_stopped={reason}").ok();
    }
    out.push('\n');
}

fn render_baseline(section: &BaselineSection, out: &mut String) {
    if section.baseline.label.is_empty() {
        out.push_str("baseline comparison\n");
    } else {
        writeln!(out, "baseline comparison: {}", section.baseline.label).ok();
    }
    for c in &section.comparisons {
        writeln!(
            out,
            "  {}: current={:.3} baseline={:.3} change={} {}",
            c.metric,
            c.change.current,
            c.change.baseline,
            format_signed_pct(c.change.percent_change),
            c.change.status
        )
        .ok();
    }
    if section.regressed {
        out.push_str("  regressed: yes\n");
    }
}
