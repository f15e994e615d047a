use std::sync::Arc;

mod format;
mod progress;
mod summary;

use format::{format_ms_opt, format_pct, format_rate};
use progress::HumanProgress;
use summary::{render_benchmark, render_stress};

use kbload_core::scenario::StateObserver;
use kbload_core::{ProgressFn, ScenarioState};

use super::{OutputFormatter, ReportDoc, RunHeader};

pub(crate) struct HumanReadableOutput {
    progress: Arc<HumanProgress>,
}

impl HumanReadableOutput {
    pub(crate) fn new() -> Self {
        Self {
            progress: Arc::new(HumanProgress::new()),
        }
    }
}

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, header: &RunHeader) {
        println!("{}: {}", header.command, header.url);
        println!(
            "resource: {} target_pid: {} records: {} queries: {}",
            header.resource, header.target_pid, header.records, header.queries
        );
        println!();
    }

    fn progress(&self) -> Option<ProgressFn> {
        let progress = self.progress.clone();

        Some(Arc::new(move |u| {
            let m = &u.metrics;
            let message = format!(
                "users={} ops/s={} records/s={} errors={}/{} p50={} p95={}",
                u.concurrency,
                format_rate(m.ops_per_sec_now),
                format_rate(m.records_per_sec_now),
                format_pct(m.error_rate_now),
                m.failed_total,
                format_ms_opt(m.latency_p50_ms_now),
                format_ms_opt(m.latency_p95_ms_now),
            );
            progress.update(&u.label, u.total, m.completed_total, message);
        }))
    }

    fn observer(&self) -> Option<StateObserver> {
        let progress = self.progress.clone();

        Some(Arc::new(move |state: &ScenarioState| match state {
            ScenarioState::Stopping { .. } | ScenarioState::Aborted(_) => {
                progress.println(format!("{state}"));
            }
            ScenarioState::Done => progress.finish(),
            _ => {}
        }))
    }

    fn print_report(&self, doc: &ReportDoc<'_>) -> anyhow::Result<()> {
        self.progress.finish();
        match doc {
            ReportDoc::Benchmark { report, baseline } => {
                print!("{}", render_benchmark(report, *baseline));
            }
            ReportDoc::Stress { report } => print!("{}", render_stress(report)),
        }
        Ok(())
    }
}
