use serde::Serialize;
use std::io::Write as _;
use std::sync::Arc;

use kbload_core::scenario::StateObserver;
use kbload_core::{ProgressFn, ProgressUpdate, ScenarioState};

use super::{OutputFormatter, ReportDoc, RunHeader};

pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(&self, header: &RunHeader) {
        emit_json_line(&JsonHeaderLine {
            kind: "header",
            header,
        });
    }

    fn progress(&self) -> Option<ProgressFn> {
        Some(Arc::new(move |u| {
            let line = build_progress_line(&u);
            emit_json_line(&line);
        }))
    }

    fn observer(&self) -> Option<StateObserver> {
        Some(Arc::new(|state: &ScenarioState| {
            // Only lifecycle edges a consumer can act on.
            if matches!(
                state,
                ScenarioState::Stopping { .. } | ScenarioState::Done | ScenarioState::Aborted(_)
            ) {
                emit_json_line(&JsonStateLine {
                    kind: "state",
                    state: state.name(),
                    detail: state.to_string(),
                });
            }
        }))
    }

    fn print_report(&self, doc: &ReportDoc<'_>) -> anyhow::Result<()> {
        emit_json_line(doc);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct JsonHeaderLine<'a> {
    kind: &'static str,
    #[serde(flatten)]
    header: &'a RunHeader,
}

#[derive(Debug, Serialize)]
struct JsonStateLine {
    kind: &'static str,
    state: &'static str,
    detail: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonProgressLine {
    pub kind: &'static str,
    pub tick: u64,
    pub label: String,
    pub elapsed_secs: f64,
    pub concurrency: usize,

    pub total: u64,
    pub completed_total: u64,
    pub failed_total: u64,

    pub ops_per_sec: f64,
    pub records_per_sec: f64,
    pub error_rate: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_p50_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_p95_ms: Option<f64>,
}

fn build_progress_line(u: &ProgressUpdate) -> JsonProgressLine {
    JsonProgressLine {
        kind: "progress",
        tick: u.tick,
        label: u.label.clone(),
        elapsed_secs: u.elapsed.as_secs_f64(),
        concurrency: u.concurrency,

        total: u.total,
        completed_total: u.metrics.completed_total,
        failed_total: u.metrics.failed_total,

        ops_per_sec: u.metrics.ops_per_sec_now,
        records_per_sec: u.metrics.records_per_sec_now,
        error_rate: u.metrics.error_rate_now,

        latency_p50_ms: u.metrics.latency_p50_ms_now,
        latency_p95_ms: u.metrics.latency_p95_ms_now,
    }
}

fn emit_json_line<T: Serialize + ?Sized>(line: &T) {
    let Ok(s) = serde_json::to_string(line) else {
        return;
    };
    let mut out = std::io::stdout().lock();
    let _ = writeln!(out, "{s}");
    let _ = out.flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbload_core::LiveMetrics;
    use std::time::Duration;

    #[test]
    fn progress_line_carries_live_metrics() {
        let u = ProgressUpdate {
            tick: 3,
            elapsed: Duration::from_millis(1500),
            label: "benchmark[batch=10 iter=1] ingest".to_string(),
            total: 40,
            concurrency: 4,
            metrics: LiveMetrics {
                ops_per_sec_now: 12.5,
                records_per_sec_now: 125.0,
                completed_total: 20,
                failed_total: 1,
                error_rate_now: 0.05,
                latency_p50_ms_now: Some(8.0),
                latency_p95_ms_now: None,
            },
        };

        let line = build_progress_line(&u);
        let v = match serde_json::to_value(&line) {
            Ok(v) => v,
            Err(err) => panic!("serialize: {err}"),
        };

        assert_eq!(v["kind"], "progress");
        assert_eq!(v["tick"], 3);
        assert_eq!(v["elapsed_secs"], 1.5);
        assert_eq!(v["completed_total"], 20);
        assert_eq!(v["latency_p50_ms"], 8.0);
        assert!(v.get("latency_p95_ms").is_none());
    }
}
