use serde::Serialize;

use kbload_core::scenario::StateObserver;
use kbload_core::stats::{Baseline, MetricComparison};
use kbload_core::{BenchmarkReport, ProgressFn, StressReport};

use crate::cli::OutputFormat;

mod human;
mod json;

/// What is about to run, printed before the first cell.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct RunHeader {
    pub command: &'static str,
    pub url: String,
    pub resource: String,
    pub target_pid: u32,
    pub records: usize,
    pub queries: usize,
}

/// Ingest results of this run next to a saved baseline.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct BaselineSection {
    pub baseline: Baseline,
    pub current: Baseline,
    pub comparisons: Vec<MetricComparison>,
    pub regressed: bool,
}

/// Final report document; also the shape written by `--out`.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum ReportDoc<'a> {
    Benchmark {
        report: &'a BenchmarkReport,
        #[serde(skip_serializing_if = "Option::is_none")]
        baseline: Option<&'a BaselineSection>,
    },
    Stress {
        report: &'a StressReport,
    },
}

pub(crate) trait OutputFormatter: Send + Sync {
    fn print_header(&self, header: &RunHeader);
    fn progress(&self) -> Option<ProgressFn>;
    fn observer(&self) -> Option<StateObserver>;
    fn print_report(&self, doc: &ReportDoc<'_>) -> anyhow::Result<()>;
}

pub(crate) fn formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::HumanReadable => Box::new(human::HumanReadableOutput::new()),
        OutputFormat::Json => Box::new(json::JsonOutput),
    }
}
