use std::time::Duration;

use serde::Serialize;

use super::state::CellId;
use crate::dispatch::SubmissionPolicy;
use crate::execution::ExecutionResult;
use crate::monitor::{PeakAverage, ResourceMonitor, ResourceSnapshot, StopReason};
use crate::operation::OperationKind;
use crate::stats::{DegradationPoint, IterationAverage, Summary, ThroughputPoint, summarize};

/// One dispatched phase (ingest or search) of a cell.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseReport {
    pub kind: OperationKind,
    pub concurrency: usize,
    pub policy: SubmissionPolicy,
    #[serde(with = "crate::serde_secs")]
    pub wall_time: Duration,
    pub summary: Summary,
    pub results: Vec<ExecutionResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CellReport {
    pub cell: CellId,
    pub started_at: f64,
    pub finished_at: f64,
    /// Time the service took to create the resource.
    #[serde(with = "crate::serde_secs")]
    pub setup_time: Duration,
    /// Time the service took to drop the resource.
    #[serde(with = "crate::serde_secs")]
    pub teardown_time: Duration,
    /// Rows the service reported holding once ingest finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    pub phases: Vec<PhaseReport>,
    /// Stop condition this cell triggered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
}

impl CellReport {
    pub fn phase(&self, kind: OperationKind) -> Option<&PhaseReport> {
        self.phases.iter().rev().find(|p| p.kind == kind)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessLog {
    pub pid: u32,
    pub peak_average: PeakAverage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    pub snapshots: Vec<ResourceSnapshot>,
}

impl ProcessLog {
    pub(crate) fn from_monitor(monitor: &ResourceMonitor, stop_reason: Option<StopReason>) -> Self {
        Self {
            pid: monitor.pid(),
            peak_average: monitor.peak_and_average(),
            stop_reason,
            snapshots: monitor.snapshots(),
        }
    }
}

/// Background sampling logs of both monitored processes.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorLogs {
    pub target: ProcessLog,
    pub driver: ProcessLog,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSizeAverage {
    pub batch_size: usize,
    pub ingest: IterationAverage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<IterationAverage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    pub started_at: f64,
    pub finished_at: f64,
    pub cells: Vec<CellReport>,
    pub batch_sizes: Vec<BatchSizeAverage>,
    pub monitors: MonitorLogs,
}

impl BenchmarkReport {
    /// All results of `kind` across every cell, summarized over the summed phase wall time.
    pub fn combined(&self, kind: OperationKind) -> Summary {
        combine(self.cells.iter(), kind)
    }
}

/// Cell that was not run, and why.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedCell {
    pub cell: CellId,
    pub reason: String,
}

/// Cell whose stop condition ended its dimension.
#[derive(Debug, Clone, Serialize)]
pub struct FailurePoint {
    pub cell: CellId,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StressReport {
    pub started_at: f64,
    pub finished_at: f64,
    pub data_volume: Vec<CellReport>,
    pub concurrency: Vec<CellReport>,
    pub skipped: Vec<SkippedCell>,
    pub failure_points: Vec<FailurePoint>,
    pub volume_curve: Vec<ThroughputPoint>,
    pub concurrency_curve: Vec<ThroughputPoint>,
    /// First concurrency level whose search throughput stopped scaling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saturation_concurrency: Option<usize>,
    /// First data size whose ingest rate fell off.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degradation: Option<DegradationPoint>,
    pub monitors: MonitorLogs,
}

impl StressReport {
    pub fn combined(&self, kind: OperationKind) -> Summary {
        combine(self.data_volume.iter().chain(self.concurrency.iter()), kind)
    }
}

fn combine<'a>(cells: impl Iterator<Item = &'a CellReport>, kind: OperationKind) -> Summary {
    let mut results = Vec::new();
    let mut wall = Duration::ZERO;
    for phase in cells
        .flat_map(|c| c.phases.iter())
        .filter(|p| p.kind == kind)
    {
        results.extend(phase.results.iter().cloned());
        wall += phase.wall_time;
    }
    summarize(&results, wall)
}
