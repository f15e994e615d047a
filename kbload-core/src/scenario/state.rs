use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Dimension {
    Benchmark,
    DataVolume,
    Concurrency,
}

/// Coordinates of one cell of a scenario matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellId {
    pub dimension: Dimension,
    pub batch_size: usize,
    pub data_size: usize,
    pub concurrency: usize,
    /// 1-based; always 1 outside benchmarks.
    pub iteration: usize,
}

impl CellId {
    pub fn benchmark(batch_size: usize, data_size: usize, concurrency: usize, iteration: usize) -> Self {
        Self {
            dimension: Dimension::Benchmark,
            batch_size,
            data_size,
            concurrency,
            iteration,
        }
    }

    pub fn data_volume(batch_size: usize, data_size: usize, concurrency: usize) -> Self {
        Self {
            dimension: Dimension::DataVolume,
            batch_size,
            data_size,
            concurrency,
            iteration: 1,
        }
    }

    pub fn concurrency(batch_size: usize, data_size: usize, concurrency: usize) -> Self {
        Self {
            dimension: Dimension::Concurrency,
            batch_size,
            data_size,
            concurrency,
            iteration: 1,
        }
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.dimension {
            Dimension::Benchmark => write!(
                f,
                "benchmark[batch={} iter={}]",
                self.batch_size, self.iteration
            ),
            Dimension::DataVolume => write!(f, "data_volume[records={}]", self.data_size),
            Dimension::Concurrency => write!(f, "concurrency[users={}]", self.concurrency),
        }
    }
}

/// Lifecycle of a scenario run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioState {
    Idle,
    Preparing(CellId),
    Running(CellId),
    Evaluating(CellId),
    Stopping { cell: CellId, reason: String },
    Cleanup(CellId),
    Done,
    Aborted(String),
}

impl ScenarioState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Preparing(_) => "preparing",
            Self::Running(_) => "running",
            Self::Evaluating(_) => "evaluating",
            Self::Stopping { .. } => "stopping",
            Self::Cleanup(_) => "cleanup",
            Self::Done => "done",
            Self::Aborted(_) => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted(_))
    }

    /// Whether moving from `self` to `next` is a legal step.
    pub fn allows(&self, next: &ScenarioState) -> bool {
        use ScenarioState::*;
        matches!(
            (self, next),
            (Idle, Preparing(_) | Done | Aborted(_))
                | (Preparing(_), Running(_) | Cleanup(_))
                | (Running(_), Evaluating(_) | Cleanup(_))
                | (Evaluating(_), Stopping { .. } | Cleanup(_))
                | (Stopping { .. }, Cleanup(_))
                | (Cleanup(_), Preparing(_) | Done | Aborted(_))
        )
    }
}

impl fmt::Display for ScenarioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle | Self::Done => f.write_str(self.name()),
            Self::Preparing(c) | Self::Running(c) | Self::Evaluating(c) | Self::Cleanup(c) => {
                write!(f, "{} {c}", self.name())
            }
            Self::Stopping { cell, reason } => write!(f, "stopping {cell}: {reason}"),
            Self::Aborted(reason) => write!(f, "aborted: {reason}"),
        }
    }
}
