use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;

use super::delta::DeltaSummary;
use super::percentile::{percentile_sorted, stdev};
use crate::execution::ExecutionResult;

/// Descriptive statistics of a latency sample, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Distribution {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub stdev: f64,
    pub min: f64,
    pub max: f64,
    pub p95: f64,
    pub p99: f64,
}

impl Distribution {
    pub fn from_millis(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        Some(Self {
            count: sorted.len(),
            mean: sorted.iter().sum::<f64>() / sorted.len() as f64,
            median: percentile_sorted(&sorted, 50.0),
            stdev: stdev(&sorted),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            p95: percentile_sorted(&sorted, 95.0),
            p99: percentile_sorted(&sorted, 99.0),
        })
    }

    pub fn from_durations<'a>(values: impl IntoIterator<Item = &'a Duration>) -> Option<Self> {
        let millis: Vec<f64> = values.into_iter().map(|d| d.as_secs_f64() * 1000.0).collect();
        Self::from_millis(&millis)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Throughput {
    /// `1 / mean(execution_time)` of successful operations.
    pub ops_per_sec: f64,
    /// Successful operations per second of wall time.
    pub aggregate_ops_per_sec: f64,
    pub bytes_per_sec: f64,
    pub records_per_sec: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorCount {
    pub message: String,
    pub count: u64,
}

/// Aggregate of a set of [`ExecutionResult`]s.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub successes: usize,
    pub failures: usize,
    pub success_rate: f64,
    pub records: u64,
    #[serde(with = "crate::serde_secs")]
    pub wall_time: Duration,
    pub execution_time: Option<Distribution>,
    pub total_latency: Option<Distribution>,
    pub throughput: Throughput,
    pub target_delta: Option<DeltaSummary>,
    pub driver_delta: Option<DeltaSummary>,
    /// Failure messages by frequency, most common first.
    pub errors: Vec<ErrorCount>,
}

/// Summarizes `results` collected over `wall_time`.
///
/// Latency, throughput and resource statistics cover successful results only.
pub fn summarize(results: &[ExecutionResult], wall_time: Duration) -> Summary {
    let total = results.len();
    let ok: Vec<&ExecutionResult> = results.iter().filter(|r| r.success).collect();
    let successes = ok.len();

    let mut errors: HashMap<&str, u64> = HashMap::new();
    for r in results.iter().filter(|r| !r.success) {
        *errors
            .entry(r.error.as_deref().unwrap_or("unknown error"))
            .or_default() += 1;
    }
    let mut errors: Vec<ErrorCount> = errors
        .into_iter()
        .map(|(message, count)| ErrorCount {
            message: message.to_string(),
            count,
        })
        .collect();
    errors.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.message.cmp(&b.message)));

    let execution_time = Distribution::from_durations(ok.iter().map(|r| &r.execution_time));
    let total_latency = Distribution::from_durations(ok.iter().map(|r| &r.total_latency));

    let records: u64 = ok.iter().map(|r| r.batch_size as u64).sum();
    let bytes: u64 = ok.iter().map(|r| r.payload_bytes).sum();
    let wall = wall_time.as_secs_f64();
    let per_wall = |v: f64| if wall > 0.0 { v / wall } else { 0.0 };

    let throughput = Throughput {
        ops_per_sec: execution_time
            .filter(|d| d.mean > 0.0)
            .map_or(0.0, |d| 1000.0 / d.mean),
        aggregate_ops_per_sec: per_wall(successes as f64),
        bytes_per_sec: per_wall(bytes as f64),
        records_per_sec: per_wall(records as f64),
    };

    Summary {
        total,
        successes,
        failures: total - successes,
        success_rate: if total > 0 {
            successes as f64 / total as f64
        } else {
            0.0
        },
        records,
        wall_time,
        execution_time,
        total_latency,
        throughput,
        target_delta: DeltaSummary::target(&ok),
        driver_delta: DeltaSummary::driver(&ok),
        errors,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MeanStdev {
    pub mean: f64,
    pub stdev: f64,
}

impl MeanStdev {
    fn of(values: &[f64]) -> Self {
        Self {
            mean: super::percentile::mean(values).unwrap_or(0.0),
            stdev: stdev(values),
        }
    }
}

/// Mean and spread of per-iteration summaries of the same cell shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct IterationAverage {
    pub iterations: usize,
    pub ops_per_sec: MeanStdev,
    pub aggregate_ops_per_sec: MeanStdev,
    pub records_per_sec: MeanStdev,
    pub mean_latency_ms: MeanStdev,
    pub success_rate: MeanStdev,
}

impl IterationAverage {
    pub fn from_summaries<'a>(summaries: impl IntoIterator<Item = &'a Summary>) -> Self {
        let summaries: Vec<&Summary> = summaries.into_iter().collect();
        let pick = |f: &dyn Fn(&Summary) -> f64| -> MeanStdev {
            let v: Vec<f64> = summaries.iter().map(|s| f(s)).collect();
            MeanStdev::of(&v)
        };
        Self {
            iterations: summaries.len(),
            ops_per_sec: pick(&|s| s.throughput.ops_per_sec),
            aggregate_ops_per_sec: pick(&|s| s.throughput.aggregate_ops_per_sec),
            records_per_sec: pick(&|s| s.throughput.records_per_sec),
            mean_latency_ms: pick(&|s| s.execution_time.map_or(0.0, |d| d.mean)),
            success_rate: pick(&|s| s.success_rate),
        }
    }
}
