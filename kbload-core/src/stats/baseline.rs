use std::path::Path;

use serde::{Deserialize, Serialize};

use super::summary::Summary;
use crate::{Error, Result};

/// Relative change (percent) below which a metric counts as unchanged.
pub const UNCHANGED_TOLERANCE_PCT: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ComparisonStatus {
    Improved,
    Degraded,
    Unchanged,
    /// The baseline value is zero, so no relative change exists.
    BaselineZero,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Change {
    pub current: f64,
    pub baseline: f64,
    pub absolute_change: f64,
    pub percent_change: Option<f64>,
    pub status: ComparisonStatus,
}

/// Compares one metric against its baseline value.
pub fn compare_to_baseline(current: f64, baseline: f64, higher_is_better: bool) -> Change {
    let absolute_change = current - baseline;
    if baseline == 0.0 {
        return Change {
            current,
            baseline,
            absolute_change,
            percent_change: None,
            status: ComparisonStatus::BaselineZero,
        };
    }

    let pct = absolute_change / baseline.abs() * 100.0;
    let status = if pct.abs() < UNCHANGED_TOLERANCE_PCT {
        ComparisonStatus::Unchanged
    } else if (pct > 0.0) == higher_is_better {
        ComparisonStatus::Improved
    } else {
        ComparisonStatus::Degraded
    };

    Change {
        current,
        baseline,
        absolute_change,
        percent_change: Some(pct),
        status,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BaselineMetric {
    OpsPerSec,
    RecordsPerSec,
    MeanMs,
    P95Ms,
    P99Ms,
    SuccessRate,
}

impl BaselineMetric {
    pub fn higher_is_better(self) -> bool {
        match self {
            Self::OpsPerSec | Self::RecordsPerSec | Self::SuccessRate => true,
            Self::MeanMs | Self::P95Ms | Self::P99Ms => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricComparison {
    pub metric: BaselineMetric,
    #[serde(flatten)]
    pub change: Change,
}

/// Headline metrics of a run, saved to compare later runs against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub captured_at: f64,
    pub ops_per_sec: f64,
    pub records_per_sec: f64,
    pub mean_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub success_rate: f64,
}

impl Baseline {
    pub fn from_summary(label: impl Into<String>, summary: &Summary) -> Self {
        let exec = summary.execution_time.unwrap_or_default();
        Self {
            label: label.into(),
            captured_at: crate::clock::now_unix_secs(),
            ops_per_sec: summary.throughput.aggregate_ops_per_sec,
            records_per_sec: summary.throughput.records_per_sec,
            mean_ms: exec.mean,
            p95_ms: exec.p95,
            p99_ms: exec.p99,
            success_rate: summary.success_rate,
        }
    }

    pub fn value(&self, metric: BaselineMetric) -> f64 {
        match metric {
            BaselineMetric::OpsPerSec => self.ops_per_sec,
            BaselineMetric::RecordsPerSec => self.records_per_sec,
            BaselineMetric::MeanMs => self.mean_ms,
            BaselineMetric::P95Ms => self.p95_ms,
            BaselineMetric::P99Ms => self.p99_ms,
            BaselineMetric::SuccessRate => self.success_rate,
        }
    }

    /// Compares `current` against this baseline, one entry per metric.
    pub fn compare(&self, current: &Baseline) -> Vec<MetricComparison> {
        <BaselineMetric as strum::IntoEnumIterator>::iter()
            .map(|metric| MetricComparison {
                metric,
                change: compare_to_baseline(
                    current.value(metric),
                    self.value(metric),
                    metric.higher_is_better(),
                ),
            })
            .collect()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|err| Error::InvalidBaseline(format!("{}: {err}", path.display())))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|err| Error::InvalidBaseline(err.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
