use std::time::Duration;

use crate::client::{Record, SearchQuery};
use crate::scenario::StopConditions;
use crate::{Error, Result};

/// Settings shared by every scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    /// Name of the resource (knowledge base) created and dropped for every cell.
    pub resource_name: String,
    /// Per-operation timeout.
    pub timeout: Duration,
    /// Background sampler interval.
    pub sample_interval: Duration,
    /// Drop a leftover resource with the same name before creating it.
    pub drop_existing: bool,
    pub progress_interval: Duration,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            resource_name: "kbload_kb".to_string(),
            timeout: Duration::from_secs(30),
            sample_interval: Duration::from_secs(1),
            drop_existing: true,
            progress_interval: Duration::from_secs(1),
        }
    }
}

impl RunSettings {
    pub fn validate(&self) -> Result<()> {
        if self.resource_name.trim().is_empty() {
            return Err(Error::InvalidResourceName);
        }
        if self.timeout.is_zero() {
            return Err(Error::InvalidTimeout);
        }
        if self.sample_interval.is_zero() {
            return Err(Error::InvalidSampleInterval);
        }
        Ok(())
    }
}

/// Matrix of batch sizes x iterations.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkConfig {
    pub batch_sizes: Vec<usize>,
    pub iterations: usize,
    pub ingest_concurrency: usize,
    pub search_concurrency: usize,
    /// Times the query list is issued per cell.
    pub search_rounds: usize,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            batch_sizes: vec![10, 50, 100],
            iterations: 3,
            ingest_concurrency: 1,
            search_concurrency: 1,
            search_rounds: 1,
        }
    }
}

impl BenchmarkConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_sizes.is_empty() || self.batch_sizes.contains(&0) {
            return Err(Error::InvalidBatchSizes);
        }
        if self.iterations == 0 {
            return Err(Error::InvalidIterations);
        }
        if self.ingest_concurrency == 0 || self.search_concurrency == 0 {
            return Err(Error::InvalidConcurrency);
        }
        if self.search_rounds == 0 {
            return Err(Error::InvalidIterations);
        }
        Ok(())
    }
}

/// Escalating load along two independent dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct StressConfig {
    pub batch_size: usize,
    pub ingest_concurrency: usize,
    /// Data-volume dimension: records ingested per cell, ascending.
    pub data_sizes: Vec<usize>,
    /// Concurrency dimension: simultaneous searchers per cell, ascending.
    pub concurrency_levels: Vec<usize>,
    /// Levels above this are skipped.
    pub max_concurrency: usize,
    /// Records ingested before the searches of each concurrency cell.
    pub seed_records: usize,
    pub volume_stop: StopConditions,
    pub concurrency_stop: StopConditions,
    /// Minimum throughput gain (percent) for a level to count as still scaling.
    pub saturation_gain_pct: f64,
    /// Drop from the smallest data size's throughput (percent) reported as degradation.
    pub degradation_drop_pct: f64,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            ingest_concurrency: 1,
            data_sizes: vec![100, 500, 1000, 5000, 10000],
            concurrency_levels: vec![1, 5, 10, 20, 50],
            max_concurrency: 50,
            seed_records: 100,
            volume_stop: StopConditions {
                min_records_per_sec: Some(10.0),
                ..StopConditions::default()
            },
            concurrency_stop: StopConditions {
                max_mean_latency: Some(Duration::from_secs(5)),
                min_success_rate: Some(0.95),
                ..StopConditions::default()
            },
            saturation_gain_pct: 10.0,
            degradation_drop_pct: 20.0,
        }
    }
}

impl StressConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::InvalidBatchSizes);
        }
        if self.data_sizes.contains(&0) {
            return Err(Error::InvalidDataSizes);
        }
        if self.ingest_concurrency == 0
            || self.max_concurrency == 0
            || self.concurrency_levels.contains(&0)
        {
            return Err(Error::InvalidConcurrency);
        }
        // A failure point ends a dimension, so later entries must be heavier loads.
        if !is_ascending(&self.data_sizes) {
            return Err(Error::NotAscending("data_sizes"));
        }
        if !is_ascending(&self.concurrency_levels) {
            return Err(Error::NotAscending("concurrency_levels"));
        }
        self.volume_stop.validate()?;
        self.concurrency_stop.validate()?;
        Ok(())
    }
}

fn is_ascending(levels: &[usize]) -> bool {
    levels.windows(2).all(|w| w[0] < w[1])
}

/// Records to ingest and queries to search with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub records: Vec<Record>,
    pub queries: Vec<SearchQuery>,
}

impl Dataset {
    pub fn validate(&self) -> Result<()> {
        if self.records.is_empty() {
            return Err(Error::EmptyDataset);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(RunSettings::default().validate().is_ok());
        assert!(BenchmarkConfig::default().validate().is_ok());
        assert!(StressConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_batch_size() {
        let cfg = BenchmarkConfig {
            batch_sizes: vec![10, 0],
            ..BenchmarkConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::InvalidBatchSizes)));

        let cfg = BenchmarkConfig {
            batch_sizes: vec![],
            ..BenchmarkConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::InvalidBatchSizes)));
    }

    #[test]
    fn rejects_unordered_sweeps() {
        let cfg = StressConfig {
            data_sizes: vec![100, 5000, 500],
            ..StressConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::NotAscending("data_sizes"))));

        let cfg = StressConfig {
            concurrency_levels: vec![1, 5, 5],
            ..StressConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(Error::NotAscending("concurrency_levels"))
        ));
    }

    #[test]
    fn rejects_zero_concurrency_level() {
        let cfg = StressConfig {
            concurrency_levels: vec![1, 0],
            ..StressConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::InvalidConcurrency)));
    }

    #[test]
    fn rejects_empty_resource_name_and_zero_timeout() {
        let s = RunSettings {
            resource_name: "  ".to_string(),
            ..RunSettings::default()
        };
        assert!(matches!(s.validate(), Err(Error::InvalidResourceName)));

        let s = RunSettings {
            timeout: Duration::ZERO,
            ..RunSettings::default()
        };
        assert!(matches!(s.validate(), Err(Error::InvalidTimeout)));
    }

    #[test]
    fn empty_dataset_is_rejected() {
        assert!(matches!(Dataset::default().validate(), Err(Error::EmptyDataset)));
    }
}
