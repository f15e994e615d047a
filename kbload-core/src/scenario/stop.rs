use std::time::Duration;

use crate::stats::Summary;
use crate::{Error, Result};

/// Limits that end a stress dimension once a cell crosses them. Unset limits never trigger.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StopConditions {
    /// Floor for successful operations per second of wall time.
    pub min_throughput_ops: Option<f64>,
    /// Floor for records ingested per second of wall time.
    pub min_records_per_sec: Option<f64>,
    /// Ceiling for mean execution time of successful operations.
    pub max_mean_latency: Option<Duration>,
    /// Floor for `successes / total` (0..=1).
    pub min_success_rate: Option<f64>,
}

impl StopConditions {
    pub fn validate(&self) -> Result<()> {
        if let Some(rate) = self.min_success_rate
            && !(0.0..=1.0).contains(&rate)
        {
            return Err(Error::InvalidSuccessRate(rate));
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Reason the cell summarized by `summary` crossed a limit, if it did.
    pub fn evaluate(&self, summary: &Summary) -> Option<String> {
        if summary.total == 0 {
            return None;
        }

        if let Some(floor) = self.min_success_rate
            && summary.success_rate < floor
        {
            return Some(format!(
                "success rate {:.1}% below {:.1}%",
                summary.success_rate * 100.0,
                floor * 100.0
            ));
        }

        if let Some(ceiling) = self.max_mean_latency {
            let ceiling_ms = ceiling.as_secs_f64() * 1000.0;
            if let Some(exec) = summary.execution_time
                && exec.mean > ceiling_ms
            {
                return Some(format!(
                    "mean latency {:.1}ms above {:.1}ms",
                    exec.mean, ceiling_ms
                ));
            }
        }

        if let Some(floor) = self.min_throughput_ops
            && summary.throughput.aggregate_ops_per_sec < floor
        {
            return Some(format!(
                "throughput {:.2} ops/s below {floor:.2} ops/s",
                summary.throughput.aggregate_ops_per_sec
            ));
        }

        if let Some(floor) = self.min_records_per_sec
            && summary.throughput.records_per_sec < floor
        {
            return Some(format!(
                "ingest rate {:.2} records/s below {floor:.2} records/s",
                summary.throughput.records_per_sec
            ));
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{Distribution, Throughput};

    fn summary(success_rate: f64, mean_ms: f64, records_per_sec: f64) -> Summary {
        Summary {
            total: 10,
            successes: (success_rate * 10.0) as usize,
            success_rate,
            execution_time: Some(Distribution {
                count: 10,
                mean: mean_ms,
                ..Distribution::default()
            }),
            throughput: Throughput {
                aggregate_ops_per_sec: records_per_sec / 10.0,
                records_per_sec,
                ..Throughput::default()
            },
            ..Summary::default()
        }
    }

    #[test]
    fn empty_conditions_never_trigger() {
        let cond = StopConditions::default();
        assert!(cond.is_empty());
        assert_eq!(cond.evaluate(&summary(0.0, 1e9, 0.0)), None);
    }

    #[test]
    fn records_floor() {
        let cond = StopConditions {
            min_records_per_sec: Some(10.0),
            ..StopConditions::default()
        };
        assert_eq!(cond.evaluate(&summary(1.0, 5.0, 50.0)), None);
        let reason = cond.evaluate(&summary(1.0, 5.0, 4.0));
        assert!(reason.is_some_and(|r| r.contains("records/s")));
    }

    #[test]
    fn latency_ceiling_and_success_floor() {
        let cond = StopConditions {
            max_mean_latency: Some(Duration::from_secs(5)),
            min_success_rate: Some(0.95),
            ..StopConditions::default()
        };
        assert_eq!(cond.evaluate(&summary(1.0, 4999.0, 1.0)), None);
        assert!(
            cond.evaluate(&summary(1.0, 5001.0, 1.0))
                .is_some_and(|r| r.contains("latency"))
        );
        assert!(
            cond.evaluate(&summary(0.9, 10.0, 1.0))
                .is_some_and(|r| r.contains("success rate"))
        );
    }

    #[test]
    fn success_rate_must_be_a_fraction() {
        let cond = StopConditions {
            min_success_rate: Some(95.0),
            ..StopConditions::default()
        };
        assert!(matches!(cond.validate(), Err(Error::InvalidSuccessRate(_))));
    }
}
