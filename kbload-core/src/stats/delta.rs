use serde::Serialize;

use crate::execution::ExecutionResult;
use crate::monitor::ResourceSnapshot;

const MIB: f64 = 1024.0 * 1024.0;

/// Difference between two snapshots of the same process (`after - before`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ResourceDelta {
    pub duration_secs: f64,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub rss_mb: f64,
    pub vms_mb: f64,
    pub threads: i64,
    pub open_files: i64,
    pub connections: i64,
    pub io_read_bytes: i64,
    pub io_write_bytes: i64,
    pub io_read_mb: f64,
    pub io_write_mb: f64,
    pub fds: i64,
}

fn diff(after: u64, before: u64) -> i64 {
    i64::try_from(after)
        .unwrap_or(i64::MAX)
        .saturating_sub(i64::try_from(before).unwrap_or(i64::MAX))
}

/// Field-wise `after - before`; I/O byte counters are also given in MiB.
pub fn resource_delta(before: &ResourceSnapshot, after: &ResourceSnapshot) -> ResourceDelta {
    let io_read_bytes = diff(after.io_read_bytes, before.io_read_bytes);
    let io_write_bytes = diff(after.io_write_bytes, before.io_write_bytes);
    ResourceDelta {
        duration_secs: after.timestamp - before.timestamp,
        cpu_percent: after.cpu_percent - before.cpu_percent,
        memory_percent: after.memory_percent - before.memory_percent,
        rss_mb: after.rss_mb - before.rss_mb,
        vms_mb: after.vms_mb - before.vms_mb,
        threads: diff(after.threads, before.threads),
        open_files: diff(after.open_files, before.open_files),
        connections: diff(after.connections, before.connections),
        io_read_bytes,
        io_write_bytes,
        io_read_mb: io_read_bytes as f64 / MIB,
        io_write_mb: io_write_bytes as f64 / MIB,
        fds: diff(after.fds, before.fds),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FieldStats {
    pub mean: f64,
    pub max: f64,
    pub min: f64,
}

impl FieldStats {
    fn over(deltas: &[ResourceDelta], field: impl Fn(&ResourceDelta) -> f64) -> Self {
        let mut sum = 0.0;
        let mut max = f64::NEG_INFINITY;
        let mut min = f64::INFINITY;
        for d in deltas {
            let v = field(d);
            sum += v;
            max = max.max(v);
            min = min.min(v);
        }
        Self {
            mean: sum / deltas.len() as f64,
            max,
            min,
        }
    }
}

/// Mean/max/min of every delta field across a set of results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DeltaSummary {
    pub samples: usize,
    pub cpu_percent: FieldStats,
    pub memory_percent: FieldStats,
    pub rss_mb: FieldStats,
    pub vms_mb: FieldStats,
    pub threads: FieldStats,
    pub open_files: FieldStats,
    pub connections: FieldStats,
    pub io_read_mb: FieldStats,
    pub io_write_mb: FieldStats,
    pub fds: FieldStats,
}

impl DeltaSummary {
    /// `None` when no delta is available.
    pub fn from_deltas(deltas: &[ResourceDelta]) -> Option<Self> {
        if deltas.is_empty() {
            return None;
        }
        Some(Self {
            samples: deltas.len(),
            cpu_percent: FieldStats::over(deltas, |d| d.cpu_percent),
            memory_percent: FieldStats::over(deltas, |d| d.memory_percent),
            rss_mb: FieldStats::over(deltas, |d| d.rss_mb),
            vms_mb: FieldStats::over(deltas, |d| d.vms_mb),
            threads: FieldStats::over(deltas, |d| d.threads as f64),
            open_files: FieldStats::over(deltas, |d| d.open_files as f64),
            connections: FieldStats::over(deltas, |d| d.connections as f64),
            io_read_mb: FieldStats::over(deltas, |d| d.io_read_mb),
            io_write_mb: FieldStats::over(deltas, |d| d.io_write_mb),
            fds: FieldStats::over(deltas, |d| d.fds as f64),
        })
    }

    pub(crate) fn target(results: &[&ExecutionResult]) -> Option<Self> {
        let deltas: Vec<ResourceDelta> = results
            .iter()
            .filter_map(|r| Some(resource_delta(r.target_before.as_ref()?, r.target_after.as_ref()?)))
            .collect();
        Self::from_deltas(&deltas)
    }

    pub(crate) fn driver(results: &[&ExecutionResult]) -> Option<Self> {
        let deltas: Vec<ResourceDelta> = results
            .iter()
            .filter_map(|r| Some(resource_delta(r.driver_before.as_ref()?, r.driver_after.as_ref()?)))
            .collect();
        Self::from_deltas(&deltas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(ts: f64, rss: f64, threads: u64, read: u64) -> ResourceSnapshot {
        ResourceSnapshot {
            timestamp: ts,
            rss_mb: rss,
            threads,
            io_read_bytes: read,
            ..ResourceSnapshot::default()
        }
    }

    #[test]
    fn delta_is_after_minus_before() {
        let d = resource_delta(&snap(10.0, 100.0, 8, 0), &snap(10.5, 96.0, 6, 2 * 1024 * 1024));
        assert_eq!(d.duration_secs, 0.5);
        assert_eq!(d.rss_mb, -4.0);
        assert_eq!(d.threads, -2);
        assert_eq!(d.io_read_bytes, 2 * 1024 * 1024);
        assert_eq!(d.io_read_mb, 2.0);
    }

    #[test]
    fn delta_of_a_snapshot_with_itself_is_zero() {
        let x = ResourceSnapshot {
            timestamp: 1_700_000_000.25,
            cpu_percent: 37.5,
            memory_percent: 2.5,
            rss_mb: 512.0,
            vms_mb: 2048.0,
            threads: 24,
            open_files: 9,
            connections: 4,
            io_read_bytes: 1 << 30,
            io_write_bytes: 1 << 20,
            fds: 40,
        };
        assert_eq!(resource_delta(&x, &x), ResourceDelta::default());
    }

    #[test]
    fn summary_over_deltas() {
        let deltas = [
            ResourceDelta {
                rss_mb: 1.0,
                threads: 2,
                ..ResourceDelta::default()
            },
            ResourceDelta {
                rss_mb: 3.0,
                threads: -2,
                ..ResourceDelta::default()
            },
        ];
        let Some(s) = DeltaSummary::from_deltas(&deltas) else {
            panic!("expected summary");
        };
        assert_eq!(s.samples, 2);
        assert_eq!(s.rss_mb, FieldStats { mean: 2.0, max: 3.0, min: 1.0 });
        assert_eq!(s.threads, FieldStats { mean: 0.0, max: 2.0, min: -2.0 });
    }

    #[test]
    fn no_deltas_no_summary() {
        assert_eq!(DeltaSummary::from_deltas(&[]), None);
    }
}
