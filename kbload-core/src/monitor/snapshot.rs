use serde::{Deserialize, Serialize};

const MIB: f64 = 1024.0 * 1024.0;

/// Raw reading from a [`ProcessInspector`](super::ProcessInspector).
///
/// Fields the platform cannot report are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProcessSample {
    pub cpu_percent: Option<f64>,
    pub memory_percent: Option<f64>,
    pub rss_bytes: Option<u64>,
    pub vms_bytes: Option<u64>,
    pub threads: Option<u64>,
    pub open_files: Option<u64>,
    pub connections: Option<u64>,
    pub io_read_bytes: Option<u64>,
    pub io_write_bytes: Option<u64>,
    pub fds: Option<u64>,
}

/// Point-in-time resource reading of one process.
///
/// Fields the platform cannot report hold `0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    /// Unix seconds from the monotonic clock.
    pub timestamp: f64,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub rss_mb: f64,
    pub vms_mb: f64,
    pub threads: u64,
    pub open_files: u64,
    pub connections: u64,
    pub io_read_bytes: u64,
    pub io_write_bytes: u64,
    pub fds: u64,
}

impl ResourceSnapshot {
    pub fn from_sample(sample: &ProcessSample, timestamp: f64) -> Self {
        Self {
            timestamp,
            cpu_percent: sample.cpu_percent.unwrap_or(0.0),
            memory_percent: sample.memory_percent.unwrap_or(0.0),
            rss_mb: sample.rss_bytes.map_or(0.0, |b| b as f64 / MIB),
            vms_mb: sample.vms_bytes.map_or(0.0, |b| b as f64 / MIB),
            threads: sample.threads.unwrap_or(0),
            open_files: sample.open_files.unwrap_or(0),
            connections: sample.connections.unwrap_or(0),
            io_read_bytes: sample.io_read_bytes.unwrap_or(0),
            io_write_bytes: sample.io_write_bytes.unwrap_or(0),
            fds: sample.fds.unwrap_or(0),
        }
    }
}

/// Peak and mean CPU/RSS over a sampling log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PeakAverage {
    pub samples: usize,
    pub peak_cpu_percent: f64,
    pub avg_cpu_percent: f64,
    pub peak_rss_mb: f64,
    pub avg_rss_mb: f64,
}

impl PeakAverage {
    pub fn from_snapshots(snapshots: &[ResourceSnapshot]) -> Self {
        if snapshots.is_empty() {
            return Self::default();
        }

        let n = snapshots.len() as f64;
        let mut out = Self {
            samples: snapshots.len(),
            ..Self::default()
        };
        let mut cpu_sum = 0.0;
        let mut rss_sum = 0.0;
        for s in snapshots {
            out.peak_cpu_percent = out.peak_cpu_percent.max(s.cpu_percent);
            out.peak_rss_mb = out.peak_rss_mb.max(s.rss_mb);
            cpu_sum += s.cpu_percent;
            rss_sum += s.rss_mb;
        }
        out.avg_cpu_percent = cpu_sum / n;
        out.avg_rss_mb = rss_sum / n;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_become_zero() {
        let sample = ProcessSample {
            rss_bytes: Some(3 * 1024 * 1024),
            threads: Some(4),
            ..ProcessSample::default()
        };
        let snap = ResourceSnapshot::from_sample(&sample, 12.5);
        assert_eq!(snap.timestamp, 12.5);
        assert_eq!(snap.rss_mb, 3.0);
        assert_eq!(snap.threads, 4);
        assert_eq!(snap.connections, 0);
        assert_eq!(snap.cpu_percent, 0.0);
    }

    #[test]
    fn peak_average_over_log() {
        let mk = |cpu: f64, rss: f64| ResourceSnapshot {
            cpu_percent: cpu,
            rss_mb: rss,
            ..ResourceSnapshot::default()
        };
        let stats = PeakAverage::from_snapshots(&[mk(10.0, 100.0), mk(30.0, 50.0)]);
        assert_eq!(stats.samples, 2);
        assert_eq!(stats.peak_cpu_percent, 30.0);
        assert_eq!(stats.avg_cpu_percent, 20.0);
        assert_eq!(stats.peak_rss_mb, 100.0);
        assert_eq!(stats.avg_rss_mb, 75.0);
    }

    #[test]
    fn peak_average_of_empty_log_is_zero() {
        assert_eq!(PeakAverage::from_snapshots(&[]), PeakAverage::default());
    }
}
