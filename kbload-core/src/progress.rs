use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct LiveMetrics {
    /// Operations completed/sec during the last progress interval.
    pub ops_per_sec_now: f64,

    /// Records ingested/sec during the last progress interval.
    pub records_per_sec_now: f64,

    pub completed_total: u64,
    pub failed_total: u64,

    /// Failed / completed during the last progress interval (0..=1).
    pub error_rate_now: f64,

    pub latency_p50_ms_now: Option<f64>,
    pub latency_p95_ms_now: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Monotonic tick counter (1-based) for progress emissions within one dispatch.
    pub tick: u64,
    pub elapsed: Duration,

    /// Label of the cell/phase being dispatched.
    pub label: String,
    pub total: u64,
    pub concurrency: usize,
    pub metrics: LiveMetrics,
}

pub type ProgressFn = std::sync::Arc<dyn Fn(ProgressUpdate) + Send + Sync + 'static>;
