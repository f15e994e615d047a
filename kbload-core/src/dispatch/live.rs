use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use hdrhistogram::Histogram;
use parking_lot::Mutex;

use crate::execution::ExecutionResult;
use crate::progress::LiveMetrics;

/// Running counters for one dispatch, read by the progress ticker.
#[derive(Debug)]
pub(crate) struct LiveStats {
    completed: AtomicU64,
    failed: AtomicU64,
    records: AtomicU64,
    window: Mutex<Histogram<u64>>,
}

impl Default for LiveStats {
    fn default() -> Self {
        Self {
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            records: AtomicU64::new(0),
            // Microseconds, 1us..1h.
            window: Mutex::new(
                Histogram::<u64>::new_with_bounds(1, 3_600_000_000, 3)
                    .unwrap_or_else(|err| panic!("failed to create live histogram: {err}")),
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Totals {
    completed: u64,
    failed: u64,
    records: u64,
}

impl LiveStats {
    pub(crate) fn record(&self, result: &ExecutionResult) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        if result.success {
            self.records
                .fetch_add(result.batch_size as u64, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        let us = u64::try_from(result.total_latency.as_micros()).unwrap_or(u64::MAX);
        self.window.lock().saturating_record(us.max(1));
    }

    pub(crate) fn totals(&self) -> Totals {
        Totals {
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            records: self.records.load(Ordering::Relaxed),
        }
    }

    /// Metrics since `last`, resetting the latency window.
    pub(crate) fn interval(&self, last: Totals, dt: Duration) -> (LiveMetrics, Totals) {
        let now = self.totals();
        let secs = dt.as_secs_f64();
        let per_sec = |delta: u64| if secs > 0.0 { delta as f64 / secs } else { 0.0 };

        let completed = now.completed.saturating_sub(last.completed);
        let failed = now.failed.saturating_sub(last.failed);

        let (p50, p95) = {
            let mut hist = self.window.lock();
            let out = if hist.is_empty() {
                (None, None)
            } else {
                (
                    Some(hist.value_at_quantile(0.50) as f64 / 1000.0),
                    Some(hist.value_at_quantile(0.95) as f64 / 1000.0),
                )
            };
            hist.reset();
            out
        };

        let metrics = LiveMetrics {
            ops_per_sec_now: per_sec(completed),
            records_per_sec_now: per_sec(now.records.saturating_sub(last.records)),
            completed_total: now.completed,
            failed_total: now.failed,
            error_rate_now: if completed > 0 {
                failed as f64 / completed as f64
            } else {
                0.0
            },
            latency_p50_ms_now: p50,
            latency_p95_ms_now: p95,
        };
        (metrics, now)
    }
}
