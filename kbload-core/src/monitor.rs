mod inspector;
mod snapshot;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::clock;
use crate::{Error, Result};

pub use inspector::{ProcessInspector, SysinfoInspector};
pub use snapshot::{PeakAverage, ProcessSample, ResourceSnapshot};

/// Consecutive unreadable samples after which the background sampler gives up.
pub const DEFAULT_MAX_CONSECUTIVE_MISSES: u32 = 50;

/// Why a background sampler ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
#[strum(serialize_all = "snake_case")]
pub enum StopReason {
    Requested,
    ProcessGone,
    Panicked(String),
}

struct Sampler {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<StopReason>,
}

/// Samples CPU, memory, thread, fd and I/O counters of one process.
///
/// Supports on-demand readings ([`sample_once`](Self::sample_once)) and a background sampler
/// that appends to an in-memory log until stopped. Dropping the monitor stops the sampler.
///
/// On-demand readings check an inspector out of an idle pool, so concurrent callers never wait
/// on each other's OS reads. The background sampler owns a separate inspector.
pub struct ResourceMonitor {
    pid: u32,
    prototype: Mutex<Box<dyn ProcessInspector>>,
    idle: Mutex<Vec<Box<dyn ProcessInspector>>>,
    log: Arc<RwLock<Vec<ResourceSnapshot>>>,
    sampler: Mutex<Option<Sampler>>,
    last_stop: Mutex<Option<StopReason>>,
    max_consecutive_misses: u32,
}

impl std::fmt::Debug for ResourceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceMonitor")
            .field("pid", &self.pid)
            .field("running", &self.is_running())
            .field("samples", &self.log.read().len())
            .field("idle_inspectors", &self.idle.lock().len())
            .finish()
    }
}

impl ResourceMonitor {
    pub fn new(pid: u32) -> Self {
        Self::with_inspector(pid, SysinfoInspector::new())
    }

    /// Monitor for the calling process.
    pub fn current_process() -> Self {
        Self::new(std::process::id())
    }

    pub fn with_inspector(pid: u32, inspector: impl ProcessInspector) -> Self {
        Self {
            pid,
            prototype: Mutex::new(Box::new(inspector)),
            idle: Mutex::new(Vec::new()),
            log: Arc::new(RwLock::new(Vec::new())),
            sampler: Mutex::new(None),
            last_stop: Mutex::new(None),
            max_consecutive_misses: DEFAULT_MAX_CONSECUTIVE_MISSES,
        }
    }

    #[must_use]
    pub fn max_consecutive_misses(mut self, misses: u32) -> Self {
        self.max_consecutive_misses = misses.max(1);
        self
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// One reading now; `None` when the process cannot be read.
    ///
    /// Blocks on the OS read. Async callers should use [`snapshot`](Self::snapshot).
    pub fn sample_once(&self) -> Option<ResourceSnapshot> {
        let mut inspector = self.checkout();
        let sample = inspector.sample(self.pid);
        self.idle.lock().push(inspector);
        Some(ResourceSnapshot::from_sample(&sample?, clock::now_unix_secs()))
    }

    /// [`sample_once`](Self::sample_once) on the blocking pool.
    pub async fn snapshot(self: &Arc<Self>) -> Option<ResourceSnapshot> {
        let monitor = self.clone();
        match tokio::task::spawn_blocking(move || monitor.sample_once()).await {
            Ok(snap) => snap,
            Err(err) => {
                tracing::warn!(pid = self.pid, error = %err, "resource snapshot failed");
                None
            }
        }
    }

    fn checkout(&self) -> Box<dyn ProcessInspector> {
        if let Some(inspector) = self.idle.lock().pop() {
            return inspector;
        }
        self.prototype.lock().fork()
    }

    /// Starts the background sampler. A no-op when one is already running.
    pub fn start_continuous(&self, interval: Duration) -> Result<()> {
        if interval.is_zero() {
            return Err(Error::InvalidSampleInterval);
        }

        let mut slot = self.sampler.lock();
        if slot.is_some() {
            return Ok(());
        }

        let stop = Arc::new(AtomicBool::new(false));
        let ctx = SamplerLoop {
            pid: self.pid,
            interval,
            max_misses: self.max_consecutive_misses,
            stop: stop.clone(),
            inspector: self.prototype.lock().fork(),
            log: self.log.clone(),
        };
        let handle = thread::Builder::new()
            .name(format!("kbload-sampler-{}", self.pid))
            .spawn(move || ctx.run())
            .map_err(Error::SamplerSpawn)?;

        tracing::debug!(pid = self.pid, ?interval, "resource sampler started");
        *slot = Some(Sampler { stop, handle });
        Ok(())
    }

    /// Stops the background sampler and waits for it. Idempotent.
    ///
    /// Returns the reason the sampler ended, or `None` when nothing was running.
    pub fn stop_continuous(&self) -> Option<StopReason> {
        let sampler = self.sampler.lock().take()?;
        sampler.stop.store(true, Ordering::Release);
        sampler.handle.thread().unpark();
        let reason = sampler
            .handle
            .join()
            .unwrap_or_else(|_| StopReason::Panicked("sampler thread panicked".to_string()));

        tracing::debug!(pid = self.pid, %reason, "resource sampler stopped");
        *self.last_stop.lock() = Some(reason.clone());
        Some(reason)
    }

    pub fn is_running(&self) -> bool {
        self.sampler
            .lock()
            .as_ref()
            .is_some_and(|s| !s.handle.is_finished())
    }

    /// Reason the last sampler run ended.
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.last_stop.lock().clone()
    }

    pub fn snapshots(&self) -> Vec<ResourceSnapshot> {
        self.log.read().clone()
    }

    pub fn log_len(&self) -> usize {
        self.log.read().len()
    }

    pub fn clear_log(&self) {
        self.log.write().clear();
    }

    pub fn peak_and_average(&self) -> PeakAverage {
        PeakAverage::from_snapshots(&self.log.read())
    }
}

impl Drop for ResourceMonitor {
    fn drop(&mut self) {
        self.stop_continuous();
    }
}

struct SamplerLoop {
    pid: u32,
    interval: Duration,
    max_misses: u32,
    stop: Arc<AtomicBool>,
    inspector: Box<dyn ProcessInspector>,
    log: Arc<RwLock<Vec<ResourceSnapshot>>>,
}

impl SamplerLoop {
    fn run(mut self) -> StopReason {
        let mut misses = 0u32;
        let mut next_tick = Instant::now();

        loop {
            if self.stop.load(Ordering::Acquire) {
                return StopReason::Requested;
            }

            let sampled =
                std::panic::catch_unwind(AssertUnwindSafe(|| self.inspector.sample(self.pid)));
            match sampled {
                Ok(Some(sample)) => {
                    misses = 0;
                    let snap = ResourceSnapshot::from_sample(&sample, clock::now_unix_secs());
                    self.log.write().push(snap);
                }
                Ok(None) => {
                    misses += 1;
                    tracing::warn!(pid = self.pid, misses, "resource sample unavailable");
                    if misses >= self.max_misses {
                        return StopReason::ProcessGone;
                    }
                }
                Err(panic) => {
                    let msg = panic_message(panic.as_ref());
                    tracing::warn!(pid = self.pid, error = %msg, "resource sampler failed");
                    return StopReason::Panicked(msg);
                }
            }

            next_tick += self.interval;
            loop {
                if self.stop.load(Ordering::Acquire) {
                    return StopReason::Requested;
                }
                let now = Instant::now();
                if now >= next_tick {
                    break;
                }
                thread::park_timeout(next_tick - now);
            }
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
