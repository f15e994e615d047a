mod live;
mod queue;

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::MissedTickBehavior;

use crate::client::ServiceClient;
use crate::execution::{ExecutionResult, ExecutionRunner};
use crate::monitor::panic_message;
use crate::operation::Operation;
use crate::progress::{ProgressFn, ProgressUpdate};

use live::LiveStats;
use queue::{WorkQueue, partition};

/// How operations are handed to the worker pool.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SubmissionPolicy {
    /// Pre-split into one contiguous group per worker, each run sequentially.
    #[default]
    Chunked,
    /// Workers pull the next operation from a shared queue.
    PerOperation,
}

/// Results of one dispatch, in completion order.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub results: Vec<ExecutionResult>,
    pub wall_time: Duration,
}

/// Fans operations out over a bounded pool of tokio workers.
pub struct Dispatcher<C> {
    runner: Arc<ExecutionRunner<C>>,
    progress: Option<ProgressFn>,
    progress_interval: Duration,
}

impl<C> std::fmt::Debug for Dispatcher<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("progress", &self.progress.is_some())
            .field("progress_interval", &self.progress_interval)
            .finish()
    }
}

impl<C: ServiceClient> Dispatcher<C> {
    pub fn new(runner: Arc<ExecutionRunner<C>>) -> Self {
        Self {
            runner,
            progress: None,
            progress_interval: Duration::from_secs(1),
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Option<ProgressFn>, interval: Duration) -> Self {
        self.progress = progress;
        if !interval.is_zero() {
            self.progress_interval = interval;
        }
        self
    }

    pub fn runner(&self) -> &Arc<ExecutionRunner<C>> {
        &self.runner
    }

    /// Runs every operation once with at most `concurrency` in flight.
    ///
    /// Always returns exactly `operations.len()` results; an operation whose task panicked
    /// is reported as a failed result.
    pub async fn dispatch(
        &self,
        label: &str,
        operations: Vec<Operation>,
        concurrency: usize,
        policy: SubmissionPolicy,
    ) -> DispatchOutcome {
        let started = Instant::now();
        let total = operations.len();
        if total == 0 {
            return DispatchOutcome {
                results: Vec::new(),
                wall_time: started.elapsed(),
            };
        }

        let concurrency = concurrency.max(1);
        let workers = concurrency.min(total);
        tracing::debug!(label, total, concurrency, %policy, "dispatching operations");

        let operations: Arc<[Operation]> = Arc::from(operations);
        let completed: Arc<Mutex<Vec<(usize, ExecutionResult)>>> =
            Arc::new(Mutex::new(Vec::with_capacity(total)));
        let live = Arc::new(LiveStats::default());

        let queues: Vec<Arc<WorkQueue>> = match policy {
            SubmissionPolicy::Chunked => partition(total, workers)
                .into_iter()
                .map(|range| Arc::new(WorkQueue::new(range)))
                .collect(),
            SubmissionPolicy::PerOperation => {
                let shared = Arc::new(WorkQueue::new(0..total));
                (0..workers).map(|_| shared.clone()).collect()
            }
        };

        let progress_handle = self.progress.as_ref().map(|progress| {
            let progress = progress.clone();
            let live = live.clone();
            let label = label.to_string();
            let every = self.progress_interval;
            tokio::spawn(async move {
                let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

                let mut tick: u64 = 0;
                let mut last_at = Instant::now();
                let mut last = live.totals();
                loop {
                    interval.tick().await;
                    tick = tick.saturating_add(1);
                    let now = Instant::now();
                    let (metrics, totals) = live.interval(last, now.duration_since(last_at));
                    last = totals;
                    last_at = now;
                    (progress)(ProgressUpdate {
                        tick,
                        elapsed: started.elapsed(),
                        label: label.clone(),
                        total: total as u64,
                        concurrency,
                        metrics,
                    });
                }
            })
        });

        let mut handles = Vec::with_capacity(workers);
        for queue in queues {
            let runner = self.runner.clone();
            let operations = operations.clone();
            let completed = completed.clone();
            let live = live.clone();
            handles.push(tokio::spawn(async move {
                while let Some(idx) = queue.next() {
                    let queued = started.elapsed();
                    let op = operations[idx].clone();
                    let task_runner = runner.clone();
                    let task_op = op.clone();
                    let result = match tokio::spawn(async move {
                        task_runner
                            .run_queued(&task_op, concurrency, queued)
                            .await
                    })
                    .await
                    {
                        Ok(result) => result,
                        Err(err) => {
                            let msg = if err.is_panic() {
                                format!("operation panicked: {}", panic_message(err.into_panic().as_ref()))
                            } else {
                                format!("operation aborted: {err}")
                            };
                            tracing::warn!(error = %msg, "operation task failed");
                            ExecutionResult::failed(&op, concurrency, queued, msg)
                        }
                    };
                    live.record(&result);
                    completed.lock().push((idx, result));
                }
            }));
        }

        for handle in handles {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "dispatch worker failed");
            }
        }

        if let Some(h) = progress_handle {
            h.abort();
            let _ = h.await;
        }

        let wall_time = started.elapsed();
        let mut completed = std::mem::take(&mut *completed.lock());

        // Backfill anything a failed worker never reported.
        if completed.len() < total {
            let mut seen = vec![false; total];
            for (idx, _) in &completed {
                seen[*idx] = true;
            }
            for (idx, op) in operations.iter().enumerate() {
                if !seen[idx] {
                    completed.push((
                        idx,
                        ExecutionResult::failed(
                            op,
                            concurrency,
                            wall_time,
                            "operation was never executed".to_string(),
                        ),
                    ));
                }
            }
        }

        DispatchOutcome {
            results: completed.into_iter().map(|(_, r)| r).collect(),
            wall_time,
        }
    }
}
