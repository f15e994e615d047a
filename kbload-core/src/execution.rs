use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::client::ServiceClient;
use crate::monitor::{ResourceMonitor, ResourceSnapshot};
use crate::operation::{Operation, OperationKind, Payload};

pub const TIMEOUT_ERROR: &str = "timeout";
pub const INSERT_REJECTED_ERROR: &str = "insert rejected by service";

/// Outcome of one operation.
///
/// `success == false` always carries a non-empty `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub kind: OperationKind,
    pub batch_size: usize,
    pub payload_bytes: u64,
    pub concurrency: usize,

    /// Time spent inside the service call.
    #[serde(with = "crate::serde_secs")]
    pub execution_time: Duration,

    /// Submission to completion, including queueing and snapshot overhead.
    #[serde(with = "crate::serde_secs")]
    pub total_latency: Duration,

    #[serde(with = "crate::serde_secs")]
    pub queued: Duration,

    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub target_before: Option<ResourceSnapshot>,
    pub target_after: Option<ResourceSnapshot>,
    pub driver_before: Option<ResourceSnapshot>,
    pub driver_after: Option<ResourceSnapshot>,
}

impl ExecutionResult {
    /// A failed result for an operation that never produced one of its own.
    pub fn failed(op: &Operation, concurrency: usize, queued: Duration, error: String) -> Self {
        Self {
            kind: op.kind(),
            batch_size: op.batch_size(),
            payload_bytes: op.payload_bytes(),
            concurrency,
            execution_time: Duration::ZERO,
            total_latency: queued,
            queued,
            success: false,
            error: Some(non_empty(error)),
            target_before: None,
            target_after: None,
            driver_before: None,
            driver_after: None,
        }
    }
}

fn non_empty(msg: String) -> String {
    if msg.trim().is_empty() {
        "unknown error".to_string()
    } else {
        msg
    }
}

/// Runs single operations against the service, bracketed by resource snapshots.
#[derive(Debug)]
pub struct ExecutionRunner<C> {
    client: Arc<C>,
    target: Arc<ResourceMonitor>,
    driver: Arc<ResourceMonitor>,
    timeout: Duration,
}

impl<C: ServiceClient> ExecutionRunner<C> {
    pub fn new(
        client: Arc<C>,
        target: Arc<ResourceMonitor>,
        driver: Arc<ResourceMonitor>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            target,
            driver,
            timeout,
        }
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs `op` now. Never fails: service errors and timeouts become a failed result.
    pub async fn run(&self, op: &Operation, concurrency: usize) -> ExecutionResult {
        self.run_queued(op, concurrency, Duration::ZERO).await
    }

    /// Like [`run`](Self::run) for an operation that already waited `queued` for a worker.
    pub async fn run_queued(
        &self,
        op: &Operation,
        concurrency: usize,
        queued: Duration,
    ) -> ExecutionResult {
        let started = Instant::now();
        let (target_before, driver_before) = self.snapshots().await;

        let call_started = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, self.call(op)).await;
        let execution_time = call_started.elapsed();

        let (target_after, driver_after) = self.snapshots().await;

        let error = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(msg)) => Some(non_empty(msg)),
            Err(_) => Some(TIMEOUT_ERROR.to_string()),
        };
        if let Some(err) = &error {
            tracing::debug!(kind = %op.kind(), batch = op.batch_size(), error = %err, "operation failed");
        }

        ExecutionResult {
            kind: op.kind(),
            batch_size: op.batch_size(),
            payload_bytes: op.payload_bytes(),
            concurrency,
            execution_time,
            total_latency: queued + started.elapsed(),
            queued,
            success: error.is_none(),
            error,
            target_before,
            target_after,
            driver_before,
            driver_after,
        }
    }

    async fn snapshots(&self) -> (Option<ResourceSnapshot>, Option<ResourceSnapshot>) {
        tokio::join!(self.target.snapshot(), self.driver.snapshot())
    }

    async fn call(&self, op: &Operation) -> Result<(), String> {
        match op.payload() {
            Payload::Ingest(records) => {
                match self.client.insert_batch(op.target(), records).await {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(INSERT_REJECTED_ERROR.to_string()),
                    Err(err) => Err(err.to_string()),
                }
            }
            Payload::Search(query) => self
                .client
                .search(op.target(), query)
                .await
                .map(|_| ())
                .map_err(|err| err.to_string()),
        }
    }
}
