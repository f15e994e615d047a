//! Load and resource-profiling engine for ingestion/search services.
//!
//! The crate drives a [`ServiceClient`] through benchmark and stress scenarios while
//! sampling the target service and the driver itself, and turns the per-operation
//! results into statistics, baselines and reports.

pub mod client;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod execution;
pub mod monitor;
pub mod operation;
pub mod progress;
pub mod scenario;
pub mod stats;

mod error;
mod serde_secs;

pub use client::{ClientError, Record, SearchQuery, ServiceClient};
pub use config::{BenchmarkConfig, Dataset, RunSettings, StressConfig};
pub use dispatch::{DispatchOutcome, Dispatcher, SubmissionPolicy};
pub use error::{Error, Result};
pub use execution::{ExecutionResult, ExecutionRunner};
pub use monitor::{ResourceMonitor, ResourceSnapshot, StopReason};
pub use operation::{Operation, OperationKind};
pub use progress::{LiveMetrics, ProgressFn, ProgressUpdate};
pub use scenario::{
    BenchmarkDriver, BenchmarkReport, ScenarioDriver, ScenarioState, StopConditions,
    StressDriver, StressReport,
};
pub use stats::{Summary, summarize};
