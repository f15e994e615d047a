mod benchmark;
mod driver;
mod report;
mod state;
mod stop;
mod stress;

pub use benchmark::BenchmarkDriver;
pub use driver::{ScenarioDriver, StateObserver};
pub use report::{
    BatchSizeAverage, BenchmarkReport, CellReport, FailurePoint, MonitorLogs, PhaseReport,
    ProcessLog, SkippedCell, StressReport,
};
pub use state::{CellId, Dimension, ScenarioState};
pub use stop::StopConditions;
pub use stress::StressDriver;
