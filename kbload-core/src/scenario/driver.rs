use std::sync::Arc;
use std::time::{Duration, Instant};

use super::report::{CellReport, MonitorLogs, PhaseReport, ProcessLog};
use super::state::{CellId, ScenarioState};
use crate::client::ServiceClient;
use crate::clock;
use crate::config::RunSettings;
use crate::dispatch::{Dispatcher, SubmissionPolicy};
use crate::execution::ExecutionRunner;
use crate::monitor::ResourceMonitor;
use crate::operation::{Operation, OperationKind};
use crate::progress::ProgressFn;
use crate::stats::summarize;
use crate::{Error, Result};

pub type StateObserver = Arc<dyn Fn(&ScenarioState) + Send + Sync + 'static>;

/// Work for one phase of a cell.
pub(crate) struct PhasePlan {
    pub(crate) kind: OperationKind,
    pub(crate) operations: Vec<Operation>,
    pub(crate) concurrency: usize,
    pub(crate) policy: SubmissionPolicy,
}

/// Resource lifecycle, monitors and dispatching shared by every scenario.
pub struct ScenarioDriver<C> {
    client: Arc<C>,
    target: Arc<ResourceMonitor>,
    driver: Arc<ResourceMonitor>,
    settings: RunSettings,
    resource: Arc<str>,
    dispatcher: Dispatcher<C>,
    state: ScenarioState,
    observer: Option<StateObserver>,
}

impl<C> std::fmt::Debug for ScenarioDriver<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioDriver")
            .field("resource", &self.resource)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<C: ServiceClient> ScenarioDriver<C> {
    pub fn new(
        client: Arc<C>,
        target: Arc<ResourceMonitor>,
        driver: Arc<ResourceMonitor>,
        settings: RunSettings,
    ) -> Result<Self> {
        settings.validate()?;
        let runner = Arc::new(ExecutionRunner::new(
            client.clone(),
            target.clone(),
            driver.clone(),
            settings.timeout,
        ));
        Ok(Self {
            client,
            target,
            driver,
            resource: Arc::from(settings.resource_name.as_str()),
            dispatcher: Dispatcher::new(runner),
            settings,
            state: ScenarioState::Idle,
            observer: None,
        })
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        let interval = self.settings.progress_interval;
        self.dispatcher = self.dispatcher.with_progress(Some(progress), interval);
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: StateObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn state(&self) -> &ScenarioState {
        &self.state
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub(crate) fn resource(&self) -> &Arc<str> {
        &self.resource
    }

    pub(crate) fn transition(&mut self, next: ScenarioState) {
        if !self.state.allows(&next) {
            tracing::warn!(from = %self.state, to = %next, "unexpected scenario transition");
        }
        tracing::debug!(state = %next, "scenario state");
        if let Some(observer) = &self.observer {
            observer(&next);
        }
        self.state = next;
    }

    /// Clears and starts both background samplers.
    pub(crate) fn start_monitors(&self) -> Result<()> {
        self.target.clear_log();
        self.driver.clear_log();
        self.target.start_continuous(self.settings.sample_interval)?;
        if let Err(err) = self.driver.start_continuous(self.settings.sample_interval) {
            self.target.stop_continuous();
            return Err(err);
        }
        Ok(())
    }

    pub(crate) fn stop_monitors(&self) -> MonitorLogs {
        let target_stop = self.target.stop_continuous();
        let driver_stop = self.driver.stop_continuous();
        MonitorLogs {
            target: ProcessLog::from_monitor(&self.target, target_stop),
            driver: ProcessLog::from_monitor(&self.driver, driver_stop),
        }
    }

    /// Ends the run in `Done`, or `Aborted` when `outcome` is an error.
    pub(crate) fn finish<T>(&mut self, outcome: &Result<T>) {
        match outcome {
            Ok(_) => self.transition(ScenarioState::Done),
            Err(err) => {
                if !self.state.is_terminal() {
                    self.transition(ScenarioState::Aborted(err.to_string()));
                }
            }
        }
    }

    /// Runs one cell on a freshly created resource and drops it afterwards.
    ///
    /// `evaluate` sees the finished phases and returns a stop reason when a limit was crossed.
    pub(crate) async fn run_cell(
        &mut self,
        cell: CellId,
        phases: Vec<PhasePlan>,
        evaluate: impl FnOnce(&CellReport) -> Option<String>,
    ) -> Result<CellReport> {
        let started_at = clock::now_unix_secs();
        self.transition(ScenarioState::Preparing(cell.clone()));
        let setup_time = match self.create_resource().await {
            Ok(elapsed) => elapsed,
            Err(err) => {
                tracing::error!(cell = %cell, error = %err, "resource setup failed");
                self.transition(ScenarioState::Cleanup(cell.clone()));
                if let Err(cleanup) = self.drop_resource().await {
                    tracing::warn!(cell = %cell, error = %cleanup, "cleanup after failed setup failed");
                }
                self.transition(ScenarioState::Aborted(err.to_string()));
                return Err(err);
            }
        };

        self.transition(ScenarioState::Running(cell.clone()));
        let mut report = CellReport {
            cell: cell.clone(),
            started_at,
            finished_at: started_at,
            setup_time,
            teardown_time: Duration::ZERO,
            row_count: None,
            phases: Vec::with_capacity(phases.len()),
            stop_reason: None,
        };
        for phase in phases {
            let label = format!("{cell} {}", phase.kind);
            let outcome = self
                .dispatcher
                .dispatch(&label, phase.operations, phase.concurrency, phase.policy)
                .await;
            let summary = summarize(&outcome.results, outcome.wall_time);
            tracing::info!(
                cell = %cell,
                kind = %phase.kind,
                ops = summary.total,
                failures = summary.failures,
                wall_ms = outcome.wall_time.as_millis() as u64,
                "phase finished"
            );
            report.phases.push(PhaseReport {
                kind: phase.kind,
                concurrency: phase.concurrency,
                policy: phase.policy,
                wall_time: outcome.wall_time,
                summary,
                results: outcome.results,
            });
            if phase.kind == OperationKind::Ingest {
                report.row_count = self.count_rows().await;
            }
        }

        self.transition(ScenarioState::Evaluating(cell.clone()));
        report.stop_reason = evaluate(&report);
        if let Some(reason) = &report.stop_reason {
            tracing::info!(cell = %cell, reason = %reason, "stop condition triggered");
            self.transition(ScenarioState::Stopping {
                cell: cell.clone(),
                reason: reason.clone(),
            });
        }

        self.transition(ScenarioState::Cleanup(cell.clone()));
        report.teardown_time = match self.drop_resource().await {
            Ok(elapsed) => elapsed,
            Err(err) => {
                tracing::error!(cell = %cell, error = %err, "resource teardown failed");
                self.transition(ScenarioState::Aborted(err.to_string()));
                return Err(err);
            }
        };

        report.finished_at = clock::now_unix_secs();
        Ok(report)
    }

    /// Creates the resource, returning how long the create call took.
    async fn create_resource(&self) -> Result<Duration> {
        let name = self.resource.as_ref();
        let setup = |message: String| Error::ResourceSetup {
            name: name.to_string(),
            message,
        };

        if self.settings.drop_existing {
            let existing = self
                .client
                .list_resources()
                .await
                .map_err(|err| setup(err.to_string()))?;
            if existing.iter().any(|r| r == name) {
                tracing::info!(resource = name, "dropping leftover resource");
                self.client
                    .drop_resource(name)
                    .await
                    .map_err(|err| setup(err.to_string()))?;
            }
        }

        let started = Instant::now();
        self.client
            .create_resource(name)
            .await
            .map_err(|err| setup(err.to_string()))?;
        let elapsed = started.elapsed();
        tracing::debug!(resource = name, elapsed_ms = elapsed.as_millis() as u64, "resource created");
        Ok(elapsed)
    }

    async fn drop_resource(&self) -> Result<Duration> {
        let name = self.resource.as_ref();
        let started = Instant::now();
        self.client
            .drop_resource(name)
            .await
            .map_err(|err| Error::ResourceTeardown {
                name: name.to_string(),
                message: err.to_string(),
            })?;
        Ok(started.elapsed())
    }

    /// Row count after ingest. A failed count is logged and left out of the report.
    async fn count_rows(&self) -> Option<u64> {
        let name = self.resource.as_ref();
        match self.client.count_rows(name).await {
            Ok(count) => count,
            Err(err) => {
                tracing::warn!(resource = name, error = %err, "row count failed");
                None
            }
        }
    }
}
