use std::sync::Arc;

use super::driver::{PhasePlan, ScenarioDriver};
use super::report::{CellReport, FailurePoint, SkippedCell, StressReport};
use super::state::CellId;
use crate::client::ServiceClient;
use crate::clock;
use crate::config::{Dataset, StressConfig};
use crate::dispatch::SubmissionPolicy;
use crate::operation::{OperationKind, ingest_batches, search_operations};
use crate::stats::{ThroughputPoint, find_degradation, find_saturation};
use crate::Result;

/// Escalates data volume and search concurrency until a stop condition triggers.
///
/// The two dimensions stop independently: crossing a limit ends only the dimension it
/// happened in.
#[derive(Debug)]
pub struct StressDriver<C> {
    inner: ScenarioDriver<C>,
    config: StressConfig,
}

#[derive(Debug, Default)]
struct Sweep {
    data_volume: Vec<CellReport>,
    concurrency: Vec<CellReport>,
    skipped: Vec<SkippedCell>,
    failure_points: Vec<FailurePoint>,
    volume_curve: Vec<ThroughputPoint>,
    concurrency_curve: Vec<ThroughputPoint>,
}

impl Sweep {
    fn skip(&mut self, cell: CellId, reason: String) {
        tracing::warn!(cell = %cell, reason = %reason, "skipping cell");
        self.skipped.push(SkippedCell { cell, reason });
    }
}

impl<C: ServiceClient> StressDriver<C> {
    pub fn new(inner: ScenarioDriver<C>, config: StressConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { inner, config })
    }

    pub fn driver(&self) -> &ScenarioDriver<C> {
        &self.inner
    }

    pub async fn run(&mut self, dataset: &Dataset) -> Result<StressReport> {
        dataset.validate()?;
        let started_at = clock::now_unix_secs();

        self.inner.start_monitors()?;
        let mut sweep = Sweep::default();
        let swept = match self.data_volume(dataset, &mut sweep).await {
            Ok(()) => self.concurrency(dataset, &mut sweep).await,
            Err(err) => Err(err),
        };
        let monitors = self.inner.stop_monitors();
        self.inner.finish(&swept);
        swept?;

        Ok(StressReport {
            started_at,
            finished_at: clock::now_unix_secs(),
            saturation_concurrency: find_saturation(
                &sweep.concurrency_curve,
                self.config.saturation_gain_pct,
            ),
            degradation: find_degradation(
                &sweep.volume_curve,
                self.config.degradation_drop_pct,
            ),
            data_volume: sweep.data_volume,
            concurrency: sweep.concurrency,
            skipped: sweep.skipped,
            failure_points: sweep.failure_points,
            volume_curve: sweep.volume_curve,
            concurrency_curve: sweep.concurrency_curve,
            monitors,
        })
    }

    async fn data_volume(&mut self, dataset: &Dataset, sweep: &mut Sweep) -> Result<()> {
        let cfg = self.config.clone();
        let resource: Arc<str> = self.inner.resource().clone();
        let available = dataset.records.len();

        for &size in &cfg.data_sizes {
            let cell = CellId::data_volume(cfg.batch_size, size, cfg.ingest_concurrency);
            if size > available {
                sweep.skip(
                    cell,
                    format!("requested {size} records but the dataset has {available}"),
                );
                continue;
            }

            let phases = vec![PhasePlan {
                kind: OperationKind::Ingest,
                operations: ingest_batches(&resource, &dataset.records[..size], cfg.batch_size),
                concurrency: cfg.ingest_concurrency,
                policy: SubmissionPolicy::Chunked,
            }];
            let stop = cfg.volume_stop;
            let report = self
                .inner
                .run_cell(cell.clone(), phases, |r| {
                    r.phase(OperationKind::Ingest)
                        .and_then(|p| stop.evaluate(&p.summary))
                })
                .await?;

            if let Some(p) = report.phase(OperationKind::Ingest) {
                sweep.volume_curve.push(ThroughputPoint {
                    level: size,
                    throughput: p.summary.throughput.records_per_sec,
                });
            }
            let stop_reason = report.stop_reason.clone();
            sweep.data_volume.push(report);
            if let Some(reason) = stop_reason {
                sweep.failure_points.push(FailurePoint { cell, reason });
                break;
            }
        }
        Ok(())
    }

    async fn concurrency(&mut self, dataset: &Dataset, sweep: &mut Sweep) -> Result<()> {
        let cfg = self.config.clone();
        let resource: Arc<str> = self.inner.resource().clone();
        let seed = &dataset.records[..cfg.seed_records.min(dataset.records.len())];

        for &level in &cfg.concurrency_levels {
            let cell = CellId::concurrency(cfg.batch_size, seed.len(), level);
            if dataset.queries.is_empty() {
                sweep.skip(cell, "no search queries configured".to_string());
                continue;
            }
            if level > cfg.max_concurrency {
                sweep.skip(
                    cell,
                    format!("concurrency {level} exceeds the maximum of {}", cfg.max_concurrency),
                );
                continue;
            }

            let mut phases = Vec::with_capacity(2);
            if !seed.is_empty() {
                phases.push(PhasePlan {
                    kind: OperationKind::Ingest,
                    operations: ingest_batches(&resource, seed, cfg.batch_size),
                    concurrency: cfg.ingest_concurrency,
                    policy: SubmissionPolicy::Chunked,
                });
            }
            phases.push(PhasePlan {
                kind: OperationKind::Search,
                operations: search_operations(&resource, &dataset.queries, level),
                concurrency: level,
                policy: SubmissionPolicy::PerOperation,
            });

            let stop = cfg.concurrency_stop;
            let report = self
                .inner
                .run_cell(cell.clone(), phases, |r| {
                    r.phase(OperationKind::Search)
                        .and_then(|p| stop.evaluate(&p.summary))
                })
                .await?;

            if let Some(p) = report.phase(OperationKind::Search) {
                sweep.concurrency_curve.push(ThroughputPoint {
                    level,
                    throughput: p.summary.throughput.aggregate_ops_per_sec,
                });
            }
            let stop_reason = report.stop_reason.clone();
            sweep.concurrency.push(report);
            if let Some(reason) = stop_reason {
                sweep.failure_points.push(FailurePoint { cell, reason });
                break;
            }
        }
        Ok(())
    }
}
