use std::sync::Arc;

use super::driver::{PhasePlan, ScenarioDriver};
use super::report::{BatchSizeAverage, BenchmarkReport, CellReport};
use super::state::CellId;
use crate::client::ServiceClient;
use crate::clock;
use crate::config::{BenchmarkConfig, Dataset};
use crate::dispatch::SubmissionPolicy;
use crate::operation::{OperationKind, ingest_batches, search_operations};
use crate::stats::IterationAverage;
use crate::Result;

/// Runs every batch size for a fixed number of iterations, each on a fresh resource.
#[derive(Debug)]
pub struct BenchmarkDriver<C> {
    inner: ScenarioDriver<C>,
    config: BenchmarkConfig,
}

impl<C: ServiceClient> BenchmarkDriver<C> {
    pub fn new(inner: ScenarioDriver<C>, config: BenchmarkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { inner, config })
    }

    pub fn driver(&self) -> &ScenarioDriver<C> {
        &self.inner
    }

    pub async fn run(&mut self, dataset: &Dataset) -> Result<BenchmarkReport> {
        dataset.validate()?;
        let started_at = clock::now_unix_secs();

        self.inner.start_monitors()?;
        let swept = self.sweep(dataset).await;
        let monitors = self.inner.stop_monitors();
        self.inner.finish(&swept);
        let cells = swept?;

        let batch_sizes = self
            .config
            .batch_sizes
            .iter()
            .map(|&batch_size| average_for(&cells, batch_size))
            .collect();

        Ok(BenchmarkReport {
            started_at,
            finished_at: clock::now_unix_secs(),
            cells,
            batch_sizes,
            monitors,
        })
    }

    async fn sweep(&mut self, dataset: &Dataset) -> Result<Vec<CellReport>> {
        let cfg = self.config.clone();
        let resource: Arc<str> = self.inner.resource().clone();
        let mut cells = Vec::with_capacity(cfg.batch_sizes.len() * cfg.iterations);

        for &batch_size in &cfg.batch_sizes {
            for iteration in 1..=cfg.iterations {
                let cell = CellId::benchmark(
                    batch_size,
                    dataset.records.len(),
                    cfg.ingest_concurrency,
                    iteration,
                );
                let mut phases = vec![PhasePlan {
                    kind: OperationKind::Ingest,
                    operations: ingest_batches(&resource, &dataset.records, batch_size),
                    concurrency: cfg.ingest_concurrency,
                    policy: SubmissionPolicy::Chunked,
                }];
                if !dataset.queries.is_empty() {
                    phases.push(PhasePlan {
                        kind: OperationKind::Search,
                        operations: search_operations(&resource, &dataset.queries, cfg.search_rounds),
                        concurrency: cfg.search_concurrency,
                        policy: SubmissionPolicy::PerOperation,
                    });
                }

                cells.push(self.inner.run_cell(cell, phases, |_| None).await?);
            }
        }

        Ok(cells)
    }
}

fn average_for(cells: &[CellReport], batch_size: usize) -> BatchSizeAverage {
    let matching = || cells.iter().filter(move |c| c.cell.batch_size == batch_size);
    let ingest = IterationAverage::from_summaries(
        matching().filter_map(|c| c.phase(OperationKind::Ingest).map(|p| &p.summary)),
    );
    let searches: Vec<_> = matching()
        .filter_map(|c| c.phase(OperationKind::Search).map(|p| &p.summary))
        .collect();
    let search = (!searches.is_empty()).then(|| IterationAverage::from_summaries(searches));

    BatchSizeAverage {
        batch_size,
        ingest,
        search,
    }
}
