use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use kbload_core::stats::{Baseline, ComparisonStatus};
use kbload_core::{
    BenchmarkConfig, BenchmarkDriver, Dataset, OperationKind, ResourceMonitor, RunSettings,
    ScenarioDriver, StressConfig, StressDriver,
};
use kbload_http::SqlServiceClient;

use crate::cli::{BenchmarkArgs, CommonArgs, StressArgs};
use crate::config_yaml::{self, ConfigYaml};
use crate::data;
use crate::exit_codes::ExitCode;
use crate::output::{self, BaselineSection, OutputFormatter, ReportDoc, RunHeader};
use crate::run_error::RunError;

/// MindsDB's default HTTP API address.
pub(crate) const DEFAULT_URL: &str = "http://127.0.0.1:47334";

pub async fn benchmark(args: BenchmarkArgs) -> Result<ExitCode, RunError> {
    let out = output::formatter(args.common.output);
    let ctx = RunContext::resolve(&args.common).await?;

    let mut cfg = BenchmarkConfig::default();
    ctx.file.apply_benchmark(&mut cfg);
    if !args.batch_sizes.is_empty() {
        cfg.batch_sizes.clone_from(&args.batch_sizes);
    }
    if let Some(v) = args.iterations {
        cfg.iterations = v;
    }
    if let Some(v) = args.concurrency {
        cfg.ingest_concurrency = v;
    }
    if let Some(v) = args.search_concurrency {
        cfg.search_concurrency = v;
    }
    if let Some(v) = args.search_rounds {
        cfg.search_rounds = v;
    }

    let baseline = match &args.baseline {
        Some(path) => Some(Baseline::load(path).map_err(|err| {
            RunError::InvalidInput(
                anyhow::Error::new(err)
                    .context(format!("failed to load baseline: {}", path.display())),
            )
        })?),
        None => None,
    };

    let inner = ctx.scenario_driver(out.as_ref())?;
    let mut driver = BenchmarkDriver::new(inner, cfg)
        .map_err(|err| RunError::from_core("invalid benchmark config", err))?;

    out.print_header(&ctx.header("benchmark"));
    tracing::info!(url = %ctx.url, pid = ctx.target_pid, "starting benchmark");

    let report = driver
        .run(&ctx.dataset)
        .await
        .map_err(|err| RunError::from_core("benchmark failed", err))?;

    let current = Baseline::from_summary(
        format!("{} ingest", ctx.settings.resource_name),
        &report.combined(OperationKind::Ingest),
    );

    let section = baseline.map(|baseline| {
        let comparisons = baseline.compare(&current);
        let regressed = comparisons
            .iter()
            .any(|c| c.change.status == ComparisonStatus::Degraded);
        BaselineSection {
            baseline,
            current: current.clone(),
            comparisons,
            regressed,
        }
    });

    let doc = ReportDoc::Benchmark {
        report: &report,
        baseline: section.as_ref(),
    };
    out.print_report(&doc).map_err(RunError::RuntimeError)?;
    write_report(args.common.out.as_deref(), &doc)
        .await
        .map_err(RunError::RuntimeError)?;

    if let Some(path) = &args.save_baseline {
        current
            .save(path)
            .with_context(|| format!("failed to save baseline: {}", path.display()))
            .map_err(RunError::RuntimeError)?;
    }

    let regressed = section.as_ref().is_some_and(|s| s.regressed);
    Ok(ExitCode::from_quality_gates(
        false,
        regressed && args.fail_on_regression,
    ))
}

pub async fn stress(args: StressArgs) -> Result<ExitCode, RunError> {
    let out = output::formatter(args.common.output);
    let ctx = RunContext::resolve(&args.common).await?;

    let mut cfg = StressConfig::default();
    ctx.file.apply_stress(&mut cfg);
    if !args.data_sizes.is_empty() {
        cfg.data_sizes.clone_from(&args.data_sizes);
    }
    if !args.concurrency_levels.is_empty() {
        cfg.concurrency_levels.clone_from(&args.concurrency_levels);
    }
    if let Some(v) = args.batch_size {
        cfg.batch_size = v;
    }
    if let Some(v) = args.concurrency {
        cfg.ingest_concurrency = v;
    }
    if let Some(v) = args.max_concurrency {
        cfg.max_concurrency = v;
    }
    if let Some(v) = args.seed_records {
        cfg.seed_records = v;
    }
    if let Some(v) = args.min_records_per_sec {
        cfg.volume_stop.min_records_per_sec = Some(v);
    }
    if let Some(v) = args.max_latency {
        cfg.concurrency_stop.max_mean_latency = Some(v);
    }
    if let Some(v) = args.min_success_rate {
        cfg.concurrency_stop.min_success_rate = Some(v);
    }

    let inner = ctx.scenario_driver(out.as_ref())?;
    let mut driver = StressDriver::new(inner, cfg)
        .map_err(|err| RunError::from_core("invalid stress config", err))?;

    out.print_header(&ctx.header("stress"));
    tracing::info!(url = %ctx.url, pid = ctx.target_pid, "starting stress test");

    let report = driver
        .run(&ctx.dataset)
        .await
        .map_err(|err| RunError::from_core("stress test failed", err))?;

    let doc = ReportDoc::Stress { report: &report };
    out.print_report(&doc).map_err(RunError::RuntimeError)?;
    write_report(args.common.out.as_deref(), &doc)
        .await
        .map_err(RunError::RuntimeError)?;

    let limit_hit = !report.failure_points.is_empty();
    Ok(ExitCode::from_quality_gates(
        limit_hit && args.fail_on_limit,
        false,
    ))
}

/// Inputs shared by both commands, merged from flags, config file and defaults.
struct RunContext {
    file: ConfigYaml,
    url: String,
    target_pid: u32,
    settings: RunSettings,
    dataset: Dataset,
}

impl RunContext {
    async fn resolve(common: &CommonArgs) -> Result<Self, RunError> {
        let file = match &common.config {
            Some(path) => config_yaml::load(path)
                .await
                .map_err(RunError::InvalidInput)?,
            None => ConfigYaml::default(),
        };

        let url = common
            .url
            .clone()
            .or_else(|| file.url.clone())
            .unwrap_or_else(|| DEFAULT_URL.to_string());

        let target_pid = common
            .target_pid
            .or(file.target_pid)
            .context("no target process given (use --target-pid, KBLOAD_TARGET_PID or `target_pid:` in the config file)")
            .map_err(RunError::InvalidInput)?;

        let mut settings = RunSettings::default();
        file.apply_settings(&mut settings);
        if let Some(v) = &common.resource {
            settings.resource_name.clone_from(v);
        }
        if let Some(v) = common.timeout {
            settings.timeout = v;
        }
        if let Some(v) = common.sample_interval {
            settings.sample_interval = v;
        }
        if common.keep_existing {
            settings.drop_existing = false;
        }
        settings
            .validate()
            .map_err(|err| RunError::from_core("invalid settings", err))?;

        let data_path = common.data.as_deref().or(file.data.as_deref());
        let queries_path = common.queries.as_deref().or(file.queries.as_deref());
        let dataset = data::load_dataset(data_path, queries_path)
            .await
            .map_err(RunError::InvalidInput)?;
        dataset
            .validate()
            .map_err(|err| RunError::from_core("invalid dataset", err))?;

        Ok(Self {
            file,
            url,
            target_pid,
            settings,
            dataset,
        })
    }

    fn scenario_driver(
        &self,
        out: &dyn OutputFormatter,
    ) -> Result<ScenarioDriver<SqlServiceClient>, RunError> {
        let client = SqlServiceClient::new(&self.url, self.file.knowledge_base.clone())
            .context("invalid service url")
            .map_err(RunError::InvalidInput)?
            .with_request_timeout(Some(self.settings.timeout))
            .with_search_limit(self.file.search_limit);

        let target = ResourceMonitor::new(self.target_pid);
        if target.sample_once().is_none() {
            return Err(RunError::InvalidInput(anyhow::anyhow!(
                "target process {} not found or not readable",
                self.target_pid
            )));
        }

        let mut driver = ScenarioDriver::new(
            Arc::new(client),
            Arc::new(target),
            Arc::new(ResourceMonitor::current_process()),
            self.settings.clone(),
        )
        .map_err(|err| RunError::from_core("invalid settings", err))?;

        if let Some(progress) = out.progress() {
            driver = driver.with_progress(progress);
        }
        if let Some(observer) = out.observer() {
            driver = driver.with_observer(observer);
        }
        Ok(driver)
    }

    fn header(&self, command: &'static str) -> RunHeader {
        RunHeader {
            command,
            url: self.url.clone(),
            resource: self.settings.resource_name.clone(),
            target_pid: self.target_pid,
            records: self.dataset.records.len(),
            queries: self.dataset.queries.len(),
        }
    }
}

async fn write_report(path: Option<&Path>, doc: &ReportDoc<'_>) -> anyhow::Result<()> {
    let Some(path) = path else {
        return Ok(());
    };

    let json = serde_json::to_vec_pretty(doc).context("failed to serialize report")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create report dir: {}", parent.display()))?;
    }
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("failed to write report: {}", path.display()))
}
