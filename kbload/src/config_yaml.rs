use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use kbload_core::{BenchmarkConfig, RunSettings, StopConditions, StressConfig};
use kbload_http::KnowledgeBaseSpec;
use serde::Deserialize;

/// Config file shape. Every field is optional; CLI flags take priority.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ConfigYaml {
    pub url: Option<String>,
    pub target_pid: Option<u32>,
    pub resource: Option<String>,
    pub timeout: Option<YamlDuration>,
    pub sample_interval: Option<YamlDuration>,
    pub progress_interval: Option<YamlDuration>,
    pub drop_existing: Option<bool>,

    /// Resolved against the config file's directory when relative.
    pub data: Option<PathBuf>,
    pub queries: Option<PathBuf>,

    /// Maximum rows per search statement.
    pub search_limit: Option<usize>,
    pub knowledge_base: KnowledgeBaseSpec,

    pub benchmark: BenchmarkYaml,
    pub stress: StressYaml,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct BenchmarkYaml {
    pub batch_sizes: Option<Vec<usize>>,
    pub iterations: Option<usize>,
    pub ingest_concurrency: Option<usize>,
    pub search_concurrency: Option<usize>,
    pub search_rounds: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct StressYaml {
    pub batch_size: Option<usize>,
    pub ingest_concurrency: Option<usize>,
    pub data_sizes: Option<Vec<usize>>,
    pub concurrency_levels: Option<Vec<usize>>,
    pub max_concurrency: Option<usize>,
    pub seed_records: Option<usize>,
    pub saturation_gain_pct: Option<f64>,
    pub degradation_drop_pct: Option<f64>,

    /// Replaces the default data-volume stop conditions when present.
    pub volume_stop: Option<StopYaml>,
    /// Replaces the default concurrency stop conditions when present.
    pub concurrency_stop: Option<StopYaml>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct StopYaml {
    pub min_throughput_ops: Option<f64>,
    pub min_records_per_sec: Option<f64>,
    pub max_mean_latency: Option<YamlDuration>,
    pub min_success_rate: Option<f64>,
}

impl From<StopYaml> for StopConditions {
    fn from(value: StopYaml) -> Self {
        Self {
            min_throughput_ops: value.min_throughput_ops,
            min_records_per_sec: value.min_records_per_sec,
            max_mean_latency: value.max_mean_latency.map(YamlDuration::into_inner),
            min_success_rate: value.min_success_rate,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct YamlDuration(Duration);

impl YamlDuration {
    pub(crate) fn into_inner(self) -> Duration {
        self.0
    }
}

impl<'de> Deserialize<'de> for YamlDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl serde::de::Visitor<'_> for V {
            type Value = YamlDuration;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("duration as string (e.g. 10s), integer seconds, or float seconds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(YamlDuration(Duration::from_secs(v)))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if v <= 0 {
                    return Err(E::custom("duration must be positive"));
                }
                Ok(YamlDuration(Duration::from_secs(v as u64)))
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if !v.is_finite() || v <= 0.0 {
                    return Err(E::custom("duration must be a positive, finite number"));
                }
                Ok(YamlDuration(Duration::from_secs_f64(v)))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let d = humantime::parse_duration(v).map_err(E::custom)?;
                Ok(YamlDuration(d))
            }
        }

        deserializer.deserialize_any(V)
    }
}

pub(crate) async fn load(path: &Path) -> anyhow::Result<ConfigYaml> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    let mut doc = parse(&bytes).with_context(|| format!("failed to parse YAML: {}", path.display()))?;

    let base = path.parent().unwrap_or_else(|| Path::new(""));
    doc.data = doc.data.map(|p| resolve(base, p));
    doc.queries = doc.queries.map(|p| resolve(base, p));
    Ok(doc)
}

fn parse(bytes: &[u8]) -> anyhow::Result<ConfigYaml> {
    // An empty file deserializes as unit; treat it as "no overrides".
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(ConfigYaml::default());
    }
    Ok(serde_yaml::from_slice(bytes)?)
}

fn resolve(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

impl ConfigYaml {
    pub(crate) fn apply_settings(&self, settings: &mut RunSettings) {
        if let Some(v) = &self.resource {
            settings.resource_name.clone_from(v);
        }
        if let Some(v) = self.timeout {
            settings.timeout = v.into_inner();
        }
        if let Some(v) = self.sample_interval {
            settings.sample_interval = v.into_inner();
        }
        if let Some(v) = self.progress_interval {
            settings.progress_interval = v.into_inner();
        }
        if let Some(v) = self.drop_existing {
            settings.drop_existing = v;
        }
    }

    pub(crate) fn apply_benchmark(&self, cfg: &mut BenchmarkConfig) {
        let b = &self.benchmark;
        if let Some(v) = &b.batch_sizes {
            cfg.batch_sizes.clone_from(v);
        }
        if let Some(v) = b.iterations {
            cfg.iterations = v;
        }
        if let Some(v) = b.ingest_concurrency {
            cfg.ingest_concurrency = v;
        }
        if let Some(v) = b.search_concurrency {
            cfg.search_concurrency = v;
        }
        if let Some(v) = b.search_rounds {
            cfg.search_rounds = v;
        }
    }

    pub(crate) fn apply_stress(&self, cfg: &mut StressConfig) {
        let s = &self.stress;
        if let Some(v) = s.batch_size {
            cfg.batch_size = v;
        }
        if let Some(v) = s.ingest_concurrency {
            cfg.ingest_concurrency = v;
        }
        if let Some(v) = &s.data_sizes {
            cfg.data_sizes.clone_from(v);
        }
        if let Some(v) = &s.concurrency_levels {
            cfg.concurrency_levels.clone_from(v);
        }
        if let Some(v) = s.max_concurrency {
            cfg.max_concurrency = v;
        }
        if let Some(v) = s.seed_records {
            cfg.seed_records = v;
        }
        if let Some(v) = s.saturation_gain_pct {
            cfg.saturation_gain_pct = v;
        }
        if let Some(v) = s.degradation_drop_pct {
            cfg.degradation_drop_pct = v;
        }
        if let Some(v) = s.volume_stop {
            cfg.volume_stop = v.into();
        }
        if let Some(v) = s.concurrency_stop {
            cfg.concurrency_stop = v.into();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
url: http://127.0.0.1:47334
target_pid: 4242
resource: bench_kb
timeout: 2s
sample_interval: 0.5
data: data/records.json
queries: /abs/queries.json
knowledge_base:
  content_columns: [content]
  metadata_columns: [category]
  id_column: id
benchmark:
  batch_sizes: [5, 25]
  iterations: 2
stress:
  data_sizes: [10, 20]
  concurrency_levels: [1, 2]
  concurrency_stop:
    max_mean_latency: 750ms
"#;

    #[test]
    fn parses_full_document() {
        let doc = match parse(DOC.as_bytes()) {
            Ok(v) => v,
            Err(err) => panic!("parse failed: {err:#}"),
        };

        assert_eq!(doc.url.as_deref(), Some("http://127.0.0.1:47334"));
        assert_eq!(doc.target_pid, Some(4242));
        assert_eq!(doc.timeout.map(YamlDuration::into_inner), Some(Duration::from_secs(2)));
        assert_eq!(
            doc.sample_interval.map(YamlDuration::into_inner),
            Some(Duration::from_millis(500))
        );
        assert_eq!(doc.knowledge_base.content_columns, vec!["content".to_string()]);
        assert_eq!(doc.knowledge_base.id_column.as_deref(), Some("id"));

        let mut settings = RunSettings::default();
        doc.apply_settings(&mut settings);
        assert_eq!(settings.resource_name, "bench_kb");
        assert_eq!(settings.timeout, Duration::from_secs(2));
        assert!(settings.drop_existing);

        let mut bench = BenchmarkConfig::default();
        doc.apply_benchmark(&mut bench);
        assert_eq!(bench.batch_sizes, vec![5, 25]);
        assert_eq!(bench.iterations, 2);
        assert_eq!(bench.search_rounds, BenchmarkConfig::default().search_rounds);

        let mut stress = StressConfig::default();
        doc.apply_stress(&mut stress);
        assert_eq!(stress.data_sizes, vec![10, 20]);
        assert_eq!(stress.concurrency_levels, vec![1, 2]);
        assert_eq!(
            stress.concurrency_stop.max_mean_latency,
            Some(Duration::from_millis(750))
        );
        assert_eq!(stress.concurrency_stop.min_success_rate, None);
        assert_eq!(stress.volume_stop, StressConfig::default().volume_stop);
    }

    #[test]
    fn empty_document_is_defaults() {
        let doc = match parse(b"  \n") {
            Ok(v) => v,
            Err(err) => panic!("parse failed: {err:#}"),
        };
        assert!(doc.url.is_none());
        assert!(doc.benchmark.batch_sizes.is_none());
    }

    #[test]
    fn rejects_unknown_fields_and_bad_durations() {
        assert!(parse(b"urll: http://x\n").is_err());
        assert!(parse(b"timeout: -3\n").is_err());
        assert!(parse(b"timeout: soon\n").is_err());
    }

    #[tokio::test]
    async fn load_resolves_relative_paths() {
        let dir = match tempfile::tempdir() {
            Ok(v) => v,
            Err(err) => panic!("tempdir: {err}"),
        };
        let path = dir.path().join("kbload.yaml");
        if let Err(err) = std::fs::write(&path, DOC) {
            panic!("write config: {err}");
        }

        let doc = match load(&path).await {
            Ok(v) => v,
            Err(err) => panic!("load failed: {err:#}"),
        };
        assert_eq!(doc.data, Some(dir.path().join("data/records.json")));
        assert_eq!(doc.queries, Some(PathBuf::from("/abs/queries.json")));
    }
}
