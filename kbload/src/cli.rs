use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration cannot be empty (expected e.g. 10s, 250ms, 1m)".to_string());
    }

    // Bare numbers are seconds.
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    humantime::parse_duration(s)
        .map_err(|_| format!("invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"))
}

fn parse_rate(input: &str) -> Result<f64, String> {
    let v: f64 = input
        .trim()
        .parse()
        .map_err(|_| format!("invalid rate '{input}' (expected a number within 0..=1)"))?;
    if (0.0..=1.0).contains(&v) {
        Ok(v)
    } else {
        Err(format!("rate '{input}' must be within 0..=1"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary.
    #[default]
    HumanReadable,
    /// Emit JSON progress lines and a final report line (NDJSON) to stdout.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "kbload",
    author,
    version,
    about = "Benchmark and stress harness for knowledge-base ingestion/search services",
    long_about = "kbload drives a knowledge-base service through ingestion and search workloads while sampling the CPU, memory, IO and descriptors of the service process and of itself.\n\nA YAML config file (--config) supplies defaults; CLI flags override it.",
    after_help = "Examples:\n  kbload benchmark --url http://127.0.0.1:47334 --target-pid 4242 --data records.json --queries queries.json\n  kbload benchmark --config kbload.yaml --save-baseline baseline.json\n  kbload stress --config kbload.yaml --concurrency-levels 1,5,10 --output json --out report.json"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the batch-size x iterations benchmark matrix
    #[command(
        long_about = "For every batch size, run `iterations` cells. Each cell creates the knowledge base, ingests the dataset in batches, runs the search queries and drops the knowledge base."
    )]
    Benchmark(BenchmarkArgs),

    /// Escalate data volume and concurrent users until a stop condition triggers
    Stress(StressArgs),
}

#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// YAML config file (CLI flags override its values)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Base URL of the service (e.g. http://127.0.0.1:47334)
    #[arg(long, env = "KBLOAD_URL")]
    pub url: Option<String>,

    /// PID of the service process to sample
    #[arg(long, env = "KBLOAD_TARGET_PID")]
    pub target_pid: Option<u32>,

    /// Knowledge base created and dropped for every cell
    #[arg(long)]
    pub resource: Option<String>,

    /// Per-operation timeout (e.g. 30s, 500ms)
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Background resource sampling interval
    #[arg(long, value_parser = parse_duration)]
    pub sample_interval: Option<Duration>,

    /// Keep a leftover knowledge base with the same name instead of dropping it first
    #[arg(long)]
    pub keep_existing: bool,

    /// JSON array of records to ingest
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// JSON array of search queries (strings or {"query", "filters"} objects)
    #[arg(long)]
    pub queries: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,

    /// Write the full JSON report to this file
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug); KBLOAD_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Args)]
pub struct BenchmarkArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Batch sizes to sweep (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub batch_sizes: Vec<usize>,

    /// Iterations per batch size
    #[arg(long)]
    pub iterations: Option<usize>,

    /// Concurrent ingest workers
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Concurrent search workers
    #[arg(long)]
    pub search_concurrency: Option<usize>,

    /// Times the query list is issued per cell
    #[arg(long)]
    pub search_rounds: Option<usize>,

    /// Compare the ingest results against this baseline file
    #[arg(long)]
    pub baseline: Option<PathBuf>,

    /// Save the ingest results as a baseline file
    #[arg(long)]
    pub save_baseline: Option<PathBuf>,

    /// Exit with a non-zero code when a metric degraded against --baseline
    #[arg(long, requires = "baseline")]
    pub fail_on_regression: bool,
}

#[derive(Debug, Clone, Args)]
pub struct StressArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Data sizes (records) for the data-volume dimension (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub data_sizes: Vec<usize>,

    /// Ingest batch size
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Concurrent ingest workers
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Concurrent users for the concurrency dimension (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub concurrency_levels: Vec<usize>,

    /// Concurrency levels above this are skipped
    #[arg(long)]
    pub max_concurrency: Option<usize>,

    /// Records ingested before the searches of each concurrency cell
    #[arg(long)]
    pub seed_records: Option<usize>,

    /// Data-volume stop condition: minimum records/sec
    #[arg(long)]
    pub min_records_per_sec: Option<f64>,

    /// Concurrency stop condition: maximum mean latency
    #[arg(long, value_parser = parse_duration)]
    pub max_latency: Option<Duration>,

    /// Concurrency stop condition: minimum success rate (0..=1)
    #[arg(long, value_parser = parse_rate)]
    pub min_success_rate: Option<f64>,

    /// Exit with a non-zero code when a stop condition triggered
    #[arg(long)]
    pub fail_on_limit: bool,
}

impl Command {
    pub fn common(&self) -> &CommonArgs {
        match self {
            Self::Benchmark(args) => &args.common,
            Self::Stress(args) => &args.common,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_accepts_common_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("10s"), Ok(Duration::from_secs(10)));
        assert_eq!(parse_duration("1m"), Ok(Duration::from_secs(60)));
        assert_eq!(parse_duration("5"), Ok(Duration::from_secs(5)));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("10x").is_err());
    }

    #[test]
    fn parse_rate_bounds() {
        assert_eq!(parse_rate("0.95"), Ok(0.95));
        assert!(parse_rate("1.5").is_err());
        assert!(parse_rate("x").is_err());
    }

    #[test]
    fn cli_parses_benchmark() {
        let parsed = Cli::try_parse_from([
            "kbload",
            "benchmark",
            "--url",
            "http://127.0.0.1:47334",
            "--target-pid",
            "42",
            "--batch-sizes",
            "10,50",
            "--iterations",
            "2",
            "--timeout",
            "250ms",
            "--output",
            "json",
            "-vv",
        ]);

        let cli = match parsed {
            Ok(v) => v,
            Err(err) => panic!("failed to parse args: {err}"),
        };

        match cli.command {
            Command::Benchmark(args) => {
                assert_eq!(args.common.url.as_deref(), Some("http://127.0.0.1:47334"));
                assert_eq!(args.common.target_pid, Some(42));
                assert_eq!(args.batch_sizes, vec![10, 50]);
                assert_eq!(args.iterations, Some(2));
                assert_eq!(args.common.timeout, Some(Duration::from_millis(250)));
                assert_eq!(args.common.output, OutputFormat::Json);
                assert_eq!(args.common.verbose, 2);
                assert!(!args.fail_on_regression);
            }
            Command::Stress(_) => panic!("expected benchmark command"),
        }
    }

    #[test]
    fn cli_parses_stress_defaults() {
        let parsed = Cli::try_parse_from(["kbload", "stress", "--concurrency-levels", "1,5"]);
        let cli = match parsed {
            Ok(v) => v,
            Err(err) => panic!("failed to parse args: {err}"),
        };

        match cli.command {
            Command::Stress(args) => {
                assert_eq!(args.concurrency_levels, vec![1, 5]);
                assert!(args.data_sizes.is_empty());
                assert!(!args.fail_on_limit);
                assert_eq!(args.common.output, OutputFormat::HumanReadable);
            }
            Command::Benchmark(_) => panic!("expected stress command"),
        }
    }

    #[test]
    fn fail_on_regression_requires_baseline() {
        let parsed = Cli::try_parse_from(["kbload", "benchmark", "--fail-on-regression"]);
        assert!(parsed.is_err());
    }
}
