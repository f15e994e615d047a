mod cli;
mod config_yaml;
mod data;
mod exit_codes;
mod output;
mod run;
mod run_error;

use clap::Parser;
use mimalloc::MiMalloc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const LOG_ENV: &str = "KBLOAD_LOG";

fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        })
    });

    // Stdout carries reports; logs go to stderr.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

#[tokio::main]
async fn main() {
    let cli = match cli::Cli::try_parse() {
        Ok(v) => v,
        Err(err) => {
            use clap::error::ErrorKind;
            let _ = err.print();
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    exit_codes::ExitCode::Success.as_i32()
                }
                _ => exit_codes::ExitCode::InvalidInput.as_i32(),
            };
            std::process::exit(code);
        }
    };

    init_logging(cli.command.common().verbose);

    let result = match cli.command {
        cli::Command::Benchmark(args) => run::benchmark(args).await,
        cli::Command::Stress(args) => run::stress(args).await,
    };

    let code = match result {
        Ok(code) => code.as_i32(),
        Err(err) => {
            eprintln!("{err}");
            err.exit_code().as_i32()
        }
    };

    std::process::exit(code);
}
