use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::Context as _;
use kbload_testserver::TestServer;
use serde_json::Value;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Runs the binary against `server`, sampling this test process as the target.
async fn run_kbload(server: &TestServer, args: Vec<String>) -> anyhow::Result<Output> {
    let exe = env!("CARGO_BIN_EXE_kbload");
    let base_url = server.base_url().to_string();
    let pid = std::process::id().to_string();

    tokio::task::spawn_blocking(move || {
        Command::new(exe)
            .args(&args)
            .arg("--url")
            .arg(&base_url)
            .arg("--target-pid")
            .arg(&pid)
            .arg("--config")
            .arg(fixture("kbload.yaml"))
            .env_remove("KBLOAD_URL")
            .env_remove("KBLOAD_TARGET_PID")
            .output()
    })
    .await
    .context("spawn_blocking join")?
    .context("run kbload binary")
}

fn ensure_success(out: &Output) -> anyhow::Result<()> {
    anyhow::ensure!(
        out.status.success(),
        "kbload failed ({:?})\nstdout:\n{}\nstderr:\n{}",
        out.status.code(),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );
    Ok(())
}

fn json_lines(stdout: &[u8]) -> anyhow::Result<Vec<Value>> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).with_context(|| format!("not json: {l}")))
        .collect()
}

fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

#[tokio::test]
async fn benchmark_json_report_covers_every_cell() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;

    let out = run_kbload(&server, args(&["benchmark", "--output", "json"])).await?;
    ensure_success(&out)?;

    let lines = json_lines(&out.stdout)?;
    let first = lines.first().context("no output lines")?;
    anyhow::ensure!(first["kind"] == "header", "unexpected first line: {first}");
    anyhow::ensure!(first["records"] == 20 && first["queries"] == 3);

    let last = lines.last().context("no output lines")?;
    anyhow::ensure!(last["kind"] == "benchmark", "unexpected last line: {last}");

    let cells = last["report"]["cells"]
        .as_array()
        .context("cells array")?;
    anyhow::ensure!(cells.len() == 2, "expected 2 cells, got {}", cells.len());

    for cell in cells {
        let phases = cell["phases"].as_array().context("phases array")?;
        let ingest = phases
            .iter()
            .find(|p| p["kind"] == "ingest")
            .context("ingest phase")?;
        anyhow::ensure!(ingest["summary"]["failures"] == 0, "ingest failed: {ingest}");
        anyhow::ensure!(ingest["summary"]["records"] == 20);
        anyhow::ensure!(cell["row_count"] == 20, "row count missing: {}", cell["row_count"]);
        anyhow::ensure!(cell["setup_time"].as_f64().is_some_and(|s| s >= 0.0));
        anyhow::ensure!(cell["teardown_time"].as_f64().is_some_and(|s| s >= 0.0));
        anyhow::ensure!(
            ingest["results"].as_array().map(Vec::len) == ingest["summary"]["total"].as_u64().map(|n| n as usize),
            "results missing from report"
        );

        let search = phases
            .iter()
            .find(|p| p["kind"] == "search")
            .context("search phase")?;
        anyhow::ensure!(search["summary"]["total"] == 3);
    }

    let batch_sizes = last["report"]["batch_sizes"]
        .as_array()
        .context("batch_sizes array")?;
    anyhow::ensure!(batch_sizes.len() == 2);
    anyhow::ensure!(last["report"]["monitors"]["target"]["pid"] == std::process::id());

    anyhow::ensure!(server.stats().rows_inserted() == 40);
    anyhow::ensure!(server.stats().searches_total() == 6);
    anyhow::ensure!(server.stats().created_total() == 2);
    anyhow::ensure!(server.stats().dropped_total() == 2);

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn benchmark_human_output_and_baseline_round_trip() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let dir = tempfile::tempdir()?;
    let baseline = dir.path().join("baseline.json");
    let baseline_arg = baseline.display().to_string();

    let out = run_kbload(
        &server,
        args(&["benchmark", "--batch-sizes", "10", "--save-baseline", &baseline_arg]),
    )
    .await?;
    ensure_success(&out)?;

    let stdout = String::from_utf8_lossy(&out.stdout);
    anyhow::ensure!(stdout.contains("summary: benchmark"), "stdout:\n{stdout}");
    anyhow::ensure!(stdout.contains("batch=10 ingest"), "stdout:\n{stdout}");
    anyhow::ensure!(stdout.contains("resource: create="), "stdout:\n{stdout}");
    anyhow::ensure!(stdout.contains("rows=20"), "stdout:\n{stdout}");
    anyhow::ensure!(baseline.exists(), "baseline file not written");

    let saved: Value = serde_json::from_slice(&std::fs::read(&baseline)?)?;
    anyhow::ensure!(saved["success_rate"] == 1.0, "baseline: {saved}");

    let out = run_kbload(
        &server,
        args(&["benchmark", "--batch-sizes", "10", "--baseline", &baseline_arg]),
    )
    .await?;
    ensure_success(&out)?;
    let stdout = String::from_utf8_lossy(&out.stdout);
    anyhow::ensure!(stdout.contains("baseline comparison"), "stdout:\n{stdout}");
    anyhow::ensure!(stdout.contains("success_rate"), "stdout:\n{stdout}");

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn stress_writes_report_with_skips() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let dir = tempfile::tempdir()?;
    let report_path = dir.path().join("reports/stress.json");
    let report_arg = report_path.display().to_string();

    let out = run_kbload(
        &server,
        args(&["stress", "--output", "json", "--out", &report_arg]),
    )
    .await?;
    ensure_success(&out)?;

    let doc: Value = serde_json::from_slice(&std::fs::read(&report_path)?)?;
    anyhow::ensure!(doc["kind"] == "stress", "unexpected report: {doc}");

    let report = &doc["report"];
    let volume = report["data_volume"].as_array().context("data_volume")?;
    let concurrency = report["concurrency"].as_array().context("concurrency")?;
    anyhow::ensure!(volume.len() == 2, "volume cells: {}", volume.len());
    anyhow::ensure!(concurrency.len() == 2, "concurrency cells: {}", concurrency.len());

    let skipped = report["skipped"].as_array().context("skipped")?;
    anyhow::ensure!(skipped.len() == 2, "skipped: {skipped:?}");
    anyhow::ensure!(report["failure_points"].as_array().is_some_and(Vec::is_empty));

    // users=2 issues every query once per user
    let users2 = concurrency
        .iter()
        .find(|c| c["cell"]["concurrency"] == 2)
        .context("users=2 cell")?;
    let search = users2["phases"]
        .as_array()
        .and_then(|p| p.iter().find(|p| p["kind"] == "search"))
        .context("search phase")?;
    anyhow::ensure!(search["summary"]["total"] == 6);
    anyhow::ensure!(search["policy"] == "per_operation");

    server.shutdown().await;
    Ok(())
}
