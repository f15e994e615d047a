use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::time::Duration;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let mut bind_addr: SocketAddr = "127.0.0.1:0".parse()?;
    let mut options = kbload_testserver::TestServerOptions::default();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--bind" => {
                let addr = args.next().ok_or_else(|| {
                    anyhow::anyhow!("--bind requires an address, e.g. 127.0.0.1:0")
                })?;
                bind_addr = addr.parse()?;
            }
            "--latency-ms" => {
                let ms = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--latency-ms requires a number"))?;
                options.latency = Duration::from_millis(ms.parse()?);
            }
            "--row-latency-ms" => {
                let ms = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--row-latency-ms requires a number"))?;
                options.per_row_latency = Duration::from_millis(ms.parse()?);
            }
            "-h" | "--help" => {
                eprintln!(
                    "kbload-testserver\n\nUSAGE:\n  kbload-testserver [--bind 127.0.0.1:0] [--latency-ms N] [--row-latency-ms N]\n\nOUTPUT:\n  Prints HTTP_URL=<url> and PID=<pid> to stdout once ready."
                );
                return Ok(());
            }
            other => {
                return Err(anyhow::anyhow!("unknown argument: {other}"));
            }
        }
    }

    let listener = TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;

    let stats = kbload_testserver::TestServerStats::default();
    let app = kbload_testserver::router(stats, options);

    println!("HTTP_URL=http://{addr}");
    println!("PID={}", std::process::id());

    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = tokio::signal::ctrl_c().await;
    });

    serve.await?;
    Ok(())
}
