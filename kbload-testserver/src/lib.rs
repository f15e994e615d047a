use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Json;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{Duration, sleep};

mod statement;

use statement::Statement;

pub const PATH_SQL_QUERY: &str = "/api/sql/query";

/// Behavior knobs for the emulated service.
#[derive(Debug, Clone, Default)]
pub struct TestServerOptions {
    /// Delay added to every statement.
    pub latency: Duration,
    /// Extra delay per inserted row.
    pub per_row_latency: Duration,
    /// Fail every `CREATE KNOWLEDGE_BASE`.
    pub fail_create: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    requests_total: Arc<AtomicU64>,
    failed_total: Arc<AtomicU64>,
    rows_inserted: Arc<AtomicU64>,
    searches_total: Arc<AtomicU64>,
    created_total: Arc<AtomicU64>,
    dropped_total: Arc<AtomicU64>,
}

impl TestServerStats {
    fn inc(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn failed_total(&self) -> u64 {
        self.failed_total.load(Ordering::Relaxed)
    }

    pub fn rows_inserted(&self) -> u64 {
        self.rows_inserted.load(Ordering::Relaxed)
    }

    pub fn searches_total(&self) -> u64 {
        self.searches_total.load(Ordering::Relaxed)
    }

    pub fn created_total(&self) -> u64 {
        self.created_total.load(Ordering::Relaxed)
    }

    pub fn dropped_total(&self) -> u64 {
        self.dropped_total.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Default)]
struct AppState {
    stats: TestServerStats,
    options: TestServerOptions,
    knowledge_bases: Arc<Mutex<BTreeMap<String, Vec<String>>>>,
}

impl AppState {
    fn with_kbs<T>(&self, f: impl FnOnce(&mut BTreeMap<String, Vec<String>>) -> T) -> T {
        let mut kbs = self
            .knowledge_bases
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut kbs)
    }
}

#[derive(Debug, Deserialize)]
struct QueryRequest {
    query: String,
}

fn sql_error(message: String) -> Value {
    json!({ "type": "error", "error_code": 0, "error_message": message })
}

async fn handle_sql_query(State(state): State<AppState>, body: axum::body::Bytes) -> Response {
    TestServerStats::inc(&state.stats.requests_total, 1);

    let req: QueryRequest = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => return (StatusCode::BAD_REQUEST, "bad json").into_response(),
    };

    if !state.options.latency.is_zero() {
        sleep(state.options.latency).await;
    }

    let res = match statement::parse(&req.query) {
        Ok(stmt) => execute(&state, stmt).await,
        Err(message) => sql_error(message),
    };
    if res["type"] == "error" {
        TestServerStats::inc(&state.stats.failed_total, 1);
    }
    Json(res).into_response()
}

async fn execute(state: &AppState, stmt: Statement) -> Value {
    match stmt {
        Statement::CreateKnowledgeBase { name } => {
            if state.options.fail_create {
                return sql_error("embedding model is not available".to_string());
            }
            let created = state.with_kbs(|kbs| {
                if kbs.contains_key(&name) {
                    false
                } else {
                    kbs.insert(name.clone(), Vec::new());
                    true
                }
            });
            if !created {
                return sql_error(format!("knowledge base {name} already exists"));
            }
            TestServerStats::inc(&state.stats.created_total, 1);
            json!({ "type": "ok" })
        }
        Statement::DropKnowledgeBase { name } => {
            if state.with_kbs(|kbs| kbs.remove(&name)).is_none() {
                return sql_error(format!("knowledge base {name} does not exist"));
            }
            TestServerStats::inc(&state.stats.dropped_total, 1);
            json!({ "type": "ok" })
        }
        Statement::ShowKnowledgeBases => {
            let data: Vec<Value> = state.with_kbs(|kbs| kbs.keys().map(|k| json!([k])).collect());
            json!({ "type": "table", "column_names": ["NAME"], "data": data })
        }
        Statement::Insert { name, rows } => {
            let n = rows.len();
            if !state.options.per_row_latency.is_zero() {
                sleep(state.options.per_row_latency * u32::try_from(n).unwrap_or(u32::MAX)).await;
            }
            let stored = state.with_kbs(|kbs| match kbs.get_mut(&name) {
                Some(existing) => {
                    existing.extend(rows);
                    true
                }
                None => false,
            });
            if !stored {
                return sql_error(format!("knowledge base {name} does not exist"));
            }
            TestServerStats::inc(&state.stats.rows_inserted, n as u64);
            json!({ "type": "ok", "affected_rows": n })
        }
        Statement::Count { name } => {
            let Some(rows) = state.with_kbs(|kbs| kbs.get(&name).map(Vec::len)) else {
                return sql_error(format!("knowledge base {name} does not exist"));
            };
            json!({ "type": "table", "column_names": ["row_count"], "data": [[rows]] })
        }
        Statement::Select { name, limit } => {
            let rows = state.with_kbs(|kbs| {
                kbs.get(&name).map(|rows| {
                    rows.iter()
                        .take(limit.unwrap_or(10))
                        .enumerate()
                        .map(|(i, row)| json!([i, row, 1.0]))
                        .collect::<Vec<Value>>()
                })
            });
            let Some(rows) = rows else {
                return sql_error(format!("knowledge base {name} does not exist"));
            };
            TestServerStats::inc(&state.stats.searches_total, 1);
            json!({
                "type": "table",
                "column_names": ["id", "chunk_content", "relevance"],
                "data": rows,
            })
        }
    }
}

pub fn router(stats: TestServerStats, options: TestServerOptions) -> Router {
    Router::new()
        .route(PATH_SQL_QUERY, post(handle_sql_query))
        .with_state(AppState {
            stats,
            options,
            knowledge_bases: Arc::default(),
        })
}

pub struct TestServer {
    addr: SocketAddr,
    base_url: String,
    stats: TestServerStats,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        Self::start_with(TestServerOptions::default()).await
    }

    pub async fn start_with(options: TestServerOptions) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();
        let app = router(stats.clone(), options);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        Ok(Self {
            addr,
            base_url: format!("http://{addr}"),
            stats,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}
