#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use kbload_core::monitor::{ProcessInspector, ProcessSample};
use kbload_core::{
    ClientError, Dataset, Record, ResourceMonitor, SearchQuery, ServiceClient,
};
use parking_lot::Mutex;
use serde_json::json;

/// In-memory stand-in for the ingestion/search service.
#[derive(Debug, Default)]
pub struct FakeService {
    pub latency: Duration,
    /// Record ids whose batches take `slow_latency`.
    pub slow_ids: HashSet<u64>,
    pub slow_latency: Duration,
    /// Once a resource holds this many rows, every insert takes the extra delay.
    pub slow_when_rows_reach: Option<(usize, Duration)>,
    pub failing_ids: HashSet<u64>,
    pub rejected_ids: HashSet<u64>,
    pub panicking_ids: HashSet<u64>,
    pub fail_create: bool,
    pub fail_drop: bool,
    /// Answer row counts with `None`, like a service without a count query.
    pub no_row_count: bool,
    /// Delay added to resource create and drop.
    pub lifecycle_latency: Duration,
    state: Mutex<FakeState>,
    inflight: AtomicUsize,
}

#[derive(Debug, Default)]
struct FakeState {
    rows: HashMap<String, usize>,
    events: Vec<String>,
    max_inflight: usize,
    searches: usize,
}

struct InflightGuard<'a>(&'a FakeService);

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.0.inflight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_resource(self, name: &str) -> Self {
        self.state.lock().rows.insert(name.to_string(), 0);
        self
    }

    pub fn events(&self) -> Vec<String> {
        self.state.lock().events.clone()
    }

    pub fn resources(&self) -> Vec<String> {
        self.state.lock().rows.keys().cloned().collect()
    }

    pub fn max_inflight(&self) -> usize {
        self.state.lock().max_inflight
    }

    pub fn searches(&self) -> usize {
        self.state.lock().searches
    }

    fn enter(&self) -> InflightGuard<'_> {
        let now = self.inflight.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state.lock();
        state.max_inflight = state.max_inflight.max(now);
        InflightGuard(self)
    }
}

fn record_id(record: &Record) -> Option<u64> {
    record.get("id").and_then(serde_json::Value::as_u64)
}

impl ServiceClient for FakeService {
    async fn insert_batch(&self, resource: &str, records: &[Record]) -> Result<bool, ClientError> {
        let _guard = self.enter();
        let ids: Vec<u64> = records.iter().filter_map(record_id).collect();

        let stored = {
            let state = self.state.lock();
            match state.rows.get(resource) {
                Some(rows) => *rows,
                None => return Err(ClientError::new(format!("no such resource: {resource}"))),
            }
        };

        let mut delay = self.latency;
        if ids.iter().any(|id| self.slow_ids.contains(id)) {
            delay = self.slow_latency;
        }
        if let Some((threshold, extra)) = self.slow_when_rows_reach
            && stored >= threshold
        {
            delay += extra;
        }
        tokio::time::sleep(delay).await;

        if ids.iter().any(|id| self.panicking_ids.contains(id)) {
            panic!("fake service exploded");
        }
        if ids.iter().any(|id| self.failing_ids.contains(id)) {
            return Err(ClientError::new("bad batch"));
        }
        if ids.iter().any(|id| self.rejected_ids.contains(id)) {
            return Ok(false);
        }

        let mut state = self.state.lock();
        if let Some(rows) = state.rows.get_mut(resource) {
            *rows += records.len();
        }
        Ok(true)
    }

    async fn search(
        &self,
        resource: &str,
        query: &SearchQuery,
    ) -> Result<Vec<serde_json::Value>, ClientError> {
        let _guard = self.enter();
        tokio::time::sleep(self.latency).await;
        let mut state = self.state.lock();
        if !state.rows.contains_key(resource) {
            return Err(ClientError::new(format!("no such resource: {resource}")));
        }
        state.searches += 1;
        Ok(vec![json!({ "chunk_content": query.query })])
    }

    async fn create_resource(&self, name: &str) -> Result<(), ClientError> {
        tokio::time::sleep(self.lifecycle_latency).await;
        let mut state = self.state.lock();
        state.events.push(format!("create {name}"));
        if self.fail_create {
            return Err(ClientError::new("embedding model unavailable"));
        }
        if state.rows.contains_key(name) {
            return Err(ClientError::new(format!("{name} already exists")));
        }
        state.rows.insert(name.to_string(), 0);
        Ok(())
    }

    async fn drop_resource(&self, name: &str) -> Result<(), ClientError> {
        tokio::time::sleep(self.lifecycle_latency).await;
        let mut state = self.state.lock();
        state.events.push(format!("drop {name}"));
        if self.fail_drop {
            return Err(ClientError::new("drop refused"));
        }
        match state.rows.remove(name) {
            Some(_) => Ok(()),
            None => Err(ClientError::new(format!("no such resource: {name}"))),
        }
    }

    async fn list_resources(&self) -> Result<Vec<String>, ClientError> {
        Ok(self.state.lock().rows.keys().cloned().collect())
    }

    async fn count_rows(&self, resource: &str) -> Result<Option<u64>, ClientError> {
        if self.no_row_count {
            return Ok(None);
        }
        Ok(self.state.lock().rows.get(resource).map(|n| *n as u64))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectorMode {
    Healthy,
    /// Healthy, but every reading blocks for the given time.
    Slow(Duration),
    Gone,
    Panics,
}

/// Inspector that returns canned readings without touching the OS.
#[derive(Debug, Clone)]
pub struct FakeInspector {
    pub mode: InspectorMode,
    pub calls: Arc<AtomicUsize>,
}

impl FakeInspector {
    pub fn new(mode: InspectorMode) -> Self {
        Self {
            mode,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl ProcessInspector for FakeInspector {
    fn fork(&self) -> Box<dyn ProcessInspector> {
        Box::new(self.clone())
    }

    fn sample(&mut self, _pid: u32) -> Option<ProcessSample> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) as u64;
        if let InspectorMode::Slow(delay) = self.mode {
            std::thread::sleep(delay);
        }
        match self.mode {
            InspectorMode::Healthy | InspectorMode::Slow(_) => Some(ProcessSample {
                cpu_percent: Some(12.5),
                rss_bytes: Some((64 + n) * 1024 * 1024),
                threads: Some(8),
                fds: Some(16),
                ..ProcessSample::default()
            }),
            InspectorMode::Gone => None,
            InspectorMode::Panics => panic!("inspector blew up"),
        }
    }
}

pub fn fake_monitor() -> Arc<ResourceMonitor> {
    Arc::new(ResourceMonitor::with_inspector(
        4242,
        FakeInspector::new(InspectorMode::Healthy),
    ))
}

pub fn record(id: u64) -> Record {
    let mut r = Record::new();
    r.insert("id".to_string(), json!(id));
    r.insert("content".to_string(), json!(format!("document number {id}")));
    r
}

pub fn records(n: u64) -> Vec<Record> {
    (0..n).map(record).collect()
}

pub fn dataset(records_n: u64, queries: &[&str]) -> Dataset {
    Dataset {
        records: records(records_n),
        queries: queries.iter().map(|q| SearchQuery::new(*q)).collect(),
    }
}
