use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::client::{Record, SearchQuery};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OperationKind {
    Ingest,
    Search,
}

#[derive(Debug, Clone)]
pub enum Payload {
    Ingest(Arc<[Record]>),
    Search(SearchQuery),
}

/// A single unit of work against the target resource.
#[derive(Debug, Clone)]
pub struct Operation {
    target: Arc<str>,
    payload: Payload,
    payload_bytes: u64,
}

impl Operation {
    pub fn ingest(target: Arc<str>, records: Vec<Record>) -> Self {
        let payload_bytes = json_len(&records);
        Self {
            target,
            payload: Payload::Ingest(Arc::from(records)),
            payload_bytes,
        }
    }

    pub fn search(target: Arc<str>, query: SearchQuery) -> Self {
        let payload_bytes = query.query.len() as u64;
        Self {
            target,
            payload: Payload::Search(query),
            payload_bytes,
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self.payload {
            Payload::Ingest(_) => OperationKind::Ingest,
            Payload::Search(_) => OperationKind::Search,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Records carried by the operation; searches count as one.
    pub fn batch_size(&self) -> usize {
        match &self.payload {
            Payload::Ingest(records) => records.len(),
            Payload::Search(_) => 1,
        }
    }

    pub fn payload_bytes(&self) -> u64 {
        self.payload_bytes
    }
}

/// Length of the records serialized as one JSON array.
fn json_len(records: &[Record]) -> u64 {
    serde_json::to_vec(records)
        .map(|v| v.len() as u64)
        .unwrap_or(0)
}

/// Splits `records` into ingest operations of at most `batch_size` records each.
pub fn ingest_batches(target: &Arc<str>, records: &[Record], batch_size: usize) -> Vec<Operation> {
    let batch_size = batch_size.max(1);
    records
        .chunks(batch_size)
        .map(|chunk| Operation::ingest(target.clone(), chunk.to_vec()))
        .collect()
}

/// One search operation per query, the whole list issued `rounds` times.
pub fn search_operations(
    target: &Arc<str>,
    queries: &[SearchQuery],
    rounds: usize,
) -> Vec<Operation> {
    let mut out = Vec::with_capacity(queries.len().saturating_mul(rounds));
    for _ in 0..rounds {
        out.extend(
            queries
                .iter()
                .map(|q| Operation::search(target.clone(), q.clone())),
        );
    }
    out
}
