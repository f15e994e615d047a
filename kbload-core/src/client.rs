use std::future::Future;

use serde::{Deserialize, Serialize};

/// One row handed to the service on ingest: column name -> value.
pub type Record = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,

    /// Equality filters applied next to the semantic match, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<(String, serde_json::Value)>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            filters: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_filter(mut self, column: impl Into<String>, value: serde_json::Value) -> Self {
        self.filters.push((column.into(), value));
        self
    }
}

/// Failure reported by a service client. The core only ever looks at the message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ClientError {
    message: String,
}

impl ClientError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// The ingestion/search service under test.
///
/// Implementations are shared across workers, so every method takes `&self` and the returned
/// futures must be `Send`.
pub trait ServiceClient: Send + Sync + 'static {
    /// Inserts a batch of records. `Ok(false)` means the service refused the batch.
    fn insert_batch(
        &self,
        resource: &str,
        records: &[Record],
    ) -> impl Future<Output = Result<bool, ClientError>> + Send;

    fn search(
        &self,
        resource: &str,
        query: &SearchQuery,
    ) -> impl Future<Output = Result<Vec<serde_json::Value>, ClientError>> + Send;

    fn create_resource(&self, name: &str) -> impl Future<Output = Result<(), ClientError>> + Send;

    fn drop_resource(&self, name: &str) -> impl Future<Output = Result<(), ClientError>> + Send;

    fn list_resources(&self) -> impl Future<Output = Result<Vec<String>, ClientError>> + Send;

    /// Rows currently stored in `resource`; `None` when the service cannot tell.
    fn count_rows(
        &self,
        resource: &str,
    ) -> impl Future<Output = Result<Option<u64>, ClientError>> + Send {
        let _ = resource;
        std::future::ready(Ok(None))
    }
}
