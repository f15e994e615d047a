use std::time::Duration;

use kbload_core::{ClientError, Record, SearchQuery, ServiceClient};
use serde_json::Value;

use crate::sql::{self, KnowledgeBaseSpec, SqlResponse};
use crate::transport::{DEFAULT_CONNECT_TIMEOUT, SqlTransport};
use crate::{Error, Result};

pub const SQL_QUERY_PATH: &str = "/api/sql/query";

/// [`ServiceClient`] speaking to a knowledge-base service over its SQL HTTP endpoint.
#[derive(Debug, Clone)]
pub struct SqlServiceClient {
    transport: SqlTransport,
    query_url: String,
    spec: KnowledgeBaseSpec,
    request_timeout: Option<Duration>,
    search_limit: Option<usize>,
}

impl SqlServiceClient {
    pub fn new(base_url: &str, spec: KnowledgeBaseSpec) -> Result<Self> {
        let base = url::Url::parse(base_url).map_err(|_| Error::InvalidUrl(base_url.to_string()))?;
        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(Error::UnsupportedScheme(base_url.to_string()));
        }
        let query_url = base
            .join(SQL_QUERY_PATH)
            .map_err(|_| Error::InvalidUrl(base_url.to_string()))?;

        Ok(Self {
            transport: SqlTransport::new(&query_url, Some(DEFAULT_CONNECT_TIMEOUT))?,
            query_url: query_url.to_string(),
            spec,
            request_timeout: None,
            search_limit: None,
        })
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_search_limit(mut self, limit: Option<usize>) -> Self {
        self.search_limit = limit;
        self
    }

    pub fn query_url(&self) -> &str {
        &self.query_url
    }

    /// Runs one statement. API-level errors come back as [`Error::Query`].
    pub async fn query(&self, statement: &str) -> Result<SqlResponse> {
        tracing::trace!(endpoint = %self.transport.endpoint(), statement, "sql query");
        self.transport.execute(statement, self.request_timeout).await
    }

    async fn insert(&self, resource: &str, records: &[Record]) -> Result<bool> {
        if records.is_empty() {
            return Ok(true);
        }
        let statement = sql::insert(resource, records)?;
        match self.query(&statement).await? {
            SqlResponse::Ok {
                affected_rows: Some(0),
            } => {
                tracing::debug!(resource, rows = records.len(), "insert affected no rows");
                Ok(false)
            }
            _ => Ok(true),
        }
    }

    async fn select(&self, resource: &str, query: &SearchQuery) -> Result<Vec<Value>> {
        let statement = sql::search(resource, query, self.search_limit)?;
        match self.query(&statement).await? {
            SqlResponse::Table { column_names, data } => Ok(rows_to_objects(&column_names, data)),
            _ => Ok(Vec::new()),
        }
    }

    async fn row_count(&self, resource: &str) -> Result<Option<u64>> {
        let statement = sql::count_rows(resource)?;
        match self.query(&statement).await? {
            SqlResponse::Table { data, .. } => Ok(data
                .first()
                .and_then(|row| row.first())
                .and_then(count_value)),
            _ => Ok(None),
        }
    }

    async fn names(&self) -> Result<Vec<String>> {
        match self.query(sql::show_knowledge_bases()).await? {
            SqlResponse::Table { column_names, data } => {
                let idx = column_names
                    .iter()
                    .position(|c| c.eq_ignore_ascii_case("name"))
                    .unwrap_or(0);
                Ok(data
                    .into_iter()
                    .filter_map(|row| row.into_iter().nth(idx))
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect())
            }
            _ => Ok(Vec::new()),
        }
    }
}

/// Counts arrive as JSON numbers or, from some backends, as numeric strings.
fn count_value(v: &Value) -> Option<u64> {
    v.as_u64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

fn rows_to_objects(columns: &[String], data: Vec<Vec<Value>>) -> Vec<Value> {
    data.into_iter()
        .map(|row| {
            Value::Object(
                columns
                    .iter()
                    .cloned()
                    .zip(row)
                    .collect::<serde_json::Map<String, Value>>(),
            )
        })
        .collect()
}

impl ServiceClient for SqlServiceClient {
    async fn insert_batch(&self, resource: &str, records: &[Record]) -> std::result::Result<bool, ClientError> {
        Ok(self.insert(resource, records).await?)
    }

    async fn search(
        &self,
        resource: &str,
        query: &SearchQuery,
    ) -> std::result::Result<Vec<Value>, ClientError> {
        Ok(self.select(resource, query).await?)
    }

    async fn create_resource(&self, name: &str) -> std::result::Result<(), ClientError> {
        let statement = sql::create_knowledge_base(name, &self.spec)?;
        self.query(&statement).await?;
        Ok(())
    }

    async fn drop_resource(&self, name: &str) -> std::result::Result<(), ClientError> {
        let statement = sql::drop_knowledge_base(name)?;
        self.query(&statement).await?;
        Ok(())
    }

    async fn list_resources(&self) -> std::result::Result<Vec<String>, ClientError> {
        Ok(self.names().await?)
    }

    async fn count_rows(&self, resource: &str) -> std::result::Result<Option<u64>, ClientError> {
        Ok(self.row_count(resource).await?)
    }
}
