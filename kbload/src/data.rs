use std::path::Path;

use anyhow::Context as _;
use kbload_core::{Dataset, Record, SearchQuery};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QueryJson {
    Text(String),
    Object {
        query: String,
        #[serde(default)]
        filters: serde_json::Map<String, Value>,
    },
}

impl From<QueryJson> for SearchQuery {
    fn from(value: QueryJson) -> Self {
        match value {
            QueryJson::Text(query) => SearchQuery::new(query),
            QueryJson::Object { query, filters } => filters
                .into_iter()
                .fold(SearchQuery::new(query), |q, (column, v)| q.with_filter(column, v)),
        }
    }
}

pub(crate) async fn load_dataset(
    data: Option<&Path>,
    queries: Option<&Path>,
) -> anyhow::Result<Dataset> {
    let data = data.context("no dataset given (use --data or `data:` in the config file)")?;
    let records = load_records(data).await?;
    let queries = match queries {
        Some(path) => load_queries(path).await?,
        None => Vec::new(),
    };
    Ok(Dataset { records, queries })
}

pub(crate) async fn load_records(path: &Path) -> anyhow::Result<Vec<Record>> {
    let bytes = read(path, "records").await?;
    parse_records(&bytes).with_context(|| format!("invalid records file: {}", path.display()))
}

pub(crate) async fn load_queries(path: &Path) -> anyhow::Result<Vec<SearchQuery>> {
    let bytes = read(path, "queries").await?;
    parse_queries(&bytes).with_context(|| format!("invalid queries file: {}", path.display()))
}

async fn read(path: &Path, what: &str) -> anyhow::Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {what} file: {}", path.display()))
}

fn parse_records(bytes: &[u8]) -> anyhow::Result<Vec<Record>> {
    let records: Vec<Record> =
        serde_json::from_slice(bytes).context("expected a JSON array of objects")?;
    Ok(records)
}

fn parse_queries(bytes: &[u8]) -> anyhow::Result<Vec<SearchQuery>> {
    let raw: Vec<QueryJson> = serde_json::from_slice(bytes)
        .context("expected a JSON array of strings or {\"query\", \"filters\"} objects")?;
    let queries: Vec<SearchQuery> = raw.into_iter().map(SearchQuery::from).collect();
    if let Some(idx) = queries.iter().position(|q| q.query.trim().is_empty()) {
        anyhow::bail!("query #{} is empty", idx + 1);
    }
    Ok(queries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn records_must_be_objects() {
        let records = match parse_records(br#"[{"id": 1, "content": "a"}, {"id": 2}]"#) {
            Ok(v) => v,
            Err(err) => panic!("parse failed: {err:#}"),
        };
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("content"), Some(&json!("a")));

        assert!(parse_records(br#"[1, 2]"#).is_err());
        assert!(parse_records(br#"{"id": 1}"#).is_err());
    }

    #[test]
    fn record_columns_keep_file_order() {
        let records = match parse_records(br#"[{"title": "t", "id": 7, "body": "b"}]"#) {
            Ok(v) => v,
            Err(err) => panic!("parse failed: {err:#}"),
        };
        let keys: Vec<&str> = records[0].keys().map(String::as_str).collect();
        assert_eq!(keys, ["title", "id", "body"]);
    }

    #[test]
    fn queries_accept_strings_and_objects() {
        let raw = br#"[
            "plain text",
            {"query": "filtered", "filters": {"category": "physics", "year": 2020}}
        ]"#;
        let queries = match parse_queries(raw) {
            Ok(v) => v,
            Err(err) => panic!("parse failed: {err:#}"),
        };

        assert_eq!(queries[0], SearchQuery::new("plain text"));
        assert_eq!(
            queries[1],
            SearchQuery::new("filtered")
                .with_filter("category", json!("physics"))
                .with_filter("year", json!(2020))
        );
    }

    #[test]
    fn empty_query_is_rejected() {
        assert!(parse_queries(br#"["ok", "  "]"#).is_err());
    }
}
