//! SQL statements for the knowledge-base query endpoint, and its response shape.

use kbload_core::{Record, SearchQuery};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// Creation parameters of a knowledge base.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KnowledgeBaseSpec {
    pub embedding_model: Option<Value>,
    pub reranking_model: Option<Value>,
    pub content_columns: Vec<String>,
    pub metadata_columns: Vec<String>,
    pub id_column: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SqlResponse {
    Table {
        #[serde(default)]
        column_names: Vec<String>,
        #[serde(default)]
        data: Vec<Vec<Value>>,
    },
    Ok {
        #[serde(default)]
        affected_rows: Option<u64>,
    },
    Error {
        #[serde(default)]
        error_code: Option<i64>,
        #[serde(default)]
        error_message: String,
    },
}

#[derive(Debug, Serialize)]
pub(crate) struct SqlRequest<'a> {
    pub(crate) query: &'a str,
}

/// Validates a (possibly dotted) identifier.
pub fn ident(name: &str) -> Result<&str> {
    let valid_part = |part: &str| {
        let mut chars = part.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    };
    if !name.is_empty() && name.split('.').all(valid_part) {
        Ok(name)
    } else {
        Err(Error::InvalidIdentifier(name.to_string()))
    }
}

pub fn string_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Renders a JSON value as a SQL literal. Arrays and objects become JSON text.
pub fn literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => string_literal(s),
        Value::Array(_) | Value::Object(_) => string_literal(&value.to_string()),
    }
}

fn string_list(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|s| string_literal(s)).collect();
    format!("[{}]", quoted.join(", "))
}

pub fn create_knowledge_base(name: &str, spec: &KnowledgeBaseSpec) -> Result<String> {
    let mut params = Vec::new();
    if let Some(model) = &spec.embedding_model {
        params.push(format!("embedding_model = {model}"));
    }
    if let Some(model) = &spec.reranking_model {
        params.push(format!("reranking_model = {model}"));
    }
    if !spec.content_columns.is_empty() {
        params.push(format!("content_columns = {}", string_list(&spec.content_columns)));
    }
    if !spec.metadata_columns.is_empty() {
        params.push(format!("metadata_columns = {}", string_list(&spec.metadata_columns)));
    }
    if let Some(id) = &spec.id_column {
        params.push(format!("id_column = {}", string_literal(id)));
    }

    let name = ident(name)?;
    if params.is_empty() {
        Ok(format!("CREATE KNOWLEDGE_BASE {name};"))
    } else {
        Ok(format!(
            "CREATE KNOWLEDGE_BASE {name} USING {};",
            params.join(", ")
        ))
    }
}

pub fn drop_knowledge_base(name: &str) -> Result<String> {
    Ok(format!("DROP KNOWLEDGE_BASE {};", ident(name)?))
}

pub fn count_rows(name: &str) -> Result<String> {
    Ok(format!("SELECT COUNT(*) AS row_count FROM {};", ident(name)?))
}

pub fn show_knowledge_bases() -> &'static str {
    "SHOW KNOWLEDGE_BASES;"
}

/// `INSERT` of every record; columns are the union of record keys in first-seen order.
pub fn insert(name: &str, records: &[Record]) -> Result<String> {
    let mut columns: Vec<&str> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(ident(key)?);
            }
        }
    }

    let rows: Vec<String> = records
        .iter()
        .map(|record| {
            let values: Vec<String> = columns
                .iter()
                .map(|c| record.get(*c).map_or_else(|| "NULL".to_string(), literal))
                .collect();
            format!("({})", values.join(", "))
        })
        .collect();

    Ok(format!(
        "INSERT INTO {} ({}) VALUES {};",
        ident(name)?,
        columns.join(", "),
        rows.join(", ")
    ))
}

pub fn search(name: &str, query: &SearchQuery, limit: Option<usize>) -> Result<String> {
    let mut sql = format!(
        "SELECT * FROM {} WHERE content = {}",
        ident(name)?,
        string_literal(&query.query)
    );
    for (column, value) in &query.filters {
        sql.push_str(&format!(" AND {} = {}", ident(column)?, literal(value)));
    }
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    sql.push(';');
    Ok(sql)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn quotes_are_doubled() {
        assert_eq!(string_literal("it's"), "'it''s'");
        assert_eq!(literal(&json!(null)), "NULL");
        assert_eq!(literal(&json!(3.5)), "3.5");
        assert_eq!(literal(&json!({"a": 1})), r#"'{"a":1}'"#);
    }

    #[test]
    fn rejects_injected_identifiers() {
        assert!(ident("kb; DROP TABLE x").is_err());
        assert!(ident("1kb").is_err());
        assert!(ident("").is_err());
        assert_eq!(ident("mindsdb.my_kb").unwrap(), "mindsdb.my_kb");
    }

    #[test]
    fn insert_unions_columns_and_fills_nulls() {
        let sql = insert(
            "kb",
            &[
                record(&[("id", json!(1)), ("content", json!("a"))]),
                record(&[("id", json!(2)), ("tag", json!("x"))]),
            ],
        )
        .unwrap();
        assert_eq!(
            sql,
            "INSERT INTO kb (id, content, tag) VALUES (1, 'a', NULL), (2, NULL, 'x');"
        );
    }

    #[test]
    fn count_rows_selects_from_the_knowledge_base() {
        assert_eq!(
            count_rows("mindsdb.kb").unwrap(),
            "SELECT COUNT(*) AS row_count FROM mindsdb.kb;"
        );
        assert!(count_rows("kb; DROP").is_err());
    }

    #[test]
    fn search_with_filters_and_limit() {
        let q = SearchQuery::new("what's new").with_filter("lang", json!("en"));
        let sql = search("kb", &q, Some(5)).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM kb WHERE content = 'what''s new' AND lang = 'en' LIMIT 5;"
        );
    }

    #[test]
    fn create_with_and_without_parameters() {
        assert_eq!(
            create_knowledge_base("kb", &KnowledgeBaseSpec::default()).unwrap(),
            "CREATE KNOWLEDGE_BASE kb;"
        );
        let spec = KnowledgeBaseSpec {
            embedding_model: Some(json!({"provider": "openai", "model_name": "text-embedding-3-small"})),
            content_columns: vec!["content".to_string()],
            id_column: Some("id".to_string()),
            ..KnowledgeBaseSpec::default()
        };
        let sql = create_knowledge_base("kb", &spec).unwrap();
        assert!(sql.starts_with("CREATE KNOWLEDGE_BASE kb USING embedding_model = {"));
        assert!(sql.contains("content_columns = ['content']"));
        assert!(sql.ends_with("id_column = 'id';"));
    }

    #[test]
    fn decodes_response_variants() {
        let table: SqlResponse =
            serde_json::from_str(r#"{"type":"table","column_names":["NAME"],"data":[["kb"]]}"#)
                .unwrap();
        assert!(matches!(table, SqlResponse::Table { ref data, .. } if data.len() == 1));

        let err: SqlResponse =
            serde_json::from_str(r#"{"type":"error","error_code":0,"error_message":"nope"}"#)
                .unwrap();
        assert!(matches!(err, SqlResponse::Error { ref error_message, .. } if error_message == "nope"));

        let ok: SqlResponse = serde_json::from_str(r#"{"type":"ok"}"#).unwrap();
        assert_eq!(ok, SqlResponse::Ok { affected_rows: None });
    }
}
