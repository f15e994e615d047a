use kbload_core::{Record, SearchQuery, ServiceClient};
use kbload_http::{KnowledgeBaseSpec, SqlResponse, SqlServiceClient};
use kbload_testserver::{TestServer, TestServerOptions};
use serde_json::json;

fn records(n: u64) -> Vec<Record> {
    (0..n)
        .map(|i| {
            let mut r = Record::new();
            r.insert("id".to_string(), json!(i));
            r.insert("content".to_string(), json!(format!("it's document {i}")));
            r
        })
        .collect()
}

fn client(server: &TestServer) -> anyhow::Result<SqlServiceClient> {
    let spec = KnowledgeBaseSpec {
        content_columns: vec!["content".to_string()],
        id_column: Some("id".to_string()),
        ..KnowledgeBaseSpec::default()
    };
    Ok(SqlServiceClient::new(server.base_url(), spec)?.with_search_limit(Some(3)))
}

#[tokio::test]
async fn knowledge_base_lifecycle_round_trip() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let client = client(&server)?;

    client.create_resource("bench_kb").await?;
    assert_eq!(client.list_resources().await?, vec!["bench_kb".to_string()]);

    assert!(client.insert_batch("bench_kb", &records(5)).await?);
    assert_eq!(server.stats().rows_inserted(), 5);
    assert_eq!(client.count_rows("bench_kb").await?, Some(5));

    let hits = client
        .search("bench_kb", &SearchQuery::new("document").with_filter("id", json!(1)))
        .await?;
    assert_eq!(hits.len(), 3);
    assert!(hits[0].get("chunk_content").is_some());

    client.drop_resource("bench_kb").await?;
    assert!(client.list_resources().await?.is_empty());
    assert_eq!(server.stats().created_total(), 1);
    assert_eq!(server.stats().dropped_total(), 1);

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn service_errors_surface_as_client_errors() -> anyhow::Result<()> {
    let server = TestServer::start_with(TestServerOptions {
        fail_create: true,
        ..TestServerOptions::default()
    })
    .await?;
    let client = client(&server)?;

    let err = match client.create_resource("bench_kb").await {
        Ok(()) => anyhow::bail!("create should fail"),
        Err(err) => err,
    };
    assert!(err.message().contains("embedding model"));

    let err = match client.insert_batch("missing_kb", &records(1)).await {
        Ok(_) => anyhow::bail!("insert into a missing resource should fail"),
        Err(err) => err,
    };
    assert!(err.message().contains("does not exist"));
    assert_eq!(server.stats().failed_total(), 2);

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn raw_query_returns_decoded_response() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let client = client(&server)?;

    let res = client.query("SHOW KNOWLEDGE_BASES;").await?;
    assert_eq!(
        res,
        SqlResponse::Table {
            column_names: vec!["NAME".to_string()],
            data: Vec::new(),
        }
    );

    assert!(matches!(
        client.query("DELETE FROM x;").await,
        Err(kbload_http::Error::Query(_))
    ));

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn unreachable_service_is_a_client_error() -> anyhow::Result<()> {
    let client = SqlServiceClient::new("http://127.0.0.1:9", KnowledgeBaseSpec::default())?;
    assert!(client.list_resources().await.is_err());
    Ok(())
}
