use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt as _, Full};
use hyper::header::{ACCEPT, CONTENT_TYPE};
use hyper::{Method, Request, StatusCode, Uri};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;

use crate::sql::{SqlRequest, SqlResponse};
use crate::{Error, Result};

pub(crate) const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Pooled connection to one SQL query endpoint.
///
/// Every call is a `POST` of `{"query": ...}`; the reply is decoded into a [`SqlResponse`].
#[derive(Debug, Clone)]
pub(crate) struct SqlTransport {
    inner: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    endpoint: Uri,
}

impl SqlTransport {
    pub(crate) fn new(endpoint: &url::Url, connect_timeout: Option<Duration>) -> Result<Self> {
        let uri: Uri = endpoint
            .as_str()
            .parse()
            .map_err(|_| Error::InvalidUrl(endpoint.to_string()))?;

        let mut connector = HttpConnector::new();
        connector.enforce_http(false);
        connector.set_connect_timeout(connect_timeout);
        let connector = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .wrap_connector(connector);

        Ok(Self {
            inner: Client::builder(TokioExecutor::new()).build(connector),
            endpoint: uri,
        })
    }

    pub(crate) fn endpoint(&self) -> &Uri {
        &self.endpoint
    }

    /// Sends one statement and decodes the reply.
    pub(crate) async fn execute(
        &self,
        statement: &str,
        timeout: Option<Duration>,
    ) -> Result<SqlResponse> {
        let body = serde_json::to_vec(&SqlRequest { query: statement })?;
        let req = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(Full::new(Bytes::from(body)))?;

        let exchange = async {
            let res = self.inner.request(req).await?;
            let status = res.status();
            let body = res.into_body().collect().await?.to_bytes();
            Ok::<_, Error>((status, body))
        };
        let (status, body) = match timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .map_err(|_| Error::Timeout(limit))??,
            None => exchange.await?,
        };

        decode(status, &body)
    }
}

/// Service-level errors win over the HTTP status: the endpoint reports failed statements as
/// `{"type": "error"}`, sometimes with a 200.
fn decode(status: StatusCode, body: &[u8]) -> Result<SqlResponse> {
    match serde_json::from_slice::<SqlResponse>(body) {
        Ok(SqlResponse::Error { error_message, .. }) => Err(Error::Query(error_message)),
        _ if !status.is_success() => Err(Error::Status {
            status: status.as_u16(),
            body: String::from_utf8_lossy(body).trim().to_string(),
        }),
        Ok(reply) => Ok(reply),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_payload_beats_status() {
        let body = br#"{"type":"error","error_code":1,"error_message":"kb exists"}"#;
        assert!(matches!(
            decode(StatusCode::OK, body),
            Err(Error::Query(msg)) if msg == "kb exists"
        ));
        assert!(matches!(
            decode(StatusCode::INTERNAL_SERVER_ERROR, body),
            Err(Error::Query(_))
        ));
    }

    #[test]
    fn non_json_failure_keeps_status_and_body() {
        let decoded = decode(StatusCode::BAD_GATEWAY, b"  upstream down\n");
        assert!(matches!(
            decoded,
            Err(Error::Status { status: 502, body }) if body == "upstream down"
        ));
    }

    #[test]
    fn ok_reply_with_garbage_is_a_decode_error() {
        assert!(matches!(decode(StatusCode::OK, b"<html>"), Err(Error::Decode(_))));
        assert!(matches!(
            decode(StatusCode::OK, br#"{"type":"ok","affected_rows":3}"#),
            Ok(SqlResponse::Ok { affected_rows: Some(3) })
        ));
    }

    #[tokio::test]
    async fn unreachable_endpoint_respects_request_timeout() {
        let endpoint = url::Url::parse("http://192.0.2.1:81/api/sql/query")
            .unwrap_or_else(|err| panic!("url: {err}"));
        let transport = SqlTransport::new(&endpoint, None)
            .unwrap_or_else(|err| panic!("transport: {err}"));

        let started = std::time::Instant::now();
        let res = transport
            .execute("SHOW KNOWLEDGE_BASES;", Some(Duration::from_millis(200)))
            .await;
        assert!(matches!(res, Err(Error::Timeout(_)) | Err(Error::Request(_))), "{res:?}");
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
