use std::time::Duration;

use kbload_core::ClientError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("unsupported url scheme (expected http or https): {0}")]
    UnsupportedScheme(String),

    #[error("http request build failed: {0}")]
    RequestBuild(#[from] http::Error),

    #[error("http request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),

    #[error("http request timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to read response body: {0}")]
    BodyRead(#[from] hyper::Error),

    #[error("http status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("query failed: {0}")]
    Query(String),

    #[error("invalid identifier `{0}`")]
    InvalidIdentifier(String),
}

impl From<Error> for ClientError {
    fn from(err: Error) -> Self {
        ClientError::new(err.to_string())
    }
}
