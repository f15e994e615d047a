#![forbid(unsafe_code)]

mod error;
mod service;
pub mod sql;
mod transport;

pub use error::{Error, Result};
pub use service::{SQL_QUERY_PATH, SqlServiceClient};
pub use sql::{KnowledgeBaseSpec, SqlResponse};
