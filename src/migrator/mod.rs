pub mod fetch;
pub mod tools;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

pub use fetch::HttpMigrator;
pub use tools::Transcoder;

#[derive(Error, Debug)]
pub enum MigratorError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Proxy error: {0}")]
    ProxyError(String),

    #[error("Source error: {0}")]
    SourceError(String),

    #[error("Unsupported source format: {0}")]
    UnsupportedFormat(String),

    #[error("Image conversion error: {0}")]
    ConversionError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Turns a remote image into a JP2 in the persistent store.
///
/// Implementations must be safe to call again for the same identifier after
/// a failed attempt. Concurrency control is not their concern: the resolver
/// guarantees a single conversion per identifier at a time.
#[async_trait]
pub trait Migrator: Send + Sync {
    async fn convert(&self, id: &str, source: &Url) -> Result<PathBuf, MigratorError>;
}
