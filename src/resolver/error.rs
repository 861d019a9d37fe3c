use std::time::Duration;

use thiserror::Error;

/// What callers of the resolver can observe. Internal failures are folded
/// into one of these before they leave the resolver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolverError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Unable to convert {id}: {reason}")]
    Conversion { id: String, reason: String },

    #[error("Gave up waiting for {id} after {}s", waited.as_secs())]
    Timeout { id: String, waited: Duration },
}

impl ResolverError {
    pub fn conversion(id: &str, reason: impl ToString) -> Self {
        ResolverError::Conversion {
            id: id.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Conversion failures and timeouts may succeed when asked again.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ResolverError::NotFound(_))
    }
}
