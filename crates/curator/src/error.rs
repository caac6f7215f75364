//! Curator Error Types
//!
//! Only set-up and persistence surface errors to callers. Anything that goes
//! wrong while parsing, hashing or transforming a single asset is recorded on
//! that asset's [`AssetInfo`](crate::AssetInfo) instead.

use derive_more::{Display, Error};

/// A curator error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for curator operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("storage error")]
    Storage,
    #[display("cache error")]
    Cache,
    #[display("configuration error")]
    Config,
    #[display("no data directory named {_0}")]
    UnknownDataDirectory(#[error(not(source))] String),
    #[display("data directory registered more than once: {_0}")]
    DuplicateDataDirectory(#[error(not(source))] String),
    #[display("document type extension registered more than once: {_0}")]
    DuplicateExtension(#[error(not(source))] String),
    /// Raised by document managers when an asset file can't be parsed.
    #[display("invalid asset document: {_0}")]
    InvalidDocument(#[error(not(source))] String),
    #[display("invalid GUID: {_0}")]
    InvalidGuid(#[error(not(source))] String),
    #[display("not a GUID or project path: {_0}")]
    InvalidDependency(#[error(not(source))] String),
    #[display("background task failed")]
    Task,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage | Self::Cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable() {
        assert!(ErrorKind::Cache.is_retryable());
        assert!(!ErrorKind::InvalidGuid("x".to_string()).is_retryable());
    }
}
