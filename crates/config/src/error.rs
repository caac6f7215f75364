use derive_more::{Display, Error};
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// One of the configuration sources could not be read or deserialized.
    #[display("could not load configuration")]
    Load,
    #[display("unsupported configuration file format: {}", _0.display())]
    UnsupportedFormat(#[error(not(source))] PathBuf),
    #[display("no data directories configured")]
    NoDataDirectories,
    #[display("invalid data directory name: {_0:?}")]
    InvalidDataDirectoryName(#[error(not(source))] String),
    #[display("data directory configured more than once: {_0}")]
    DuplicateDataDirectory(#[error(not(source))] String),
    #[display("data directory path must be absolute: {}", _0.display())]
    RelativePath(#[error(not(source))] PathBuf),
    #[display("active profile is not a configured profile: {_0}")]
    UnknownProfile(#[error(not(source))] String),
    #[display("scan concurrency must be at least 1")]
    InvalidConcurrency,
    #[display("could not determine a default cache location")]
    NoCacheDirectory,
}

impl ErrorKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Load)
    }
}
