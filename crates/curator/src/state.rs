use derive_more::Display;
use serde::Serialize;

/// Where an asset stands relative to its transformed output.
///
/// Never set directly: always derived from hash results, dependency
/// resolution and the transform ledger.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum TransformState {
    /// Not hashed since it was last invalidated.
    Unknown,
    UpToDate,
    NeedsImport,
    NeedsTransform,
    NeedsThumbnail,
    TransformError,
    MissingTransformDependency,
    MissingThumbnailDependency,
    CircularDependency,
}

impl TransformState {
    pub const ALL: [Self; 9] = [
        Self::Unknown,
        Self::UpToDate,
        Self::NeedsImport,
        Self::NeedsTransform,
        Self::NeedsThumbnail,
        Self::TransformError,
        Self::MissingTransformDependency,
        Self::MissingThumbnailDependency,
        Self::CircularDependency,
    ];

    /// The cached hashes can't be used by anything depending on this asset.
    pub fn is_unusable_dependency(self) -> bool {
        matches!(self, Self::Unknown | Self::MissingTransformDependency | Self::CircularDependency)
    }

    pub fn needs_work(self) -> bool {
        matches!(self, Self::NeedsTransform | Self::NeedsThumbnail)
    }
}

/// What was last observed about an asset's backing file.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ExistenceState {
    FileAdded,
    FileModified,
    FileUnchanged,
    /// Deleted on disk; purged from the registry on the next update pass
    /// unless the file reappears first.
    FileRemoved,
}

impl ExistenceState {
    pub fn exists(self) -> bool {
        !matches!(self, Self::FileRemoved)
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

/// One diagnostic line attached to an asset by its last processing.
#[derive(Debug, Display, Clone, PartialEq, Eq, Serialize)]
#[display("[{level}] {message}")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Info, message: message.into() }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Warning, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Error, message: message.into() }
    }
}
