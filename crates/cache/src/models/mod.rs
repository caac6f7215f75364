mod row;

pub(crate) use self::row::{DocumentRow, FileRow, StampRow};
use time::UtcDateTime;

/// Last observed state of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Project path (`"<data directory>/<relative path>"`).
    pub path: String,
    pub size: u64,
    pub modified: UtcDateTime,
    /// Content hash, if the file has been hashed since it last changed.
    pub hash: Option<u64>,
}

/// A parsed asset document, serialized by the curator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    pub path: String,
    /// Size of the file the document was parsed from.
    pub size: u64,
    /// Modification time of the file the document was parsed from.
    pub modified: UtcDateTime,
    /// Serialized document; opaque to this crate.
    pub document: String,
}

/// Transform ledger entry for one asset and profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampRecord {
    pub guid: String,
    pub profile: String,
    /// Asset hash the last transform attempt ran against.
    pub asset_hash: u64,
    /// Thumbnail hash the current thumbnail was produced from.
    pub thumb_hash: Option<u64>,
    /// The last transform attempt for `asset_hash` failed.
    pub failed: bool,
}

/// Everything the cache holds, loaded or written in one go.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheSnapshot {
    pub files: Vec<FileRecord>,
    pub documents: Vec<DocumentRecord>,
    pub stamps: Vec<StampRecord>,
}
impl CacheSnapshot {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.documents.is_empty() && self.stamps.is_empty()
    }
}
