use crate::error::{Error, ErrorKind};
use crate::models::{DocumentRecord, FileRecord, StampRecord};
use exn::ResultExt;
use time::UtcDateTime;

// SQLite has no unsigned 64-bit integers, so hashes are stored as fixed-width
// hex strings.
fn hash_to_text(hash: u64) -> String {
    format!("{hash:016x}")
}

fn hash_from_text(text: &str) -> Result<u64, Error> {
    u64::from_str_radix(text, 16).or_raise(|| ErrorKind::InvalidData("hash"))
}

fn time_to_nanos(time: UtcDateTime) -> Result<i64, Error> {
    i64::try_from(time.unix_timestamp_nanos()).or_raise(|| ErrorKind::InvalidData("modification time"))
}

fn time_from_nanos(nanos: i64) -> Result<UtcDateTime, Error> {
    UtcDateTime::from_unix_timestamp_nanos(i128::from(nanos)).or_raise(|| ErrorKind::InvalidData("modification time"))
}

fn size_to_int(size: u64) -> Result<i64, Error> {
    i64::try_from(size).or_raise(|| ErrorKind::InvalidData("file size"))
}

fn size_from_int(size: i64) -> Result<u64, Error> {
    u64::try_from(size).or_raise(|| ErrorKind::InvalidData("file size"))
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FileRow {
    pub(crate) path: String,
    pub(crate) size: i64,
    pub(crate) modified_ns: i64,
    pub(crate) hash: Option<String>,
}
impl TryFrom<&FileRecord> for FileRow {
    type Error = Error;
    fn try_from(record: &FileRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            path: record.path.clone(),
            size: size_to_int(record.size)?,
            modified_ns: time_to_nanos(record.modified)?,
            hash: record.hash.map(hash_to_text),
        })
    }
}
impl TryFrom<FileRow> for FileRecord {
    type Error = Error;
    fn try_from(row: FileRow) -> Result<Self, Self::Error> {
        Ok(Self {
            path: row.path,
            size: size_from_int(row.size)?,
            modified: time_from_nanos(row.modified_ns)?,
            hash: row.hash.as_deref().map(hash_from_text).transpose()?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct DocumentRow {
    pub(crate) path: String,
    pub(crate) size: i64,
    pub(crate) modified_ns: i64,
    pub(crate) document: String,
}
impl TryFrom<&DocumentRecord> for DocumentRow {
    type Error = Error;
    fn try_from(record: &DocumentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            path: record.path.clone(),
            size: size_to_int(record.size)?,
            modified_ns: time_to_nanos(record.modified)?,
            document: record.document.clone(),
        })
    }
}
impl TryFrom<DocumentRow> for DocumentRecord {
    type Error = Error;
    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            path: row.path,
            size: size_from_int(row.size)?,
            modified: time_from_nanos(row.modified_ns)?,
            document: row.document,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct StampRow {
    pub(crate) guid: String,
    pub(crate) profile: String,
    pub(crate) asset_hash: String,
    pub(crate) thumb_hash: Option<String>,
    pub(crate) failed: bool,
}
impl From<&StampRecord> for StampRow {
    fn from(record: &StampRecord) -> Self {
        Self {
            guid: record.guid.clone(),
            profile: record.profile.clone(),
            asset_hash: hash_to_text(record.asset_hash),
            thumb_hash: record.thumb_hash.map(hash_to_text),
            failed: record.failed,
        }
    }
}
impl TryFrom<StampRow> for StampRecord {
    type Error = Error;
    fn try_from(row: StampRow) -> Result<Self, Self::Error> {
        Ok(Self {
            guid: row.guid,
            profile: row.profile,
            asset_hash: hash_from_text(&row.asset_hash)?,
            thumb_hash: row.thumb_hash.as_deref().map(hash_from_text).transpose()?,
            failed: row.failed,
        })
    }
}
