//! Repository over the three cache tables.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{CacheSnapshot, DocumentRecord, DocumentRow, FileRecord, FileRow, StampRecord, StampRow};
use exn::ResultExt;
use sqlx::SqlitePool;
use tracing::instrument;

/// Repository for the curator's persisted state.
///
/// Reads and writes are all-or-nothing: [`Repository::load`] fails if any row
/// can't be converted back into its model, and [`Repository::replace_all`]
/// swaps the entire contents of the cache within one transaction.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
    dry_run: bool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone(), dry_run: false }
    }
}
impl Repository {
    pub fn new(pool: SqlitePool, dry_run: bool) -> Self {
        Self { pool, dry_run }
    }

    /// Load the entire cache.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<CacheSnapshot> {
        let files: Vec<FileRow> = sqlx::query_as(include_str!("../queries/list_files.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let documents: Vec<DocumentRow> = sqlx::query_as(include_str!("../queries/list_documents.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let stamps: Vec<StampRow> = sqlx::query_as(include_str!("../queries/list_stamps.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let snapshot = CacheSnapshot {
            files: files.into_iter().map(FileRecord::try_from).collect::<Result<_>>()?,
            documents: documents.into_iter().map(DocumentRecord::try_from).collect::<Result<_>>()?,
            stamps: stamps.into_iter().map(StampRecord::try_from).collect::<Result<_>>()?,
        };
        tracing::debug!(
            files = snapshot.files.len(),
            documents = snapshot.documents.len(),
            stamps = snapshot.stamps.len(),
            "loaded curator cache",
        );
        Ok(snapshot)
    }

    /// Replace the entire contents of the cache with `snapshot`.
    #[instrument(skip_all, fields(files = snapshot.files.len(), documents = snapshot.documents.len(), stamps = snapshot.stamps.len()))]
    pub async fn replace_all(&self, snapshot: &CacheSnapshot) -> Result<()> {
        if self.dry_run {
            return Ok(());
        }
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        sqlx::query(include_str!("../queries/clear_all.sql"))
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        for file in &snapshot.files {
            let row = FileRow::try_from(file)?;
            sqlx::query(include_str!("../queries/upsert_file.sql"))
                .bind(row.path)
                .bind(row.size)
                .bind(row.modified_ns)
                .bind(row.hash)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        for document in &snapshot.documents {
            let row = DocumentRow::try_from(document)?;
            sqlx::query(include_str!("../queries/upsert_document.sql"))
                .bind(row.path)
                .bind(row.size)
                .bind(row.modified_ns)
                .bind(row.document)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        for stamp in &snapshot.stamps {
            let row = StampRow::from(stamp);
            sqlx::query(include_str!("../queries/upsert_stamp.sql"))
                .bind(row.guid)
                .bind(row.profile)
                .bind(row.asset_hash)
                .bind(row.thumb_hash)
                .bind(row.failed)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)
    }

    pub async fn get_file(&self, path: &str) -> Result<Option<FileRecord>> {
        let row: Option<FileRow> = sqlx::query_as(include_str!("../queries/get_file.sql"))
            .bind(path)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(FileRecord::try_from).transpose()
    }

    pub async fn upsert_file(&self, file: &FileRecord) -> Result<()> {
        if self.dry_run {
            return Ok(());
        }
        let row = FileRow::try_from(file)?;
        sqlx::query(include_str!("../queries/upsert_file.sql"))
            .bind(row.path)
            .bind(row.size)
            .bind(row.modified_ns)
            .bind(row.hash)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Returns `true` if a record was deleted.
    pub async fn delete_file(&self, path: &str) -> Result<bool> {
        if self.dry_run {
            return Ok(false);
        }
        let result = sqlx::query(include_str!("../queries/delete_file.sql"))
            .bind(path)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }
}
