//! SQLite cache for the asset curator.
//!
//! This crate provides the persisted cache that lets a large project skip a
//! full rebuild after every restart. The cache is never the source of truth
//! (the data directories are): if the database is deleted or its contents
//! can't be read, the curator falls back to a full re-hash.
//!
//! # Architecture
//! The cache stores three tables:
//! - **files**: last observed size, modification time and content hash per
//!   project path (the File Status Cache).
//! - **documents**: parsed asset document blobs per project path, together
//!   with the size/mtime they were parsed from.
//! - **stamps**: the transform ledger, i.e. which asset/thumbnail hashes the
//!   last transform per (asset, profile) was produced from.
//!
//! The curator loads everything once at start-up with [`Repository::load`] and
//! writes everything back with [`Repository::replace_all`].

mod db;
pub mod error;
mod models;
mod repo;

pub use crate::db::Database;
pub use crate::models::{CacheSnapshot, DocumentRecord, FileRecord, StampRecord};
pub use crate::repo::Repository;
