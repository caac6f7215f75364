//! Storage for quarry data directories.
//!
//! A project is made up of one or more named *data directories*. Each data
//! directory is served by a [`StorageBackend`] whose [`name`](StorageBackend::name)
//! is the data directory name, and every file in the project is addressed by a
//! [`ProjectPath`]: the data directory name followed by the path relative to
//! that directory's root (`"Base/Textures/stone.png"`).

pub mod backend;
pub mod error;
pub mod file;
mod path;

pub use crate::backend::StorageBackend;
pub use crate::file::FileInfo;
pub use crate::path::ProjectPath;
pub use crate::path::validate as validate_path;
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
