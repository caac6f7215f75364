//! Path validation and project-wide addressing.
//!
//! Backends only ever see paths relative to their own root, validated by
//! [`validate`]. The curator addresses files across all data directories with
//! [`ProjectPath`], which pairs the data directory name with such a relative
//! path.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, ErrorKind, Result};

/// Validates a storage path for security and correctness.
/// Ensures that paths don't escape the data directory root (no `..` traversal).
///
/// > **Note:** This does **not** normalize backslashes, non-UTF8 bytes, or
/// >           platform-specific weirdness. Null bytes are explicitly rejected.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use quarry_storage::validate_path;
/// assert!(validate_path("Textures/stone.png").is_ok());
/// assert!(validate_path("a/../stone.png").is_ok());
/// assert!(validate_path("../outside.png").is_err());
/// assert!(validate_path("a\0b").is_err());
/// assert_eq!(
///     validate_path("Meshes/../Textures/./stone.png/").unwrap(),
///     Path::new("Textures/stone.png")
/// );
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let mut components = Vec::new();
    for component in path.as_ref().components() {
        match component {
            Component::Normal(s) => {
                // Null bytes pass through Path::components() on Unix but cause
                // truncation in C-based syscalls.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf()));
                }
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf()));
                }
            },
        }
    }
    match components.is_empty() {
        true => exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf())),
        false => Ok(components.into_iter().collect()),
    }
}

/// A file location that is unique across every data directory of a project.
///
/// Rendered (and parsed) as `"<data directory>/<relative path>"` with forward
/// slashes on every platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectPath {
    data_directory: String,
    relative: PathBuf,
}

impl ProjectPath {
    pub fn new(data_directory: impl Into<String>, relative: impl AsRef<Path>) -> Result<Self> {
        let data_directory = data_directory.into();
        if data_directory.is_empty() || data_directory.contains(['/', '\\', '\0']) {
            exn::bail!(ErrorKind::InvalidProjectPath(data_directory));
        }
        let relative = validate(relative)?;
        Ok(Self { data_directory, relative })
    }

    /// Parse the `"<data directory>/<relative path>"` form.
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim_start_matches('/').split_once('/') {
            Some((directory, relative)) => Self::new(directory, relative),
            None => exn::bail!(ErrorKind::InvalidProjectPath(value.to_string())),
        }
    }

    /// Resolve a path reference made from within `base_directory`.
    ///
    /// References that start with a known data directory name are taken as
    /// project paths; anything else is relative to `base_directory`.
    ///
    /// ```
    /// use quarry_storage::ProjectPath;
    /// let known = |name: &str| name == "Base" || name == "Game";
    /// let resolved = ProjectPath::resolve("Base/Textures/stone.png", "Game", known).unwrap();
    /// assert_eq!(resolved.to_string(), "Base/Textures/stone.png");
    /// let resolved = ProjectPath::resolve("Textures/stone.png", "Game", known).unwrap();
    /// assert_eq!(resolved.to_string(), "Game/Textures/stone.png");
    /// ```
    pub fn resolve(reference: &str, base_directory: &str, is_data_directory: impl Fn(&str) -> bool) -> Result<Self> {
        let reference = reference.trim_start_matches('/');
        if let Some((head, rest)) = reference.split_once('/')
            && is_data_directory(head)
        {
            return Self::new(head, rest);
        }
        Self::new(base_directory, reference)
    }

    pub fn data_directory(&self) -> &str {
        &self.data_directory
    }

    /// Path relative to the data directory root, as understood by its backend.
    pub fn relative(&self) -> &Path {
        &self.relative
    }

    /// Lower-cased file extension, if any.
    pub fn extension(&self) -> Option<String> {
        self.relative.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase)
    }

    pub fn file_stem(&self) -> Option<&str> {
        self.relative.file_stem().and_then(|s| s.to_str())
    }

    /// Whether this path lies in `data_directory`, under the folder `prefix`
    /// when one is given. Matches whole components only.
    pub fn is_within(&self, data_directory: &str, prefix: Option<&Path>) -> bool {
        self.data_directory == data_directory && prefix.is_none_or(|prefix| self.relative.starts_with(prefix))
    }
}

impl fmt::Display for ProjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.data_directory)?;
        for component in self.relative.iter() {
            write!(f, "/{}", component.to_string_lossy())?;
        }
        Ok(())
    }
}
impl FromStr for ProjectPath {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
impl TryFrom<String> for ProjectPath {
    type Error = Error;
    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}
impl From<ProjectPath> for String {
    fn from(path: ProjectPath) -> Self {
        path.to_string()
    }
}
