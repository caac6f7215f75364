//! Layered project configuration.
//!
//! A project is loaded from, in increasing order of precedence: built-in
//! defaults, an optional configuration file (TOML, YAML or JSON, decided by
//! the file extension) and `QUARRY_*` environment variables (`__` separates
//! nested keys).
//!
//! ```toml
//! active_profile = "pc"
//! profiles = ["pc", "mobile"]
//!
//! [[data_directories]]
//! name = "Base"
//! path = "/projects/game/Data/Base"
//! core_assets = ["Base/Collections/Core.qasset"]
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "QUARRY_";
pub const DEFAULT_PROFILE: &str = "default";
const DEFAULT_SCAN_CONCURRENCY: usize = 8;
const CACHE_FILE_NAME: &str = "curator.sqlite";

/// One named root the curator scans for assets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataDirectoryConfig {
    /// First component of every project path inside this directory.
    pub name: String,
    pub path: PathBuf,
    /// Project paths of assets processed before everything else.
    #[serde(default)]
    pub core_assets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_directories: Vec<DataDirectoryConfig>,
    /// SQLite cache file. Falls back to the platform cache directory.
    pub cache: Option<PathBuf>,
    pub scan_concurrency: usize,
    pub profiles: Vec<String>,
    pub active_profile: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_directories: Vec::new(),
            cache: None,
            scan_concurrency: DEFAULT_SCAN_CONCURRENCY,
            profiles: vec![DEFAULT_PROFILE.to_string()],
            active_profile: DEFAULT_PROFILE.to_string(),
        }
    }
}

impl Config {
    /// Load defaults, then `file` (if any), then the environment.
    ///
    /// Relative data directory paths in `file` are resolved against the
    /// directory containing it.
    #[tracing::instrument]
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file {
            figment = merge_file(figment, file)?;
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        let mut config = Self::from_figment(figment)?;
        if let Some(base) = file.and_then(Path::parent) {
            config.resolve_relative_paths(base);
        }
        config.validate()?;
        tracing::debug!(
            data_directories = config.data_directories.len(),
            profile = %config.active_profile,
            "loaded configuration",
        );
        Ok(config)
    }

    /// Extract without validating.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        figment.extract().or_raise(|| ErrorKind::Load)
    }

    fn resolve_relative_paths(&mut self, base: &Path) {
        for directory in &mut self.data_directories {
            if directory.path.is_relative() {
                directory.path = base.join(&directory.path);
            }
        }
        if let Some(cache) = &mut self.cache
            && cache.is_relative()
        {
            *cache = base.join(&*cache);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.data_directories.is_empty() {
            exn::bail!(ErrorKind::NoDataDirectories);
        }
        let mut seen = HashSet::new();
        for directory in &self.data_directories {
            if directory.name.is_empty() || directory.name.contains(['/', '\\']) || directory.name.starts_with('.') {
                exn::bail!(ErrorKind::InvalidDataDirectoryName(directory.name.clone()));
            }
            if !seen.insert(directory.name.as_str()) {
                exn::bail!(ErrorKind::DuplicateDataDirectory(directory.name.clone()));
            }
            if directory.path.is_relative() {
                exn::bail!(ErrorKind::RelativePath(directory.path.clone()));
            }
        }
        if !self.profiles.iter().any(|profile| profile == &self.active_profile) {
            exn::bail!(ErrorKind::UnknownProfile(self.active_profile.clone()));
        }
        if self.scan_concurrency == 0 {
            exn::bail!(ErrorKind::InvalidConcurrency);
        }
        Ok(())
    }

    /// The configured cache file, or `curator.sqlite` in the platform cache
    /// directory.
    pub fn cache_path(&self) -> Result<PathBuf> {
        if let Some(cache) = &self.cache {
            return Ok(cache.clone());
        }
        let dirs = ProjectDirs::from("", "", "quarry").ok_or_raise(|| ErrorKind::NoCacheDirectory)?;
        Ok(dirs.cache_dir().join(CACHE_FILE_NAME))
    }

    pub fn data_directory(&self, name: &str) -> Option<&DataDirectoryConfig> {
        self.data_directories.iter().find(|directory| directory.name == name)
    }

    /// Every configured core asset across all data directories.
    pub fn core_assets(&self) -> impl Iterator<Item = &str> {
        self.data_directories.iter().flat_map(|directory| directory.core_assets.iter().map(String::as_str))
    }
}

fn merge_file(figment: Figment, file: &Path) -> Result<Figment> {
    let extension = file.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    let figment = match extension.as_deref() {
        Some("toml") => figment.merge(Toml::file_exact(file)),
        Some("yaml" | "yml") => figment.merge(Yaml::file_exact(file)),
        Some("json") => figment.merge(Json::file_exact(file)),
        _ => exn::bail!(ErrorKind::UnsupportedFormat(file.to_path_buf())),
    };
    Ok(figment)
}
