//! Library configuration.
//!
//! Where the store lives and how entry folders are named. Stored as JSON in
//! the platform config directory (`<config_dir>/shelf/config.json`).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, FileSystemError, Result};
use crate::sorter::{EntrySorter, IdSorter, NameSorter};

/// Folder naming policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SorterKind {
    /// Name folders after the entry's display name.
    #[default]
    Name,
    /// Name folders after the entry id.
    Id,
}

impl SorterKind {
    /// Build the matching sorter.
    #[must_use]
    pub fn build(self) -> Arc<dyn EntrySorter> {
        match self {
            Self::Name => Arc::new(NameSorter),
            Self::Id => Arc::new(IdSorter),
        }
    }
}

impl std::fmt::Display for SorterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name => write!(f, "name"),
            Self::Id => write!(f, "id"),
        }
    }
}

/// Library configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShelfConfig {
    /// Root directory of the entry store.
    #[serde(default = "default_library_directory")]
    pub library_directory: PathBuf,
    /// Folder naming policy.
    #[serde(default)]
    pub sorter: SorterKind,
}

impl Default for ShelfConfig {
    fn default() -> Self {
        Self {
            library_directory: default_library_directory(),
            sorter: SorterKind::default(),
        }
    }
}

impl ShelfConfig {
    /// Load from the default location, writing defaults there if absent.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file_path())
    }

    /// Save to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_file_path())
    }

    /// Load from `path`, writing defaults there if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("Config file {} not found, using defaults", path.display());
            let config = Self::default();
            if let Err(e) = config.save_to(path) {
                warn!("Failed to save default config: {}", e);
            }
            return Ok(config);
        }

        let content = fs::read_to_string(path).map_err(|e| {
            Error::FileSystem(FileSystemError::ReadFailed {
                path: path.to_path_buf(),
                reason: format!("Failed to read config file: {e}"),
            })
        })?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Configuration(format!("Failed to parse config file: {e}")))?;

        info!("Loaded config from {}", path.display());
        debug!(
            "Library directory: {}, sorter: {}",
            config.library_directory.display(),
            config.sorter
        );
        Ok(config)
    }

    /// Save to `path` as pretty-printed JSON.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        crate::fs::write_json(path, self)?;
        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Check that the library directory is usable, creating it if needed.
    pub fn validate(&self) -> Result<()> {
        validate_library_directory(&self.library_directory)
    }

    /// Change the library directory after validating it.
    pub fn set_library_directory(&mut self, path: PathBuf) -> Result<()> {
        validate_library_directory(&path)?;
        self.library_directory = path;
        info!(
            "Updated library directory to: {}",
            self.library_directory.display()
        );
        Ok(())
    }

    /// Path of the default config file.
    #[must_use]
    pub fn config_file_path() -> PathBuf {
        config_file_path()
    }
}

/// Default store root under the platform data directory.
#[must_use]
pub fn default_library_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("shelf")
        .join("library")
}

fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join("shelf")
        .join("config.json")
}

/// Check that `path` can hold a store: absolute, a directory, writable.
///
/// A missing directory is created.
pub fn validate_library_directory(path: &Path) -> Result<()> {
    if !path.is_absolute() {
        return Err(Error::Configuration(
            "Library directory must be an absolute path".to_string(),
        ));
    }

    if !path.exists() {
        return fs::create_dir_all(path).map_err(|e| {
            Error::Configuration(format!("Cannot create directory {}: {}", path.display(), e))
        });
    }

    if !path.is_dir() {
        return Err(Error::Configuration(format!(
            "Path exists but is not a directory: {}",
            path.display()
        )));
    }

    let probe = path.join(".shelf_write_test");
    match fs::write(&probe, "test") {
        Ok(()) => {
            if let Err(e) = fs::remove_file(&probe) {
                warn!("Failed to remove write probe {}: {}", probe.display(), e);
            }
            Ok(())
        }
        Err(e) => Err(Error::Configuration(format!(
            "Directory is not writable: {} ({})",
            path.display(),
            e
        ))),
    }
}
