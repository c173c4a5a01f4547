//! File-based store.

use super::{Document, Store};
use crate::error::{ConfigError, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Store backed by a single file on disk.
///
/// # Examples
///
/// ```rust,no_run
/// use configio::store::{FileStore, Store};
///
/// # fn example() -> configio::error::Result<()> {
/// let store = FileStore::init("/tmp/configio/config.json")?;
/// let bytes = store.read()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a store for `path` without touching the file system.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a store for `path`, making sure the file exists.
    ///
    /// Missing parent directories are created and a missing file is
    /// bootstrapped with an empty document.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is a directory or the file cannot be created.
    pub fn init(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(path);
        store.init_if_not_exists()?;
        Ok(store)
    }

    fn init_if_not_exists(&self) -> Result<()> {
        self.create_parent()?;

        match fs::metadata(&self.path) {
            Ok(meta) if meta.is_dir() => Err(ConfigError::NotAFile(self.path.clone())),
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "bootstrapping empty config file");
                self.write(&Document::new().to_bytes()?)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn create_parent(&self) -> Result<()> {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => {
                fs::create_dir_all(dir)?;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

impl Store for FileStore {
    fn read(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ConfigError::NotFound(self.path.clone()),
            _ => ConfigError::IoError(e),
        })
    }

    fn write(&self, bytes: &[u8]) -> Result<()> {
        self.create_parent()?;
        fs::write(&self.path, bytes)?;
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }
}
