//! Byte-level storage of the backing configuration file.

mod document;
mod file;

pub use document::Document;
pub use file::FileStore;

use crate::error::Result;
use std::path::Path;

/// Trait for the storage behind a configuration manager.
///
/// Implementations hand out the raw bytes of the backing document. The manager
/// serializes all writes; reads may run concurrently with them.
pub trait Store: Send + Sync {
    /// Read the complete contents.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`](crate::error::ConfigError::NotFound) when the
    /// backing file is missing, or an IO error for anything else.
    fn read(&self) -> Result<Vec<u8>>;

    /// Replace the complete contents, creating missing parent directories first.
    fn write(&self, bytes: &[u8]) -> Result<()>;

    /// Location of the backing file.
    fn path(&self) -> &Path;
}
