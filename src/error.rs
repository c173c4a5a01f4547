//! Error types for configio.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Result type alias for configio operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when reading, writing or watching configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The backing file does not exist.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The configured path exists but is not a regular file.
    #[error("Configuration path is a directory: {}", .0.display())]
    NotAFile(PathBuf),

    /// The backing file could not be parsed or a value could not be (de)serialized.
    #[error("Failed to parse configuration: {0}")]
    Format(String),

    /// A config value reported an empty key.
    #[error("Configuration key is empty")]
    EmptyKey,

    /// The document has no entry under the requested key.
    #[error("No data available for key '{key}' in {}", .path.display())]
    KeyNotFound {
        /// The key that was looked up
        key: String,
        /// The backing file that was read
        path: PathBuf,
    },

    /// File watching failed to initialize or reported an internal error.
    #[error("File watching error: {0}")]
    WatchError(String),

    /// A watch operation was requested on a manager built without watching.
    #[error("Configuration manager was built without file watching")]
    WatchNotEnabled,

    /// IO error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic error for other cases.
    #[error("Configuration error: {0}")]
    Other(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Format(err.to_string())
    }
}

/// Error reported by a subscriber callback through its status handle.
///
/// Cheap to clone: the same error value is stored as the subscription's last
/// error and handed back to the callback on its retry invocation.
#[derive(Clone)]
pub struct CallbackError {
    kind: CallbackErrorKind,
    source: Arc<dyn std::error::Error + Send + Sync>,
}

/// Where a [`CallbackError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackErrorKind {
    /// The subscriber reported a failure.
    Failed,
    /// The subscriber did not finish before the delivery deadline.
    TimedOut,
    /// The status handle was dropped without producing a value.
    Dropped,
}

#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Message {}

impl CallbackError {
    /// Wrap an arbitrary error reported by a subscriber.
    pub fn new(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self {
            kind: CallbackErrorKind::Failed,
            source: Arc::from(err.into()),
        }
    }

    /// Create a failure from a plain message.
    pub fn msg(msg: impl fmt::Display) -> Self {
        Self::with_kind(CallbackErrorKind::Failed, msg.to_string())
    }

    /// The delivery deadline elapsed before the subscriber finished.
    pub fn timed_out() -> Self {
        Self::with_kind(
            CallbackErrorKind::TimedOut,
            "subscriber did not finish before the delivery deadline".to_string(),
        )
    }

    /// The status handle was dropped before it produced a value.
    pub fn dropped() -> Self {
        Self::with_kind(
            CallbackErrorKind::Dropped,
            "status handle dropped without a result".to_string(),
        )
    }

    fn with_kind(kind: CallbackErrorKind, msg: String) -> Self {
        Self {
            kind,
            source: Arc::new(Message(msg)),
        }
    }

    /// Classification of this error.
    pub fn kind(&self) -> CallbackErrorKind {
        self.kind
    }

    /// Returns true if both values are the same reported error, not merely equal text.
    pub fn same_as(&self, other: &CallbackError) -> bool {
        Arc::ptr_eq(&self.source, &other.source)
    }
}

impl fmt::Debug for CallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackError")
            .field("kind", &self.kind)
            .field("message", &self.source.to_string())
            .finish()
    }
}

impl fmt::Display for CallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl std::error::Error for CallbackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.source)
    }
}
