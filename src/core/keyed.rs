//! Keyed configuration values and narrow access traits.

use crate::error::{CallbackError, Result};
use crate::notify::{Notifications, Status};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Trait for values stored in a configuration document.
///
/// Every value lives under its own top-level key, so several components can
/// share one backing file.
///
/// # Examples
///
/// ```rust
/// use configio::core::Keyed;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Serialize, Deserialize)]
/// struct ServerConfig {
///     port: u16,
///     max_connections: usize,
/// }
///
/// impl Keyed for ServerConfig {
///     fn key(&self) -> &str {
///         "server"
///     }
/// }
/// ```
pub trait Keyed {
    /// The document key this value is stored under. Must not be empty.
    fn key(&self) -> &str;
}

/// Read access to configuration values.
///
/// Hand out `&impl ConfigReader` to code that should only read.
pub trait ConfigReader {
    /// Load the stored entry for `value.key()` into `value`.
    fn unmarshal<T: Keyed + DeserializeOwned>(&self, value: &mut T) -> Result<()>;
}

/// Write access to configuration values.
pub trait ConfigWriter {
    /// Store `value` under `value.key()`, leaving other entries untouched.
    fn marshal<T: Keyed + Serialize>(&self, value: &T) -> Result<()>;
}

/// Change subscription.
///
/// The callback is run on every change; if it reports an error it is called
/// once more with that error and then removed from the registry.
pub trait ConfigWatcher {
    /// Register `callback` under `name`, replacing any previous registration.
    fn watch<D, F, R>(&self, name: impl Into<String>, data: D, callback: F) -> Notifications
    where
        D: Send + Sync + 'static,
        F: Fn(CancellationToken, Arc<D>, Option<CallbackError>) -> R + Send + Sync + 'static,
        R: Into<Status>;
}
