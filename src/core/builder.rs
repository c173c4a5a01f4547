//! Builder for constructing ConfigManager instances.

use crate::core::manager::WatchState;
use crate::core::{ConfigManager, WatchOptions};
use crate::error::{ConfigError, Result};
use crate::notify::SubscriptionRegistry;
use crate::store::FileStore;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[cfg(feature = "file-watch")]
use crate::notify::{Dispatcher, FileChangeSource};
#[cfg(feature = "file-watch")]
use tokio::sync::watch;

#[cfg(feature = "metrics")]
use crate::metrics::DispatchMetrics;

/// Directory under the user's config directory holding the default file.
pub const DEFAULT_CONFIG_DIR: &str = "configio";

/// File name of the default backing file.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Builder for constructing a `ConfigManager` instance.
///
/// # Examples
///
/// ```rust,no_run
/// use configio::prelude::*;
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<()> {
/// let shutdown = CancellationToken::new();
///
/// let manager = ConfigManager::builder()
///     .with_file("/etc/myapp/config.json")
///     .with_cancellation(shutdown.clone())
///     .with_debounce(Duration::from_millis(100))
///     .with_delivery_timeout(Duration::from_secs(30))
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct ConfigManagerBuilder {
    file: Option<PathBuf>,
    cancel: Option<CancellationToken>,
    watch: bool,
    options: WatchOptions,
    #[cfg(feature = "metrics")]
    metrics: Option<DispatchMetrics>,
}

impl ConfigManagerBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            file: None,
            cancel: None,
            watch: cfg!(feature = "file-watch"),
            options: WatchOptions::default(),
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Set the backing file.
    ///
    /// Defaults to `<config dir>/configio/config.json` in the user's
    /// configuration directory.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Use a process-wide cancellation token.
    ///
    /// Cancelling it stops the watch and every in-flight notification session.
    /// Without one the manager owns a private token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Enable or disable watching the backing file (enabled by default).
    ///
    /// A manager built without watching only reads and writes.
    pub fn with_watch(mut self, enabled: bool) -> Self {
        self.watch = enabled;
        self
    }

    /// Replace all watch options at once.
    pub fn with_options(mut self, options: WatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Coalesce modification bursts within `debounce`.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.options = self.options.with_debounce(debounce);
        self
    }

    /// Fail subscribers that take longer than `timeout` to handle a change.
    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.options = self.options.with_delivery_timeout(timeout);
        self
    }

    /// Bound the number of notification sessions running at once.
    pub fn with_max_concurrent_sessions(mut self, max: usize) -> Self {
        self.options = self.options.with_max_concurrent_sessions(max);
        self
    }

    /// Record dispatch metrics with the provided meter.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, meter: opentelemetry::metrics::Meter) -> Self {
        self.metrics = Some(DispatchMetrics::new(meter));
        self
    }

    /// Build the manager.
    ///
    /// Creates the backing file (and its directories) if missing, then starts
    /// watching it unless watching was disabled.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No default config directory exists and no file was given
    /// - The backing path is a directory or cannot be created
    /// - The file watcher cannot be started
    pub async fn build(self) -> Result<ConfigManager> {
        let path = match &self.file {
            Some(path) => path.clone(),
            None => default_config_file()?,
        };
        let store = FileStore::init(&path)?;
        let cancel = self.cancel.clone().unwrap_or_default();
        let registry = SubscriptionRegistry::new();

        let watch = if self.watch {
            Some(self.start_watch(&path, &registry, &cancel)?)
        } else {
            None
        };

        Ok(ConfigManager::from_parts(
            Box::new(store),
            registry,
            cancel,
            watch,
        ))
    }

    /// Spawn the change source and dispatch loop for `path`.
    #[cfg(feature = "file-watch")]
    fn start_watch(
        &self,
        path: &Path,
        registry: &SubscriptionRegistry,
        cancel: &CancellationToken,
    ) -> Result<WatchState> {
        let stop = cancel.child_token();
        let source = FileChangeSource::watch(path, self.options.debounce, stop.clone())?;

        let dispatcher =
            Dispatcher::new(registry.clone(), cancel.clone()).with_options(&self.options);
        #[cfg(feature = "metrics")]
        let dispatcher = match &self.metrics {
            Some(metrics) => dispatcher.with_metrics(metrics.clone()),
            None => dispatcher,
        };

        let (exit_tx, exit_rx) = watch::channel(None);
        let loop_stop = stop.clone();
        tokio::spawn(async move {
            let exit = dispatcher.run(source, loop_stop).await;
            let _ = exit_tx.send(Some(exit));
        });

        Ok(WatchState { stop, exit: exit_rx })
    }

    #[cfg(not(feature = "file-watch"))]
    fn start_watch(
        &self,
        _path: &Path,
        _registry: &SubscriptionRegistry,
        _cancel: &CancellationToken,
    ) -> Result<WatchState> {
        Err(ConfigError::WatchNotEnabled)
    }
}

impl Default for ConfigManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    /// Create a new builder for constructing a configuration manager.
    pub fn builder() -> ConfigManagerBuilder {
        ConfigManagerBuilder::new()
    }
}

fn default_config_file() -> Result<PathBuf> {
    let dir = dirs::config_dir().ok_or_else(|| {
        ConfigError::Other("Unable to determine the user configuration directory".to_string())
    })?;
    Ok(dir.join(DEFAULT_CONFIG_DIR).join(DEFAULT_CONFIG_FILE))
}
