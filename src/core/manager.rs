//! The configuration manager handle.

use crate::core::{ConfigReader, ConfigWatcher, ConfigWriter, Keyed};
use crate::error::{CallbackError, ConfigError, Result};
use crate::notify::{DispatchExit, Notifications, Status, SubscriptionRegistry};
use crate::store::{Document, Store};
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Lifecycle of the running watch, owned by the manager.
pub(crate) struct WatchState {
    /// Stops the change source and dispatch loop without touching sessions.
    pub(crate) stop: CancellationToken,
    /// Set once the dispatch loop has exited.
    pub(crate) exit: watch::Receiver<Option<DispatchExit>>,
}

struct ManagerInner {
    store: Box<dyn Store>,
    write_lock: Mutex<()>,
    registry: SubscriptionRegistry,
    cancel: CancellationToken,
    watch: Option<WatchState>,
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        if let Some(watch) = &self.watch {
            watch.stop.cancel();
        }
    }
}

/// File-backed configuration store with change notifications.
///
/// Values are read and written by key ([`Keyed`]). While the manager is
/// watching, every external modification of the backing file is fanned out to
/// all registered subscribers.
///
/// Cloning is cheap and yields a handle to the same store and registry.
///
/// # Examples
///
/// ```rust,no_run
/// use configio::prelude::*;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Default, Serialize, Deserialize)]
/// struct AppConfig {
///     port: u16,
/// }
///
/// impl Keyed for AppConfig {
///     fn key(&self) -> &str {
///         "app"
///     }
/// }
///
/// # async fn example() -> Result<()> {
/// let manager = ConfigManager::builder()
///     .with_file("/tmp/configio/config.json")
///     .build()
///     .await?;
///
/// let mut changes = manager.watch("app", (), |_cancel, _data, _last_error| Status::ok());
///
/// manager.marshal(&AppConfig { port: 8080 })?;
///
/// changes.recv().await;
/// let mut cfg = AppConfig::default();
/// manager.unmarshal(&mut cfg)?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ConfigManager {
    inner: Arc<ManagerInner>,
}

impl ConfigManager {
    pub(crate) fn from_parts(
        store: Box<dyn Store>,
        registry: SubscriptionRegistry,
        cancel: CancellationToken,
        watch: Option<WatchState>,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                store,
                write_lock: Mutex::new(()),
                registry,
                cancel,
                watch,
            }),
        }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        self.inner.store.path()
    }

    /// The process-wide cancellation token sessions honor.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.inner.cancel
    }

    /// Read and parse the whole backing document.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid document.
    pub fn read_document(&self) -> Result<Document> {
        let bytes = self.inner.store.read().inspect_err(|e| {
            error!(file = %self.path().display(), error = %e, "failed to read config");
        })?;
        Document::from_bytes(&bytes)
    }

    /// Deserialize the entry stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::KeyNotFound`] if the document has no such entry,
    /// or a format error if the entry does not match `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        if key.is_empty() {
            return Err(ConfigError::EmptyKey);
        }

        self.read_document()?
            .get(key)
            .ok_or_else(|| {
                error!(key, file = %self.path().display(), "no data available");
                ConfigError::KeyNotFound {
                    key: key.to_string(),
                    path: self.path().to_path_buf(),
                }
            })?
    }

    /// Load the stored entry for `value.key()` into `value`.
    pub fn unmarshal<T: Keyed + DeserializeOwned>(&self, value: &mut T) -> Result<()> {
        let key = value.key().to_string();
        *value = self.get(&key)?;
        Ok(())
    }

    /// Store `value` under `value.key()`, leaving other entries untouched.
    ///
    /// Writes are serialized. A missing backing file is recreated, together with
    /// its parent directories. The resulting file modification is what notifies
    /// subscribers.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty, the existing document cannot be
    /// parsed, or the file cannot be written.
    pub fn marshal<T: Keyed + Serialize>(&self, value: &T) -> Result<()> {
        let key = value.key();
        if key.is_empty() {
            return Err(ConfigError::EmptyKey);
        }

        let _guard = self.inner.write_lock.lock();

        let mut document = match self.inner.store.read() {
            Ok(bytes) => Document::from_bytes(&bytes)?,
            Err(ConfigError::NotFound(_)) => {
                debug!(file = %self.path().display(), "config file missing, recreating");
                Document::new()
            }
            Err(e) => {
                error!(file = %self.path().display(), error = %e, "failed to read config");
                return Err(e);
            }
        };
        document.set(key, value)?;

        self.inner
            .store
            .write(&document.to_bytes()?)
            .inspect_err(|e| {
                error!(file = %self.path().display(), error = %e, "failed to write config");
            })?;

        debug!(key, file = %self.path().display(), "config written");
        Ok(())
    }

    /// Register `callback` under `name` to run on every configuration change.
    ///
    /// `data` is handed to each invocation of `callback`. The callback returns a
    /// [`Status`] that resolves once its work is done. If that status reports an
    /// error, the subscriber is removed and the callback is invoked one more time
    /// with the error as its last argument.
    ///
    /// Re-registering a name replaces the old registration; the old
    /// [`Notifications`] then ends with `None`.
    ///
    /// A manager built without file watching accepts registrations but never
    /// notifies them.
    pub fn watch<D, F, R>(&self, name: impl Into<String>, data: D, callback: F) -> Notifications
    where
        D: Send + Sync + 'static,
        F: Fn(CancellationToken, Arc<D>, Option<CallbackError>) -> R + Send + Sync + 'static,
        R: Into<Status>,
    {
        self.inner.registry.register(name, data, callback)
    }

    /// Remove the registration under `name`.
    pub fn unwatch(&self, name: &str) -> bool {
        self.inner.registry.remove(name)
    }

    /// Returns true if a subscriber is registered under `name`.
    pub fn is_watched(&self, name: &str) -> bool {
        self.inner.registry.contains(name)
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// The subscriber registry.
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.inner.registry
    }

    /// Returns true while the backing file is being watched.
    pub fn is_watching(&self) -> bool {
        self.inner
            .watch
            .as_ref()
            .is_some_and(|watch| watch.exit.borrow().is_none())
    }

    /// Wait until the watch ends on its own or through [`close`](Self::close).
    ///
    /// Returns `None` immediately for a manager built without watching.
    pub async fn watch_ended(&self) -> Option<DispatchExit> {
        let mut exit = self.inner.watch.as_ref()?.exit.clone();
        let result = exit.wait_for(Option::is_some).await;
        match result {
            Ok(exit) => *exit,
            // The dispatch task went away without reporting; it was aborted.
            Err(_) => Some(DispatchExit::Cancelled),
        }
    }

    /// Stop watching the backing file.
    ///
    /// Sessions already in flight keep running; only process-wide cancellation
    /// stops them. Closing twice is harmless.
    pub async fn close(&self) -> Option<DispatchExit> {
        let watch = self.inner.watch.as_ref()?;
        watch.stop.cancel();
        self.watch_ended().await
    }
}

impl ConfigReader for ConfigManager {
    fn unmarshal<T: Keyed + DeserializeOwned>(&self, value: &mut T) -> Result<()> {
        ConfigManager::unmarshal(self, value)
    }
}

impl ConfigWriter for ConfigManager {
    fn marshal<T: Keyed + Serialize>(&self, value: &T) -> Result<()> {
        ConfigManager::marshal(self, value)
    }
}

impl ConfigWatcher for ConfigManager {
    fn watch<D, F, R>(&self, name: impl Into<String>, data: D, callback: F) -> Notifications
    where
        D: Send + Sync + 'static,
        F: Fn(CancellationToken, Arc<D>, Option<CallbackError>) -> R + Send + Sync + 'static,
        R: Into<Status>,
    {
        ConfigManager::watch(self, name, data, callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FileStore;
    use serde::Deserialize;
    use std::fs;
    use tempfile::TempDir;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct TestConfig {
        name: String,
        value: i32,
        read_only: bool,
    }

    impl Keyed for TestConfig {
        fn key(&self) -> &str {
            "test"
        }
    }

    #[derive(Serialize, Deserialize)]
    struct Unkeyed;

    impl Keyed for Unkeyed {
        fn key(&self) -> &str {
            ""
        }
    }

    fn manager_in(dir: &TempDir) -> ConfigManager {
        let store = FileStore::init(dir.path().join("config.json")).unwrap();
        ConfigManager::from_parts(
            Box::new(store),
            SubscriptionRegistry::new(),
            CancellationToken::new(),
            None,
        )
    }

    fn sample() -> TestConfig {
        TestConfig {
            name: "mypd".to_string(),
            value: 500,
            read_only: true,
        }
    }

    #[test]
    fn test_marshal_then_unmarshal() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager_in(&temp_dir);

        manager.marshal(&sample()).unwrap();

        let mut loaded = TestConfig::default();
        manager.unmarshal(&mut loaded).unwrap();
        assert_eq!(loaded, sample());
    }

    #[test]
    fn test_marshal_preserves_other_keys() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager_in(&temp_dir);
        fs::write(manager.path(), r#"{"other": {"enabled": true}}"#).unwrap();

        manager.marshal(&sample()).unwrap();

        let document = manager.read_document().unwrap();
        assert_eq!(document.keys().collect::<Vec<_>>(), vec!["other", "test"]);
    }

    #[test]
    fn test_marshal_recreates_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager_in(&temp_dir);
        fs::remove_file(manager.path()).unwrap();

        manager.marshal(&sample()).unwrap();
        assert_eq!(manager.get::<TestConfig>("test").unwrap(), sample());
    }

    #[test]
    fn test_recreating_missing_file_logs_no_error() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use tracing::{Event, Level, Subscriber};
        use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

        struct ErrorCounter(Arc<AtomicUsize>);

        impl<S: Subscriber> Layer<S> for ErrorCounter {
            fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
                if *event.metadata().level() == Level::ERROR {
                    self.0.fetch_add(1, Ordering::SeqCst);
                }
            }
        }

        let temp_dir = TempDir::new().unwrap();
        let manager = manager_in(&temp_dir);
        fs::remove_file(manager.path()).unwrap();

        let errors = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(ErrorCounter(Arc::clone(&errors)));
        tracing::subscriber::with_default(subscriber, || {
            manager.marshal(&sample()).unwrap();
        });

        assert_eq!(errors.load(Ordering::SeqCst), 0);
        assert!(manager.path().exists());
    }

    #[test]
    fn test_unmarshal_missing_key() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager_in(&temp_dir);

        let mut loaded = TestConfig::default();
        let result = manager.unmarshal(&mut loaded);
        assert!(matches!(result, Err(ConfigError::KeyNotFound { .. })));
    }

    #[test]
    fn test_empty_key_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager_in(&temp_dir);

        assert!(matches!(manager.marshal(&Unkeyed), Err(ConfigError::EmptyKey)));
        assert!(matches!(
            manager.get::<TestConfig>(""),
            Err(ConfigError::EmptyKey)
        ));
    }

    #[test]
    fn test_corrupt_document() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager_in(&temp_dir);
        fs::write(manager.path(), "not json").unwrap();

        assert!(matches!(manager.marshal(&sample()), Err(ConfigError::Format(_))));
        assert!(matches!(
            manager.get::<TestConfig>("test"),
            Err(ConfigError::Format(_))
        ));
    }

    #[test]
    fn test_narrow_traits() {
        fn save(writer: &impl ConfigWriter, cfg: &TestConfig) -> Result<()> {
            writer.marshal(cfg)
        }
        fn load(reader: &impl ConfigReader) -> Result<TestConfig> {
            let mut cfg = TestConfig::default();
            reader.unmarshal(&mut cfg)?;
            Ok(cfg)
        }

        let temp_dir = TempDir::new().unwrap();
        let manager = manager_in(&temp_dir);
        save(&manager, &sample()).unwrap();
        assert_eq!(load(&manager).unwrap(), sample());
    }

    #[tokio::test]
    async fn test_watch_registration() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager_in(&temp_dir);

        let _rx = manager.watch("a", (), |_, _, _| Status::ok());
        assert!(manager.is_watched("a"));
        assert_eq!(manager.subscriber_count(), 1);

        assert!(manager.unwatch("a"));
        assert!(!manager.is_watched("a"));
    }

    #[tokio::test]
    async fn test_unwatched_manager_lifecycle() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager_in(&temp_dir);

        assert!(!manager.is_watching());
        assert_eq!(manager.watch_ended().await, None);
        assert_eq!(manager.close().await, None);
    }

    #[test]
    fn test_clone_shares_registry() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager_in(&temp_dir);
        let manager2 = manager.clone();

        let _rx = manager.watch("a", (), |_, _, _| Status::ok());
        assert!(manager2.is_watched("a"));
    }
}
