//! File watching backed by the `notify` crate.

use super::event::{ChangeSource, WatchEvent};
use crate::error::{ConfigError, Result};
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const EVENT_BUFFER: usize = 64;

/// Change source watching a single configuration file.
///
/// Uses the `notify` crate to observe the file and translates its events into
/// [`WatchEvent`]s. Bursts of modifications are coalesced: after the first
/// change, further changes within the debounce window are folded into a single
/// `Changed` emitted when the window closes.
///
/// The source stops, dropping the underlying OS watcher, once `cancel` fires or
/// the file is removed.
///
/// # Examples
///
/// ```rust,no_run
/// use configio::notify::{ChangeSource, FileChangeSource, WatchEvent};
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let cancel = CancellationToken::new();
/// let mut source = FileChangeSource::watch(
///     "/path/to/config.json",
///     Duration::from_millis(50),
///     cancel.clone(),
/// )?;
///
/// while let Some(event) = source.next_event().await {
///     if matches!(event, WatchEvent::Removed) {
///         break;
///     }
///     println!("{:?}", event);
/// }
/// # Ok(())
/// # }
/// ```
pub struct FileChangeSource {
    path: PathBuf,
    events: mpsc::Receiver<WatchEvent>,
}

impl FileChangeSource {
    /// Start watching `path`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be resolved (e.g., doesn't exist) or
    /// the underlying file watcher cannot be created.
    pub fn watch(
        path: impl AsRef<Path>,
        debounce: Duration,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let canonical_path = path
            .as_ref()
            .canonicalize()
            .map_err(|e| ConfigError::WatchError(format!("Failed to resolve path: {}", e)))?;

        // Channel for raw events from notify
        let (raw_tx, raw_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = raw_tx.send(res);
        })
        .map_err(|e| ConfigError::WatchError(format!("Failed to create file watcher: {}", e)))?;

        watcher
            .watch(&canonical_path, RecursiveMode::NonRecursive)
            .map_err(|e| ConfigError::WatchError(format!("Failed to watch path: {}", e)))?;

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        info!(file = %canonical_path.display(), "starting watch");
        tokio::spawn(forward(watcher, raw_rx, tx, debounce, cancel, canonical_path.clone()));

        Ok(Self {
            path: canonical_path,
            events: rx,
        })
    }

    /// The canonical path being watched.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ChangeSource for FileChangeSource {
    fn next_event(&mut self) -> impl Future<Output = Option<WatchEvent>> + Send {
        self.events.recv()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Changed,
    Removed,
}

/// Writes and renames count as changes; metadata and access events do not.
fn classify(kind: &EventKind) -> Option<Change> {
    match kind {
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(_) => Some(Change::Changed),
        EventKind::Remove(_) => Some(Change::Removed),
        _ => None,
    }
}

/// Owns the OS watcher; translates and debounces its events until cancelled.
async fn forward(
    watcher: RecommendedWatcher,
    mut raw_rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    tx: mpsc::Sender<WatchEvent>,
    debounce: Duration,
    cancel: CancellationToken,
    path: PathBuf,
) {
    let _watcher = watcher;
    let mut pending: Option<Instant> = None;

    loop {
        let flush_at = pending;
        let flush = async move {
            match flush_at {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(file = %path.display(), "context done, stopping watch");
                break;
            }
            _ = tx.closed() => break,
            _ = flush => {
                pending = None;
                if tx.send(WatchEvent::Changed).await.is_err() {
                    break;
                }
            }
            res = raw_rx.recv() => {
                let Some(res) = res else { break };
                match res {
                    Ok(event) => {
                        debug!(file = %path.display(), kind = ?event.kind, "file event");
                        match classify(&event.kind) {
                            Some(Change::Changed) if debounce.is_zero() => {
                                if tx.send(WatchEvent::Changed).await.is_err() {
                                    break;
                                }
                            }
                            Some(Change::Changed) => {
                                pending.get_or_insert_with(|| Instant::now() + debounce);
                            }
                            Some(Change::Removed) => {
                                if pending.take().is_some() {
                                    let _ = tx.send(WatchEvent::Changed).await;
                                }
                                info!(file = %path.display(), "file removed, stopping watch");
                                let _ = tx.send(WatchEvent::Removed).await;
                                break;
                            }
                            None => {}
                        }
                    }
                    Err(e) => {
                        let err = ConfigError::WatchError(e.to_string());
                        if tx.send(WatchEvent::WatchError(err)).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }

    debug!(file = %path.display(), "change source stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, RemoveKind, RenameMode};
    use std::fs;
    use tempfile::TempDir;
    use tokio::time::timeout;

    #[test]
    fn test_classify() {
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            Some(Change::Changed)
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Name(RenameMode::Any))),
            Some(Change::Changed)
        );
        assert_eq!(
            classify(&EventKind::Remove(RemoveKind::File)),
            Some(Change::Removed)
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions))),
            None
        );
        assert_eq!(classify(&EventKind::Access(AccessKind::Any)), None);
        assert_eq!(classify(&EventKind::Create(CreateKind::File)), None);
    }

    #[tokio::test]
    async fn test_watch_nonexistent_file() {
        let result = FileChangeSource::watch(
            "/nonexistent/config.json",
            Duration::from_millis(10),
            CancellationToken::new(),
        );
        assert!(matches!(result, Err(ConfigError::WatchError(_))));
    }

    #[tokio::test]
    async fn test_file_change_emits_changed() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        fs::write(&config_path, "{}").unwrap();

        let cancel = CancellationToken::new();
        let mut source =
            FileChangeSource::watch(&config_path, Duration::from_millis(50), cancel).unwrap();
        assert!(source.path().is_absolute());

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            fs::write(&config_path, r#"{"port": 9090}"#).unwrap();
        });

        let event = timeout(Duration::from_secs(2), source.next_event()).await.unwrap();
        assert!(matches!(event, Some(WatchEvent::Changed)));
    }

    #[tokio::test]
    async fn test_burst_is_coalesced() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        fs::write(&config_path, "{}").unwrap();

        let cancel = CancellationToken::new();
        let mut source =
            FileChangeSource::watch(&config_path, Duration::from_millis(300), cancel).unwrap();

        for i in 0..5 {
            fs::write(&config_path, format!(r#"{{"n": {i}}}"#)).unwrap();
        }

        let first = timeout(Duration::from_secs(2), source.next_event()).await.unwrap();
        assert!(matches!(first, Some(WatchEvent::Changed)));

        let second = timeout(Duration::from_millis(200), source.next_event()).await;
        assert!(second.is_err(), "burst produced more than one event");
    }

    #[tokio::test]
    async fn test_remove_is_terminal() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        fs::write(&config_path, "{}").unwrap();

        let cancel = CancellationToken::new();
        let mut source = FileChangeSource::watch(&config_path, Duration::ZERO, cancel).unwrap();
        fs::remove_file(&config_path).unwrap();

        let removed = timeout(Duration::from_secs(2), async {
            loop {
                match source.next_event().await {
                    Some(WatchEvent::Removed) => return true,
                    Some(_) => continue,
                    None => return false,
                }
            }
        })
        .await
        .unwrap();
        assert!(removed);

        let end = timeout(Duration::from_secs(1), source.next_event()).await.unwrap();
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn test_cancel_stops_source() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        fs::write(&config_path, "{}").unwrap();

        let cancel = CancellationToken::new();
        let mut source =
            FileChangeSource::watch(&config_path, Duration::ZERO, cancel.clone()).unwrap();
        cancel.cancel();

        let end = timeout(Duration::from_secs(1), source.next_event()).await.unwrap();
        assert!(end.is_none());
    }
}
