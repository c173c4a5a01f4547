//! Change events and the sources that produce them.

use crate::error::ConfigError;
use std::future::Future;
use tokio::sync::mpsc;

/// A discrete observation about the watched file.
#[derive(Debug)]
pub enum WatchEvent {
    /// The file was modified or renamed.
    Changed,
    /// The file was removed. Terminal for the watch.
    Removed,
    /// The watch facility itself failed. Recoverable.
    WatchError(ConfigError),
}

/// Producer of [`WatchEvent`]s for a single watched path.
///
/// Returning `None` means the source is exhausted and will produce nothing
/// further.
pub trait ChangeSource: Send {
    /// Wait for the next event.
    fn next_event(&mut self) -> impl Future<Output = Option<WatchEvent>> + Send;
}

impl ChangeSource for mpsc::Receiver<WatchEvent> {
    fn next_event(&mut self) -> impl Future<Output = Option<WatchEvent>> + Send {
        self.recv()
    }
}

impl ChangeSource for mpsc::UnboundedReceiver<WatchEvent> {
    fn next_event(&mut self) -> impl Future<Output = Option<WatchEvent>> + Send {
        self.recv()
    }
}
