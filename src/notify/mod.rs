//! Configuration change notification system.
//!
//! A [`Dispatcher`] reads [`WatchEvent`]s from a [`ChangeSource`] and, for every
//! change, runs one [`NotificationSession`] per subscriber in the
//! [`SubscriptionRegistry`]. Subscribers register a callback that returns a
//! [`Status`] and read change tokens from their [`Notifications`] receiver.

mod channel;
pub mod dispatcher;
pub mod event;
pub mod session;
mod status;
pub mod subscriber;

#[cfg(feature = "file-watch")]
pub mod watcher;

pub use channel::Notifications;
pub use dispatcher::{DispatchExit, Dispatcher};
pub use event::{ChangeSource, WatchEvent};
pub use session::{NotificationSession, SessionOutcome};
pub use status::{CallbackResult, Status};
pub use subscriber::{Subscription, SubscriptionRegistry};

#[cfg(feature = "file-watch")]
pub use watcher::FileChangeSource;
