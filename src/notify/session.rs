//! Per-subscriber delivery of one change notification.
//!
//! A session moves through `Invoking → Racing → {Done, Retrying}`:
//!
//! ```text
//! Invoking   callback(cancel, data, last_error) → Status
//! Racing     ├─► deliver token (until the subscriber receives it)
//!            ├─► await Status (stored as last_error)
//!            └─► cancellation aborts, registry untouched
//! Done       both halves finished and the status was Ok
//! Retrying   status was Err: remove the registration, then hand the error
//!            back to the callback once more in a detached task
//! ```

use super::channel::Delivery;
use super::subscriber::{Subscription, SubscriptionRegistry};
use crate::error::CallbackError;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// How a session ended.
#[derive(Debug, Clone)]
pub enum SessionOutcome {
    /// The subscriber received the token and reported success.
    Acknowledged,
    /// The subscriber reported an error; it was removed and told about the error.
    Removed(CallbackError),
    /// The subscriber dropped its notification receiver; it was removed.
    Abandoned,
    /// Cancellation fired before the session finished; the registry was not touched.
    Cancelled,
}

impl SessionOutcome {
    /// Returns true for [`SessionOutcome::Acknowledged`].
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, Self::Acknowledged)
    }

    /// Short label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Acknowledged => "acknowledged",
            Self::Removed(_) => "removed",
            Self::Abandoned => "abandoned",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Delivers one change notification to one subscriber and collects its disposition.
pub struct NotificationSession {
    name: String,
    subscription: Subscription,
    registry: SubscriptionRegistry,
    cancel: CancellationToken,
    delivery_timeout: Option<Duration>,
}

impl NotificationSession {
    /// Create a session for one snapshot entry of `registry`.
    pub fn new(
        name: impl Into<String>,
        subscription: Subscription,
        registry: SubscriptionRegistry,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            name: name.into(),
            subscription,
            registry,
            cancel,
            delivery_timeout: None,
        }
    }

    /// Fail the session if the subscriber has not both received the token and
    /// reported a status within `timeout`. `None` waits indefinitely.
    pub fn with_delivery_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    /// Name of the subscriber this session serves.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the session to completion.
    pub async fn run(mut self) -> SessionOutcome {
        debug!(callback = %self.name, "executing");

        let status = self
            .subscription
            .invoke(self.cancel.clone(), self.subscription.last_error().cloned());
        tokio::pin!(status);

        let sender = self.subscription.sender().clone();
        let delivery = sender.deliver();
        tokio::pin!(delivery);

        let deadline = tokio::time::sleep(self.delivery_timeout.unwrap_or(Duration::MAX));
        tokio::pin!(deadline);

        let mut delivered = false;
        let mut reported = None;

        while !(delivered && reported.is_some()) {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!(callback = %self.name, "context done, returning");
                    return SessionOutcome::Cancelled;
                }
                result = &mut delivery, if !delivered => match result {
                    Delivery::Read => {
                        debug!(callback = %self.name, "received notification");
                        delivered = true;
                    }
                    Delivery::Closed => {
                        self.registry
                            .remove_generation(&self.name, self.subscription.generation());
                        info!(callback = %self.name, "notification receiver dropped, removed");
                        return SessionOutcome::Abandoned;
                    }
                },
                result = &mut status, if reported.is_none() => {
                    reported = Some(result);
                }
                _ = &mut deadline, if self.delivery_timeout.is_some() => {
                    debug!(callback = %self.name, delivered, "delivery deadline elapsed");
                    reported = Some(Err(CallbackError::timed_out()));
                    break;
                }
            }
        }

        self.subscription
            .set_last_error(reported.and_then(|result| result.err()));

        match self.subscription.last_error().cloned() {
            None => {
                info!(callback = %self.name, "executed successfully");
                SessionOutcome::Acknowledged
            }
            Some(err) => {
                info!(callback = %self.name, error = %err, "executed unsuccessfully");
                self.retry(err.clone());
                SessionOutcome::Removed(err)
            }
        }
    }

    /// Remove the registration, then give the callback one chance to observe its error.
    fn retry(self, err: CallbackError) {
        self.registry
            .remove_generation(&self.name, self.subscription.generation());

        let Self {
            name,
            subscription,
            cancel,
            ..
        } = self;

        tokio::spawn(async move {
            let status = subscription.invoke(cancel.clone(), Some(err));
            tokio::select! {
                result = status => {
                    debug!(callback = %name, ok = result.is_ok(), "error report finished");
                }
                _ = cancel.cancelled() => {
                    debug!(callback = %name, "context done during error report");
                }
            }
        });
    }
}
