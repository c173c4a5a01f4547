//! Single-slot notification channel with read acknowledgment.
//!
//! A session's send only counts as delivered once the subscriber has actually
//! received the token, not when it lands in the channel buffer. Each token
//! carries a oneshot acknowledgment that [`Notifications::recv`] fires.

use tokio::sync::{mpsc, oneshot};

type Ack = oneshot::Sender<()>;

/// Create a connected notification sender/receiver pair.
pub(crate) fn channel() -> (NotifySender, Notifications) {
    let (tx, rx) = mpsc::channel(1);
    (NotifySender { tx }, Notifications { rx })
}

/// Result of offering one token to a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// The subscriber received the token.
    Read,
    /// The subscriber dropped its receiver; the token can never be read.
    Closed,
}

/// Sending half, held by the registry and cloned into each session.
#[derive(Debug, Clone)]
pub(crate) struct NotifySender {
    tx: mpsc::Sender<Ack>,
}

impl NotifySender {
    /// Offer one token and wait until the subscriber has received it.
    pub(crate) async fn deliver(&self) -> Delivery {
        let (ack, read) = oneshot::channel();
        if self.tx.send(ack).await.is_err() {
            return Delivery::Closed;
        }
        match read.await {
            Ok(()) => Delivery::Read,
            // Receiver dropped with our token still buffered.
            Err(_) => Delivery::Closed,
        }
    }
}

/// Receiving half handed to a subscriber by `watch`.
///
/// Each `Some(())` means "the configuration changed, re-read it". The token
/// carries no payload.
///
/// `recv` returns `None` once the registration is gone and no in-flight
/// delivery still references it: after the subscriber was removed for
/// reporting an error, or after its name was re-registered.
///
/// # Examples
///
/// ```rust,no_run
/// # async fn example(mut notifications: configio::notify::Notifications) {
/// while notifications.recv().await.is_some() {
///     println!("config changed, reloading");
/// }
/// # }
/// ```
#[derive(Debug)]
pub struct Notifications {
    rx: mpsc::Receiver<Ack>,
}

impl Notifications {
    /// Wait for the next change notification.
    ///
    /// This method is cancel safe.
    pub async fn recv(&mut self) -> Option<()> {
        let ack = self.rx.recv().await?;
        // The session may already have been cancelled; the change still happened.
        let _ = ack.send(());
        Some(())
    }

    /// Take a pending notification without waiting.
    pub fn try_recv(&mut self) -> Result<(), mpsc::error::TryRecvError> {
        let ack = self.rx.try_recv()?;
        let _ = ack.send(());
        Ok(())
    }
}
