//! Asynchronous result handle returned by subscriber callbacks.

use crate::error::CallbackError;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Outcome a subscriber reports for one invocation.
pub type CallbackResult = std::result::Result<(), CallbackError>;

/// Single-value status handle.
///
/// A callback returns immediately with a `Status`; the work it stands for runs
/// asynchronously and the handle resolves once that work concludes. A `Status`
/// can be built from a oneshot receiver, from any future, or from a value that
/// is already known.
///
/// A oneshot sender that is dropped without sending resolves the status to
/// [`CallbackError::dropped`].
///
/// # Examples
///
/// ```rust
/// use configio::notify::Status;
///
/// // Report from a spawned task
/// let (tx, status) = Status::channel();
/// std::thread::spawn(move || {
///     let _ = tx.send(Ok(()));
/// });
///
/// // Or wrap async work directly
/// let status = Status::from_future(async { Ok(()) });
/// ```
#[must_use = "a status does nothing unless awaited"]
pub struct Status {
    inner: Pin<Box<dyn Future<Output = CallbackResult> + Send>>,
}

impl Status {
    /// Wrap a future producing the callback result.
    pub fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = CallbackResult> + Send + 'static,
    {
        Self {
            inner: Box::pin(future),
        }
    }

    /// A status that is already resolved.
    pub fn ready(result: CallbackResult) -> Self {
        Self::from_future(std::future::ready(result))
    }

    /// A status that is already resolved successfully.
    pub fn ok() -> Self {
        Self::ready(Ok(()))
    }

    /// A status that is already resolved with `err`.
    pub fn err(err: CallbackError) -> Self {
        Self::ready(Err(err))
    }

    /// A status that never resolves.
    pub fn pending() -> Self {
        Self::from_future(std::future::pending())
    }

    /// Create a status backed by a oneshot channel.
    pub fn channel() -> (oneshot::Sender<CallbackResult>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, rx.into())
    }
}

impl From<oneshot::Receiver<CallbackResult>> for Status {
    fn from(rx: oneshot::Receiver<CallbackResult>) -> Self {
        Self::from_future(async move { rx.await.unwrap_or_else(|_| Err(CallbackError::dropped())) })
    }
}

impl From<CallbackResult> for Status {
    fn from(result: CallbackResult) -> Self {
        Self::ready(result)
    }
}

impl Future for Status {
    type Output = CallbackResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl std::fmt::Debug for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Status").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CallbackErrorKind;
    use std::time::Duration;

    #[tokio::test]
    async fn test_ready() {
        assert!(Status::ok().await.is_ok());
        assert!(Status::err(CallbackError::msg("nope")).await.is_err());
    }

    #[tokio::test]
    async fn test_channel_value() {
        let (tx, status) = Status::channel();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let _ = tx.send(Err(CallbackError::msg("failed")));
        });
        let err = status.await.unwrap_err();
        assert_eq!(err.to_string(), "failed");
    }

    #[tokio::test]
    async fn test_dropped_sender_is_failure() {
        let (tx, status) = Status::channel();
        drop(tx);
        let err = status.await.unwrap_err();
        assert_eq!(err.kind(), CallbackErrorKind::Dropped);
    }

    #[tokio::test]
    async fn test_pending_never_resolves() {
        let result = tokio::time::timeout(Duration::from_millis(20), Status::pending()).await;
        assert!(result.is_err());
    }
}
