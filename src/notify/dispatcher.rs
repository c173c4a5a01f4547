//! Fans change events out to every registered subscriber.

use super::event::{ChangeSource, WatchEvent};
use super::session::{NotificationSession, SessionOutcome};
use super::subscriber::SubscriptionRegistry;
use crate::core::WatchOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[cfg(feature = "metrics")]
use crate::metrics::DispatchMetrics;

/// Why a dispatch loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchExit {
    /// The stop token fired.
    Cancelled,
    /// The watched file was removed.
    SourceRemoved,
    /// The change source ended without reporting a removal.
    SourceClosed,
}

/// Translates change events into concurrent notification sessions.
///
/// Each `Changed` event snapshots the registry and spawns one independent
/// session per subscriber. Sessions are not ordered relative to each other, and
/// a slow subscriber may still be handling one change when the next one starts
/// a fresh session for it.
///
/// # Examples
///
/// ```rust,no_run
/// use configio::notify::{Dispatcher, Status, SubscriptionRegistry, WatchEvent};
/// use tokio::sync::mpsc;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() {
/// let registry = SubscriptionRegistry::new();
/// let mut rx = registry.register("cache", (), |_, _, _| Status::ok());
///
/// let cancel = CancellationToken::new();
/// let (events, source) = mpsc::channel(8);
/// let dispatcher = Dispatcher::new(registry, cancel.clone());
/// tokio::spawn(dispatcher.run(source, cancel.child_token()));
///
/// events.send(WatchEvent::Changed).await.unwrap();
/// rx.recv().await;
/// # }
/// ```
pub struct Dispatcher {
    registry: SubscriptionRegistry,
    delivery_timeout: Option<Duration>,
    max_concurrent_sessions: Option<usize>,
    runner: SessionRunner,
}

impl Dispatcher {
    /// Create a dispatcher whose sessions honor `cancel`.
    pub fn new(registry: SubscriptionRegistry, cancel: CancellationToken) -> Self {
        Self {
            registry,
            delivery_timeout: None,
            max_concurrent_sessions: None,
            runner: SessionRunner {
                cancel,
                #[cfg(feature = "metrics")]
                metrics: None,
            },
        }
    }

    /// Apply delivery deadline and per-event concurrency bound from `options`.
    pub fn with_options(mut self, options: &WatchOptions) -> Self {
        self.delivery_timeout = options.effective_delivery_timeout();
        self.max_concurrent_sessions = options.max_concurrent_sessions;
        self
    }

    /// Record dispatch metrics.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, metrics: DispatchMetrics) -> Self {
        self.runner.metrics = Some(metrics);
        self
    }

    /// Start one session per current subscriber.
    ///
    /// Returns the spawned sessions keyed by subscriber name. Dropping the
    /// handles detaches the sessions; they keep running.
    pub fn dispatch(&self) -> Vec<(String, JoinHandle<SessionOutcome>)> {
        let snapshot = self.registry.snapshot();
        debug!(subscribers = snapshot.len(), "dispatching change");

        // Each change event gets its own bound; sessions of earlier events
        // never hold permits needed by later ones.
        let limit = self
            .max_concurrent_sessions
            .map(|max| Arc::new(Semaphore::new(max)));

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.runner.metrics {
            metrics.record_change_event(snapshot.len());
        }

        snapshot
            .into_iter()
            .map(|(name, subscription)| {
                let session = NotificationSession::new(
                    name.clone(),
                    subscription,
                    self.registry.clone(),
                    self.runner.cancel.clone(),
                )
                .with_delivery_timeout(self.delivery_timeout);

                let runner = self.runner.clone();
                let handle = tokio::spawn(runner.run(session, limit.clone()));
                (name, handle)
            })
            .collect()
    }

    /// Consume events from `source` until it ends, the file is removed, or
    /// `stop` fires.
    ///
    /// Watch facility errors are logged and skipped.
    pub async fn run<S: ChangeSource>(
        self,
        mut source: S,
        stop: CancellationToken,
    ) -> DispatchExit {
        info!("starting dispatch");

        let exit = loop {
            tokio::select! {
                _ = stop.cancelled() => break DispatchExit::Cancelled,
                event = source.next_event() => match event {
                    Some(WatchEvent::Changed) => {
                        self.dispatch();
                    }
                    Some(WatchEvent::Removed) => break DispatchExit::SourceRemoved,
                    Some(WatchEvent::WatchError(err)) => {
                        warn!(error = %err, "change source error");
                    }
                    None => break DispatchExit::SourceClosed,
                },
            }
        };

        info!(exit = ?exit, "stopping dispatch");
        exit
    }
}

/// Shared per-session plumbing: cancellation and metrics.
#[derive(Clone)]
struct SessionRunner {
    cancel: CancellationToken,
    #[cfg(feature = "metrics")]
    metrics: Option<DispatchMetrics>,
}

impl SessionRunner {
    async fn run(
        self,
        session: NotificationSession,
        limit: Option<Arc<Semaphore>>,
    ) -> SessionOutcome {
        let _permit = match limit {
            Some(semaphore) => tokio::select! {
                permit = semaphore.acquire_owned() => permit.ok(),
                _ = self.cancel.cancelled() => return SessionOutcome::Cancelled,
            },
            None => None,
        };

        #[cfg(feature = "metrics")]
        let started = std::time::Instant::now();

        let outcome = session.run().await;

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_session(&outcome, started);
        }

        outcome
    }
}
