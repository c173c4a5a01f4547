//! Registry of named change subscribers.

use super::channel::{self, Notifications, NotifySender};
use super::status::Status;
use crate::error::CallbackError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Type-erased subscriber callback with its user data bound in.
type ErasedCallback = Arc<dyn Fn(CancellationToken, Option<CallbackError>) -> Status + Send + Sync>;

/// One registered watcher, as seen by a notification session.
///
/// Cloning is cheap: the callback and user data are shared, and the
/// notification sender is a channel handle.
#[derive(Clone)]
pub struct Subscription {
    generation: u64,
    callback: ErasedCallback,
    sender: NotifySender,
    last_error: Option<CallbackError>,
}

impl Subscription {
    /// Registration id; a re-registration under the same name gets a new one.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The most recent error observed from this subscriber's callback.
    pub fn last_error(&self) -> Option<&CallbackError> {
        self.last_error.as_ref()
    }

    pub(crate) fn set_last_error(&mut self, err: Option<CallbackError>) {
        self.last_error = err;
    }

    pub(crate) fn invoke(
        &self,
        cancel: CancellationToken,
        last_error: Option<CallbackError>,
    ) -> Status {
        (self.callback)(cancel, last_error)
    }

    pub(crate) fn sender(&self) -> &NotifySender {
        &self.sender
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("generation", &self.generation)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

struct RegistryInner {
    subscriptions: HashMap<String, Subscription>,
    next_generation: u64,
}

/// Registry mapping subscriber names to their subscriptions.
///
/// All mutation and snapshotting is serialized by a single mutex that is never
/// held across an await point. Dispatch works on snapshots, so slow callbacks
/// never hold the lock.
///
/// # Examples
///
/// ```rust,no_run
/// use configio::notify::{Status, SubscriptionRegistry};
///
/// # async fn example() {
/// let registry = SubscriptionRegistry::new();
///
/// let mut notifications = registry.register("cache", (), |_cancel, _data, _last_error| {
///     Status::ok()
/// });
///
/// assert!(registry.contains("cache"));
/// # }
/// ```
#[derive(Clone)]
pub struct SubscriptionRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(RegistryInner {
                subscriptions: HashMap::new(),
                next_generation: 0,
            })),
        }
    }

    /// Register `callback` under `name`, replacing any previous registration.
    ///
    /// `data` is handed to every invocation of `callback` unchanged. The
    /// returned [`Notifications`] receives one token per change event.
    ///
    /// Replacing a registration drops its notification sender; the superseded
    /// receiver reports `None` once deliveries already in flight for it finish.
    pub fn register<D, F, R>(&self, name: impl Into<String>, data: D, callback: F) -> Notifications
    where
        D: Send + Sync + 'static,
        F: Fn(CancellationToken, Arc<D>, Option<CallbackError>) -> R + Send + Sync + 'static,
        R: Into<Status>,
    {
        let name = name.into();
        let data = Arc::new(data);
        let callback: ErasedCallback = Arc::new(
            move |cancel: CancellationToken, last_error: Option<CallbackError>| -> Status {
                callback(cancel, Arc::clone(&data), last_error).into()
            },
        );
        let (sender, notifications) = channel::channel();

        let mut inner = self.inner.lock();
        let generation = inner.next_generation;
        inner.next_generation += 1;

        let previous = inner.subscriptions.insert(
            name.clone(),
            Subscription {
                generation,
                callback,
                sender,
                last_error: None,
            },
        );
        drop(inner);

        if let Some(previous) = previous {
            tracing::debug!(
                callback = %name,
                superseded = previous.generation,
                generation,
                "replaced existing registration"
            );
        } else {
            tracing::debug!(callback = %name, generation, "registered");
        }

        notifications
    }

    /// Point-in-time copy of all registrations.
    pub fn snapshot(&self) -> Vec<(String, Subscription)> {
        self.inner
            .lock()
            .subscriptions
            .iter()
            .map(|(name, sub)| (name.clone(), sub.clone()))
            .collect()
    }

    /// Remove the registration under `name`, if any.
    pub fn remove(&self, name: &str) -> bool {
        self.inner.lock().subscriptions.remove(name).is_some()
    }

    /// Remove the registration under `name` only if it is still `generation`.
    ///
    /// A session that outlives a re-registration must not remove the newer entry.
    pub fn remove_generation(&self, name: &str, generation: u64) -> bool {
        let mut inner = self.inner.lock();
        let current = inner
            .subscriptions
            .get(name)
            .is_some_and(|sub| sub.generation == generation);
        if current {
            inner.subscriptions.remove(name);
        }
        current
    }

    /// Returns true if a registration exists under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.lock().subscriptions.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.lock().subscriptions.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.inner.lock().subscriptions.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().subscriptions.is_empty()
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::time::Duration;

    fn ok_callback(_: CancellationToken, _: Arc<()>, _: Option<CallbackError>) -> Status {
        Status::ok()
    }

    #[test]
    fn test_register_and_snapshot() {
        let registry = SubscriptionRegistry::new();
        let _a = registry.register("a", (), ok_callback);
        let _b = registry.register("b", (), ok_callback);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(registry.names(), vec!["a", "b"]);
        assert!(snapshot.iter().all(|(_, sub)| sub.last_error().is_none()));
    }

    #[test]
    fn test_reregister_overwrites() {
        let registry = SubscriptionRegistry::new();
        let _first = registry.register("a", (), ok_callback);
        let first_gen = registry.snapshot()[0].1.generation();

        let _second = registry.register("a", (), ok_callback);
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_ne!(snapshot[0].1.generation(), first_gen);
    }

    #[tokio::test]
    async fn test_superseded_receiver_closes() {
        let registry = SubscriptionRegistry::new();
        let mut first = registry.register("a", (), ok_callback);
        let _second = registry.register("a", (), ok_callback);

        let result = tokio::time::timeout(Duration::from_millis(100), first.recv()).await;
        assert_eq!(result.unwrap(), None);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = SubscriptionRegistry::new();
        let _a = registry.register("a", (), ok_callback);

        assert!(registry.remove("a"));
        assert!(!registry.remove("a"));
        assert!(!registry.remove("never-registered"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_generation_spares_newer_registration() {
        let registry = SubscriptionRegistry::new();
        let _old = registry.register("a", (), ok_callback);
        let old_gen = registry.snapshot()[0].1.generation();
        let _new = registry.register("a", (), ok_callback);

        assert!(!registry.remove_generation("a", old_gen));
        assert!(registry.contains("a"));

        let new_gen = registry.snapshot()[0].1.generation();
        assert!(registry.remove_generation("a", new_gen));
        assert!(!registry.contains("a"));
    }

    #[tokio::test]
    async fn test_user_data_passed_through() {
        let registry = SubscriptionRegistry::new();
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = Arc::clone(&seen);

        let _rx = registry.register("a", 42u32, move |_cancel, data: Arc<u32>, _err| {
            *seen_clone.lock() = Some(*data);
            Status::ok()
        });

        let (_, sub) = registry.snapshot().remove(0);
        sub.invoke(CancellationToken::new(), None).await.unwrap();
        assert_eq!(*seen.lock(), Some(42));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let registry = SubscriptionRegistry::new();
        let _a = registry.register("a", (), ok_callback);
        let snapshot = registry.snapshot();

        registry.remove("a");
        assert_eq!(snapshot.len(), 1);
        assert!(registry.is_empty());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Register(u8),
        Remove(u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..6).prop_map(Op::Register),
            (0u8..6).prop_map(Op::Remove),
        ]
    }

    proptest! {
        #[test]
        fn prop_registry_matches_model(ops in proptest::collection::vec(op(), 0..40)) {
            let registry = SubscriptionRegistry::new();
            let mut model = HashSet::new();
            let mut receivers = Vec::new();

            for op in ops {
                match op {
                    Op::Register(n) => {
                        receivers.push(registry.register(format!("s{n}"), (), ok_callback));
                        model.insert(format!("s{n}"));
                    }
                    Op::Remove(n) => {
                        let name = format!("s{n}");
                        prop_assert_eq!(registry.remove(&name), model.remove(&name));
                    }
                }
            }

            let mut expected: Vec<String> = model.into_iter().collect();
            expected.sort();
            prop_assert_eq!(registry.names(), expected);
            prop_assert_eq!(registry.len(), registry.snapshot().len());
        }
    }
}
