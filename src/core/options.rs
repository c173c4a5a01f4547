//! Tuning knobs for file watching and notification delivery.

use std::time::Duration;

/// Default window for coalescing bursts of file modifications.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

/// Delivery deadline applied when sessions are bounded but no deadline was set.
pub const DEFAULT_BOUNDED_DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Options controlling how changes are detected and delivered.
///
/// The defaults reproduce the plain protocol: every session waits as long as it
/// takes and the number of concurrent sessions is unbounded.
///
/// # Examples
///
/// ```rust
/// use configio::core::WatchOptions;
/// use std::time::Duration;
///
/// let options = WatchOptions::default()
///     .with_debounce(Duration::from_millis(200))
///     .with_delivery_timeout(Duration::from_secs(30))
///     .with_max_concurrent_sessions(16);
///
/// assert_eq!(options.max_concurrent_sessions, Some(16));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchOptions {
    /// Changes within this window after the first one are reported once.
    /// `Duration::ZERO` reports every modification event.
    pub debounce: Duration,
    /// Deadline for a subscriber to both receive a notification and report its
    /// status. Missing it counts as a callback failure. `None` waits forever.
    pub delivery_timeout: Option<Duration>,
    /// Upper bound on sessions running at once for a single change event.
    /// `None` is unbounded.
    ///
    /// Every change event gets its own bound, so a subscriber stuck on one
    /// event never holds back later events. Within one event, subscribers that
    /// never finish still occupy permits; a bound therefore always comes with a
    /// delivery deadline, [`DEFAULT_BOUNDED_DELIVERY_TIMEOUT`] unless one is set.
    pub max_concurrent_sessions: Option<usize>,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            delivery_timeout: None,
            max_concurrent_sessions: None,
        }
    }
}

impl WatchOptions {
    /// Set the debounce window.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Set a delivery deadline.
    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = Some(timeout);
        self
    }

    /// Bound the number of concurrently running sessions per change event.
    /// Zero is treated as one.
    pub fn with_max_concurrent_sessions(mut self, max: usize) -> Self {
        self.max_concurrent_sessions = Some(max.max(1));
        self
    }

    /// The deadline sessions actually run with.
    ///
    /// An explicit `delivery_timeout` wins. Without one, a bounded
    /// configuration falls back to [`DEFAULT_BOUNDED_DELIVERY_TIMEOUT`] and an
    /// unbounded one waits forever.
    pub fn effective_delivery_timeout(&self) -> Option<Duration> {
        self.delivery_timeout
            .or(self.max_concurrent_sessions.map(|_| DEFAULT_BOUNDED_DELIVERY_TIMEOUT))
    }
}
