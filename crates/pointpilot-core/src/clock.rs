//! Time source and bounded waits.
//!
//! Every wait in the core goes through a [`Clock`] so that loops can be
//! driven by virtual time in tests and interrupted by a [`CancelToken`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

/// Longest single sleep slice, so cancellation is noticed promptly.
const SLEEP_SLICE: Duration = Duration::from_millis(250);

pub trait Clock {
    fn now(&self) -> Instant;

    /// Block for `duration`. May return early once cancelled.
    fn sleep(&self, duration: Duration);

    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Shared cancellation flag, set from a signal handler task.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Wall clock backed by `Instant` and `thread::sleep`.
#[derive(Debug, Clone, Default)]
pub struct SystemClock {
    cancel: CancelToken,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(cancel: CancelToken) -> Self {
        Self { cancel }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        loop {
            if self.cancel.is_cancelled() {
                return;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return;
            }
            std::thread::sleep(remaining.min(SLEEP_SLICE));
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Sleep and log how long the wait really took.
///
/// Short waits (under a second) are not logged.
pub fn wait_logged<C: Clock + ?Sized>(clock: &C, duration: Duration, label: &str) {
    let start = clock.now();
    clock.sleep(duration);
    if duration >= Duration::from_secs(1) {
        let real = clock.now().saturating_duration_since(start);
        info!(
            "{}: expected {:.2}s, real {:.2}s",
            label,
            duration.as_secs_f64(),
            real.as_secs_f64()
        );
    }
}

/// Convert configured seconds to a `Duration`, treating invalid values as zero.
pub(crate) fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_sleeps() {
        let clock = SystemClock::new();
        let start = Instant::now();
        clock.sleep(Duration::from_millis(20));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_cancelled_sleep_returns_early() {
        let cancel = CancelToken::new();
        let clock = SystemClock::with_cancel(cancel.clone());
        cancel.cancel();

        let start = Instant::now();
        clock.sleep(Duration::from_secs(5));
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(clock.is_cancelled());
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn test_secs_conversion() {
        assert_eq!(secs(1.5), Duration::from_millis(1500));
        assert_eq!(secs(-1.0), Duration::ZERO);
        assert_eq!(secs(f64::NAN), Duration::ZERO);
    }
}
