// ABOUTME: Clock and polling primitives for bounded waits.
// ABOUTME: Settle delays and health polling go through an injectable Clock so tests never sleep.

use async_trait::async_trait;
use futures::future::{self, Either};
use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;

/// Source of monotonic time and sleeping.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock was created.
    fn now(&self) -> Duration;

    /// Suspend the caller for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by the tokio timer.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual clock: `sleep` advances time instantly and is recorded.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward without recording a sleep (e.g. a slow request).
    pub fn advance(&self, duration: Duration) {
        *self.now.lock() += duration;
    }

    /// Every sleep requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }

    pub fn total_slept(&self) -> Duration {
        self.sleeps.lock().iter().sum()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().push(duration);
        self.advance(duration);
    }
}

/// Fixed-interval polling bounded by a total timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Result of [`poll_until`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Ready { value: T, attempts: u32 },
    TimedOut { attempts: u32, elapsed: Duration },
}

impl<T> PollOutcome<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, PollOutcome::Ready { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            PollOutcome::Ready { attempts, .. } | PollOutcome::TimedOut { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Call `probe` until it yields `Some`, or until `policy.timeout` has passed
/// since the first probe.
///
/// Probes only start while elapsed time is strictly below the timeout. A probe
/// still running at the deadline is dropped, and the final sleep is clipped, so
/// the loop never runs past the deadline.
pub async fn poll_until<T, F, Fut>(
    clock: &dyn Clock,
    policy: PollPolicy,
    mut probe: F,
) -> PollOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let start = clock.now();
    let mut attempts = 0u32;

    loop {
        let elapsed = clock.now().saturating_sub(start);
        if attempts > 0 && elapsed >= policy.timeout {
            return PollOutcome::TimedOut { attempts, elapsed };
        }

        attempts += 1;
        let attempt = std::pin::pin!(probe(attempts));
        let deadline = clock.sleep(policy.timeout.saturating_sub(elapsed));
        match future::select(attempt, deadline).await {
            Either::Left((Some(value), _)) => return PollOutcome::Ready { value, attempts },
            Either::Left((None, _)) => {}
            Either::Right(((), _)) => {
                tracing::debug!(attempt = attempts, "probe still running at the deadline, abandoned");
                let elapsed = clock.now().saturating_sub(start);
                return PollOutcome::TimedOut { attempts, elapsed };
            }
        }

        let elapsed = clock.now().saturating_sub(start);
        let Some(remaining) = policy.timeout.checked_sub(elapsed).filter(|r| !r.is_zero()) else {
            return PollOutcome::TimedOut { attempts, elapsed };
        };
        clock.sleep(policy.interval.min(remaining)).await;
    }
}
