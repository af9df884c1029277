//! Fixed-period status timer.

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Default time between status requests.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(4000);

/// A cancellable periodic timer.
///
/// The first tick fires one full period after [`Poller::start`]; a slow
/// status request delays later ticks instead of bursting to catch up.
#[derive(Debug)]
pub struct Poller {
    period: Duration,
    interval: Option<Interval>,
}

impl Poller {
    /// Creates a stopped poller. A zero period is raised to one millisecond.
    #[must_use]
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(Duration::from_millis(1)),
            interval: None,
        }
    }

    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// (Re)starts the timer. Any previous schedule is dropped.
    pub fn start(&mut self) {
        let mut interval = tokio::time::interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
    }

    /// Stops the timer. Calling it again is a no-op.
    ///
    /// Returns whether a running timer was stopped.
    pub fn stop(&mut self) -> bool {
        self.interval.take().is_some()
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    /// Waits for the next tick. Returns `false` immediately when stopped.
    pub async fn tick(&mut self) -> bool {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
                true
            }
            None => false,
        }
    }
}

impl Default for Poller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_tick_waits_a_full_period() {
        let mut poller = Poller::new(Duration::from_secs(4));
        poller.start();

        let started = Instant::now();
        assert!(poller.tick().await);
        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent() {
        let mut poller = Poller::default();
        assert!(!poller.stop());

        poller.start();
        assert!(poller.is_running());
        assert!(poller.stop());
        assert!(!poller.stop());
        assert!(!poller.tick().await);
    }
}
