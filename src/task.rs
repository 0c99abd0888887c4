//! Periodic task plumbing
//!
//! Every poll loop in the engine (wake listening, dictation capture,
//! interrupt polling, silence-deadline checks) is the same shape: tick at a
//! fixed cadence until cancelled. [`Ticker`] is that shape, once.

use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Cancellable fixed-cadence ticker
pub struct Ticker {
    interval: Interval,
    cancel: CancellationToken,
}

impl Ticker {
    /// Create a ticker firing every `period` until `cancel` is triggered
    ///
    /// The first tick fires one `period` from now, so a loop written as
    /// tick-then-poll behaves like a sleep-then-poll loop.
    #[must_use]
    pub fn new(period: Duration, cancel: CancellationToken) -> Self {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        // A stalled loop (e.g. a slow network call) should not burst-fire
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval, cancel }
    }

    /// Wait for the next tick; returns false once cancelled
    ///
    /// A cancelled ticker never reports another tick, so loops written as
    /// `while ticker.tick().await { .. }` cannot run after cancellation.
    pub async fn tick(&mut self) -> bool {
        tokio::select! {
            () = self.cancel.cancelled() => false,
            _ = self.interval.tick() => !self.cancel.is_cancelled(),
        }
    }

    /// Token this ticker observes
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ticks_until_cancelled() {
        let cancel = CancellationToken::new();
        let mut ticker = Ticker::new(Duration::from_millis(100), cancel.clone());

        assert!(ticker.tick().await);
        assert!(ticker.tick().await);

        cancel.cancel();
        assert!(!ticker.tick().await);
        assert!(!ticker.tick().await);
    }
}
