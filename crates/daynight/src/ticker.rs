// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Periodic refresh schedule.
//!
//! A background task delivers ticks over a channel; the owner drains them on
//! its own thread, so the map surface is never touched from the task.

use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Longest supported refresh period. Longer periods are clamped.
pub const MAX_REFRESH_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Callback run after each tick is queued (e.g. to wake a UI event loop).
pub type TickNotify = Box<dyn Fn() + Send + Sync + 'static>;

/// A single timer firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Sequence number, starting at 1.
    pub sequence: u64,
}

/// Handle to a running periodic schedule.
///
/// The first tick fires one full period after the ticker is spawned.
pub struct RefreshTicker {
    tick_rx: mpsc::UnboundedReceiver<Tick>,
    cancel_token: CancellationToken,
    period: Duration,
}

impl std::fmt::Debug for RefreshTicker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshTicker")
            .field("period", &self.period)
            .field("cancel_token", &self.cancel_token)
            .finish_non_exhaustive()
    }
}

impl RefreshTicker {
    /// Spawn the timer task on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime context.
    #[must_use]
    pub fn spawn(period: Duration, notify: TickNotify) -> Self {
        let period = if period > MAX_REFRESH_PERIOD {
            warn!("Refresh period {period:?} clamped to {MAX_REFRESH_PERIOD:?}");
            MAX_REFRESH_PERIOD
        } else {
            period
        };
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();
        let task_cancel = cancel_token.clone();

        tokio::spawn(async move {
            tick_loop(period, tick_tx, task_cancel, notify).await;
        });

        info!("Periodic overlay refresh armed every {}s", period.as_secs_f64());

        Self {
            tick_rx,
            cancel_token,
            period,
        }
    }

    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Take every tick that has fired since the last call.
    pub fn try_recv_all(&mut self) -> Vec<Tick> {
        let mut ticks = Vec::new();
        while let Ok(tick) = self.tick_rx.try_recv() {
            ticks.push(tick);
        }
        ticks
    }

    /// Wait for the next tick. Returns `None` once the ticker is cancelled.
    pub async fn recv(&mut self) -> Option<Tick> {
        self.tick_rx.recv().await
    }

    /// Stop the schedule. Calling this again is a no-op.
    pub fn cancel(&mut self) {
        if !self.cancel_token.is_cancelled() {
            debug!("Cancelling periodic overlay refresh");
            self.cancel_token.cancel();
        }
        // Ticks queued before the cancel must not be acted on
        self.tick_rx.close();
        while self.tick_rx.try_recv().is_ok() {}
    }

    /// Token that is cancelled together with this schedule.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

impl Drop for RefreshTicker {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn tick_loop(
    period: Duration,
    tick_tx: mpsc::UnboundedSender<Tick>,
    cancel_token: CancellationToken,
    notify: TickNotify,
) {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut sequence = 0_u64;

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                debug!("Refresh ticker stopped after {sequence} ticks");
                return;
            }
            _ = interval.tick() => {
                sequence += 1;
                if tick_tx.send(Tick { sequence }).is_err() {
                    return; // Receiver dropped
                }
                notify();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const PERIOD: Duration = Duration::from_secs(30);

    fn quiet() -> TickNotify {
        Box::new(|| {})
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_one_period() {
        let mut ticker = RefreshTicker::spawn(PERIOD, quiet());
        let started = Instant::now();

        let tick = ticker.recv().await.unwrap();
        assert_eq!(tick.sequence, 1);
        assert!(started.elapsed() >= PERIOD);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_tick_before_period() {
        let mut ticker = RefreshTicker::spawn(PERIOD, quiet());
        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(ticker.try_recv_all().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_repeat() {
        let mut ticker = RefreshTicker::spawn(PERIOD, quiet());
        assert_eq!(ticker.recv().await, Some(Tick { sequence: 1 }));
        assert_eq!(ticker.recv().await, Some(Tick { sequence: 2 }));
        assert_eq!(ticker.recv().await, Some(Tick { sequence: 3 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_notify_runs_per_tick() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let mut ticker = RefreshTicker::spawn(
            PERIOD,
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        ticker.recv().await.unwrap();
        ticker.recv().await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_twice_is_noop() {
        let mut ticker = RefreshTicker::spawn(PERIOD, quiet());
        ticker.cancel();
        ticker.cancel();
        assert!(ticker.is_cancelled());

        let next = tokio::time::timeout(PERIOD * 4, ticker.recv()).await;
        assert!(!matches!(next, Ok(Some(_))), "cancelled ticker fired: {next:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_first_tick() {
        let mut ticker = RefreshTicker::spawn(PERIOD, quiet());
        ticker.cancel();
        tokio::time::sleep(PERIOD * 3).await;
        assert!(ticker.try_recv_all().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_discards_pending_ticks() {
        let mut ticker = RefreshTicker::spawn(PERIOD, quiet());
        tokio::time::sleep(PERIOD * 2 + Duration::from_secs(1)).await;
        ticker.cancel();
        assert!(ticker.try_recv_all().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_period_is_clamped_and_keeps_ticking() {
        let mut ticker = RefreshTicker::spawn(Duration::MAX, quiet());
        assert_eq!(ticker.period(), MAX_REFRESH_PERIOD);

        let next = tokio::time::timeout(MAX_REFRESH_PERIOD * 2, ticker.recv()).await;
        assert_eq!(next, Ok(Some(Tick { sequence: 1 })));
        assert!(!ticker.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_token_follows_cancel() {
        let mut ticker = RefreshTicker::spawn(PERIOD, quiet());
        let token = ticker.cancellation_token();
        assert!(!token.is_cancelled());
        ticker.cancel();
        assert!(token.is_cancelled());
    }
}
