//! Tickers for the setup flow's polling loops, with cancellation support.
//!
//! A [`Ticker`] runs a closure after an initial delay and then on each
//! interval tick, until cancelled by id. The setup state machine owns two
//! of these (step cycle + permission poll) and cancels both the moment the
//! terminal condition is reached.

use std::{collections::HashMap, sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Upper bound on waiting for a cancelled ticker task to finish.
const STOP_WAIT_TIMEOUT_MS: u64 = 250;

/// One scheduled ticker task.
struct TickerEntry {
    /// Cancellation token observed by the task.
    token: CancellationToken,
    /// Join handle, awaited (bounded) during clear.
    handle: tokio::task::JoinHandle<()>,
}

/// Minimal ticker core: schedules a closure after an initial delay and then
/// on each interval tick. Supports cancellation by id.
#[derive(Clone)]
pub struct Ticker {
    /// Active tickers by id.
    entries: Arc<Mutex<HashMap<String, TickerEntry>>>,
}

impl Default for Ticker {
    fn default() -> Self {
        Self::new()
    }
}

impl Ticker {
    /// Create an empty ticker set.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Check if a ticker is active for the given id.
    pub fn is_active(&self, id: &str) -> bool {
        self.entries.lock().contains_key(id)
    }

    /// Start or replace a ticker for `id` with the given timings.
    pub fn start<F>(&self, id: String, initial: Duration, interval: Duration, mut on_tick: F)
    where
        F: FnMut() + Send + 'static,
    {
        // Replace any existing ticker for this id
        self.stop(&id);

        let token = CancellationToken::new();
        let cancel = token.clone();
        let id_for_log = id.clone();

        let fut = async move {
            trace!(
                "ticker_start" = %id_for_log,
                init_ms = initial.as_millis(),
                int_ms = interval.as_millis()
            );

            // Initial delay with cancellation
            tokio::select! {
                _ = time::sleep(initial) => {}
                _ = cancel.cancelled() => {
                    trace!("ticker_cancelled_initial" = %id_for_log);
                    return;
                }
            }

            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        trace!("ticker_cancelled" = %id_for_log);
                        return;
                    }
                    _ = ticker.tick() => {
                        on_tick();
                    }
                }
            }
        };

        let handle = tokio::spawn(fut);
        self.entries
            .lock()
            .insert(id, TickerEntry { token, handle });
    }

    /// Stop a ticker if present (non-blocking).
    pub fn stop(&self, id: &str) {
        if let Some(entry) = self.entries.lock().remove(id) {
            entry.token.cancel();
            // Don't abort the handle, let it cancel gracefully via the token
            trace!("ticker_stop" = %id);
        }
    }

    /// Cancel and wait for all tickers to finish.
    pub async fn clear_async(&self) {
        let entries: Vec<TickerEntry> = {
            let mut map = self.entries.lock();
            map.drain().map(|(_, e)| e).collect()
        };

        // Cancel all tokens first
        for e in &entries {
            e.token.cancel();
        }

        // Await each handle with a timeout
        for e in entries {
            let _ =
                tokio::time::timeout(Duration::from_millis(STOP_WAIT_TIMEOUT_MS), e.handle).await;
        }
        trace!("ticker_clear_async");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ticks_after_initial_delay_then_interval() {
        let ticker = Ticker::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_tick = count.clone();
        ticker.start(
            "t".into(),
            Duration::from_millis(100),
            Duration::from_millis(50),
            move || {
                count_tick.fetch_add(1, Ordering::SeqCst);
            },
        );
        tokio::time::sleep(Duration::from_millis(90)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(count.load(Ordering::SeqCst) >= 2);
        ticker.stop("t");
        assert!(!ticker.is_active("t"));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_prevents_further_ticks() {
        let ticker = Ticker::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_tick = count.clone();
        ticker.start(
            "t".into(),
            Duration::from_millis(10),
            Duration::from_millis(10),
            move || {
                count_tick.fetch_add(1, Ordering::SeqCst);
            },
        );
        tokio::time::sleep(Duration::from_millis(35)).await;
        ticker.stop("t");
        let after_stop = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_cancels_everything() {
        let ticker = Ticker::new();
        ticker.start(
            "a".into(),
            Duration::from_millis(10),
            Duration::from_millis(10),
            || {},
        );
        ticker.start(
            "b".into(),
            Duration::from_millis(10),
            Duration::from_millis(10),
            || {},
        );
        ticker.clear_async().await;
        assert!(!ticker.is_active("a"));
        assert!(!ticker.is_active("b"));
    }
}
