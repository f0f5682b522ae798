//! Lifecycle sweeper: periodic eviction of stale contexts.
//!
//! A process-wide background task with explicit start/stop tied to the
//! application lifecycle. Runs off the request path on its own timer and
//! uses the store's own per-shard discipline, so request handling never
//! blocks on a sweep. A tick that evicts nothing is not an error; the next
//! tick simply tries again.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::context::ContextStore;

/// Periodically evicts contexts older than the configured inactivity
/// threshold.
pub struct LifecycleSweeper {
    store: Arc<ContextStore>,
    sweep_interval: Duration,
    max_age_hours: u32,
    token: CancellationToken,
}

impl LifecycleSweeper {
    /// Create a sweeper (not yet started).
    pub fn new(store: Arc<ContextStore>, sweep_interval: Duration, max_age_hours: u32) -> Self {
        Self {
            store,
            sweep_interval,
            max_age_hours,
            token: CancellationToken::new(),
        }
    }

    /// Spawn the background sweep loop.
    ///
    /// The first immediate interval tick is skipped so startup is not a
    /// sweep. Missed ticks are delayed, not bunched.
    pub fn start(&self) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let token = self.token.clone();
        let period = self.sweep_interval;
        let max_age_hours = self.max_age_hours;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            debug!(period_secs = period.as_secs(), max_age_hours, "sweeper started");
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let evicted = store.sweep(max_age_hours);
                        if evicted > 0 {
                            info!(evicted, "evicted stale conversation contexts");
                        } else {
                            debug!("sweep found no stale contexts");
                        }
                    }
                }
            }
        })
    }

    /// Signal the sweep loop to exit. Idempotent.
    pub fn stop(&self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_types::message::Message;

    #[tokio::test]
    async fn test_sweeper_evicts_on_tick() {
        let store = Arc::new(ContextStore::new(10, None));
        store.append("alice", Message::user("hi"));
        store.append("bob", Message::user("hello"));

        // max_age 0: every tick evicts everything inactive since before now.
        let sweeper = LifecycleSweeper::new(Arc::clone(&store), Duration::from_millis(20), 0);
        let handle = sweeper.start();

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(store.is_empty());

        sweeper.stop();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_sweeper_skips_startup_tick() {
        let store = Arc::new(ContextStore::new(10, None));
        store.append("alice", Message::user("hi"));

        let sweeper = LifecycleSweeper::new(Arc::clone(&store), Duration::from_secs(3600), 0);
        let handle = sweeper.start();

        // The immediate first tick is consumed without sweeping; with an
        // hour-long period nothing is evicted in the meantime.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.len(), 1);

        sweeper.stop();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_prompt() {
        let store = Arc::new(ContextStore::new(10, None));
        let sweeper = LifecycleSweeper::new(Arc::clone(&store), Duration::from_secs(3600), 24);
        let handle = sweeper.start();

        sweeper.stop();
        sweeper.stop();
        handle.await.unwrap();
    }
}
