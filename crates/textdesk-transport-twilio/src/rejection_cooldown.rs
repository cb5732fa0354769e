//! Access-denied reply throttling.
//!
//! Every rejection is a paid outbound SMS, so a number that keeps texting
//! without being on the allow-list hears back once per cooldown.

use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Numbers that were recently denied, each expiring after the cooldown.
#[derive(Clone)]
pub struct RejectionCooldown {
    denied: Cache<String, ()>,
    silenced: Arc<AtomicU64>,
}

impl RejectionCooldown {
    /// Cooldown of `cooldown_secs`, tracking at most `max_numbers` senders.
    #[must_use]
    pub fn new(cooldown_secs: u64, max_numbers: u64) -> Self {
        Self {
            denied: Cache::builder()
                .max_capacity(max_numbers)
                .time_to_live(Duration::from_secs(cooldown_secs))
                .build(),
            silenced: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Claims the rejection reply for `sender`.
    ///
    /// Returns `true` exactly once per cooldown; concurrent webhooks from
    /// the same number cannot both win.
    pub async fn admit(&self, sender: &str) -> bool {
        let entry = self.denied.entry_by_ref(sender).or_insert(()).await;
        if entry.is_fresh() {
            return true;
        }

        let silenced = self.silenced.fetch_add(1, Ordering::Relaxed) + 1;
        if silenced % 100 == 0 {
            debug!(silenced, sender = %sender, "Rejection replies suppressed");
        }
        false
    }

    /// Numbers currently cooling down (approximate).
    #[must_use]
    pub fn cooling_down(&self) -> u64 {
        self.denied.entry_count()
    }

    /// Rejection replies suppressed since start.
    #[must_use]
    pub fn silenced(&self) -> u64 {
        self.silenced.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STRANGER: &str = "+15550000000";

    #[tokio::test]
    async fn test_only_first_rejection_is_admitted() {
        let cooldown = RejectionCooldown::new(60, 100);
        assert!(cooldown.admit(STRANGER).await);
        assert!(!cooldown.admit(STRANGER).await);
        assert!(!cooldown.admit(STRANGER).await);
        assert_eq!(cooldown.silenced(), 2);
    }

    #[tokio::test]
    async fn test_numbers_cool_down_separately() {
        let cooldown = RejectionCooldown::new(60, 100);
        assert!(cooldown.admit("+15550000001").await);
        assert!(cooldown.admit("+15550000002").await);
        assert_eq!(cooldown.silenced(), 0);

        cooldown.denied.run_pending_tasks().await;
        assert_eq!(cooldown.cooling_down(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_rejections_admit_one() {
        let cooldown = RejectionCooldown::new(60, 100);
        let attempts = (0..8).map(|_| {
            let cooldown = cooldown.clone();
            tokio::spawn(async move { cooldown.admit(STRANGER).await })
        });
        let mut admitted = 0;
        for attempt in attempts.collect::<Vec<_>>() {
            if attempt.await.expect("join") {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
        assert_eq!(cooldown.silenced(), 7);
    }

    #[tokio::test]
    async fn test_admitted_again_after_cooldown() {
        let cooldown = RejectionCooldown::new(1, 100);
        assert!(cooldown.admit(STRANGER).await);
        assert!(!cooldown.admit(STRANGER).await);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(cooldown.admit(STRANGER).await);
    }
}
