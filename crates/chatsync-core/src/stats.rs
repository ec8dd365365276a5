use std::sync::{Arc, RwLock};

/// Counters for everything the sync pipeline sees, including every error path.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncStats {
    /// Thread (partner) ids delivered by the user's thread feed
    pub threads_observed: u64,
    /// Message ids delivered by thread feeds
    pub message_ids_observed: u64,
    /// Message records decoded and written to the index
    pub messages_resolved: u64,
    pub decode_errors: u64,
    pub subscription_errors: u64,
    pub subscription_retries: u64,
    /// Subscriptions given up on after exhausting retries
    pub subscriptions_lost: u64,
    pub materializations: u64,
    pub auth_errors: u64,
    /// Subscription handles currently alive
    pub held_subscriptions: u64,
}

impl SyncStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of all error counters
    pub fn total_errors(&self) -> u64 {
        self.decode_errors + self.subscription_errors + self.auth_errors
    }
}

/// Thread-safe wrapper for sync stats
#[derive(Debug, Clone, Default)]
pub struct SharedSyncStats {
    inner: Arc<RwLock<SyncStats>>,
}

impl SharedSyncStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, apply: impl FnOnce(&mut SyncStats)) {
        if let Ok(mut stats) = self.inner.write() {
            apply(&mut stats);
        }
    }

    pub fn record_thread(&self) {
        self.update(|s| s.threads_observed += 1);
    }

    pub fn record_message_id(&self) {
        self.update(|s| s.message_ids_observed += 1);
    }

    pub fn record_resolved(&self) {
        self.update(|s| s.messages_resolved += 1);
    }

    pub fn record_decode_error(&self) {
        self.update(|s| s.decode_errors += 1);
    }

    pub fn record_subscription_error(&self) {
        self.update(|s| s.subscription_errors += 1);
    }

    pub fn record_retry(&self) {
        self.update(|s| s.subscription_retries += 1);
    }

    pub fn record_lost(&self) {
        self.update(|s| s.subscriptions_lost += 1);
    }

    pub fn record_materialization(&self) {
        self.update(|s| s.materializations += 1);
    }

    pub fn record_auth_error(&self) {
        self.update(|s| s.auth_errors += 1);
    }

    pub fn subscription_opened(&self) {
        self.update(|s| s.held_subscriptions += 1);
    }

    pub fn subscription_closed(&self) {
        self.update(|s| s.held_subscriptions = s.held_subscriptions.saturating_sub(1));
    }

    pub fn snapshot(&self) -> SyncStats {
        self.inner.read().map(|s| s.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_counters() {
        let stats = SharedSyncStats::new();
        let other = stats.clone();
        stats.record_decode_error();
        other.record_subscription_error();
        other.record_auth_error();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.decode_errors, 1);
        assert_eq!(snapshot.total_errors(), 3);
    }

    #[test]
    fn test_held_subscriptions_never_underflow() {
        let stats = SharedSyncStats::new();
        stats.subscription_opened();
        stats.subscription_closed();
        stats.subscription_closed();
        assert_eq!(stats.snapshot().held_subscriptions, 0);
    }
}
