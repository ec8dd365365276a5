use std::collections::HashMap;

use tracing::debug;

use super::subscriptions::SubscriptionHandle;
use crate::remote::StorePath;

/// A signed-in user and every subscription opened on their behalf.
///
/// Subscriptions are keyed by path, which doubles as the "already watching"
/// check. Dropping the session stops all of them.
pub struct Session {
    user_id: String,
    epoch: u64,
    subscriptions: HashMap<StorePath, SubscriptionHandle>,
}

impl Session {
    pub fn new(user_id: String, epoch: u64) -> Self {
        Self {
            user_id,
            epoch,
            subscriptions: HashMap::new(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_watching(&self, path: &StorePath) -> bool {
        self.subscriptions.contains_key(path)
    }

    /// Keep `handle` alive for the rest of the session. Replaces (and stops)
    /// any earlier handle on the same path.
    pub fn hold(&mut self, handle: SubscriptionHandle) {
        self.subscriptions.insert(handle.path().clone(), handle);
    }

    /// Stop watching `path`. Returns whether anything was held there.
    pub fn release(&mut self, path: &StorePath) -> bool {
        self.subscriptions.remove(path).is_some()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        debug!(
            user = %self.user_id,
            epoch = self.epoch,
            subscriptions = self.subscriptions.len(),
            "releasing session"
        );
    }
}
