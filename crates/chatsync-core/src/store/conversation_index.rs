use crate::models::Message;
use std::collections::HashMap;

/// Latest observed message per conversation partner, plus the list last
/// materialized from it.
#[derive(Debug, Default)]
pub struct ConversationIndex {
    /// partner id -> last message resolved for that partner
    latest: HashMap<String, Message>,
    /// Newest first, one entry per partner
    list: Vec<Message>,
}

impl ConversationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.latest.clear();
        self.list.clear();
    }

    // ===== Getters =====

    pub fn len(&self) -> usize {
        self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }

    pub fn latest_for(&self, partner_id: &str) -> Option<&Message> {
        self.latest.get(partner_id)
    }

    /// The list as of the last `materialize` call
    pub fn list(&self) -> &[Message] {
        &self.list
    }

    /// What `materialize` would produce now, without replacing the list.
    pub fn sorted(&self) -> Vec<Message> {
        let mut entries: Vec<(&String, &Message)> = self.latest.iter().collect();
        // Newest first; equal timestamps fall back to partner id so the order
        // does not depend on map iteration.
        entries.sort_by(|(partner_a, a), (partner_b, b)| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| partner_a.cmp(partner_b))
        });
        entries.into_iter().map(|(_, message)| message.clone()).collect()
    }

    // ===== Mutations =====

    /// Last write wins, whatever the timestamps. Returns the replaced message.
    pub fn upsert(&mut self, partner_id: String, message: Message) -> Option<Message> {
        self.latest.insert(partner_id, message)
    }

    /// Rebuild the list from the index.
    pub fn materialize(&mut self) -> &[Message] {
        self.list = self.sorted();
        &self.list
    }
}
