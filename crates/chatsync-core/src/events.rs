use crate::models::Message;

/// Notifications from the sync worker to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncUpdate {
    /// Newest conversation first, one message per partner
    ConversationListChanged(Vec<Message>),
    /// Index and list were emptied (login, logout, user switch)
    SessionCleared,
    /// No user is signed in any more - UI should show its login screen
    SignedOut,
}
