//! Boundary to the hosted realtime store and its auth service.
//!
//! The sync engine only ever sees these traits. `MemoryStore` implements both
//! for tests and the CLI.

pub mod memory;

use std::fmt;

use futures::stream::BoxStream;
use serde_json::Value;

use crate::constants::paths;
use crate::error::{AuthError, SubscriptionError};

pub use memory::MemoryStore;

/// Slash-separated location in the store, e.g. `user-messages/alice/bob`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorePath(String);

impl StorePath {
    pub fn new(path: &str) -> Self {
        let normalized = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join("/");
        Self(normalized)
    }

    pub fn child(&self, key: &str) -> Self {
        let key = key.trim_matches('/');
        if self.0.is_empty() {
            Self::new(key)
        } else {
            Self::new(&format!("{}/{}", self.0, key))
        }
    }

    /// Split into the parent path and this node's key. `None` for the root.
    pub fn split_parent(&self) -> Option<(StorePath, &str)> {
        if self.0.is_empty() {
            return None;
        }
        match self.0.rsplit_once('/') {
            Some((parent, key)) => Some((StorePath(parent.to_string()), key)),
            None => Some((StorePath(String::new()), self.0.as_str())),
        }
    }

    pub fn key(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Conversation partners of `user_id`
    pub fn user_threads(user_id: &str) -> Self {
        Self::new(paths::USER_MESSAGES).child(user_id)
    }

    /// Message ids exchanged between `user_id` and `partner_id`
    pub fn thread_messages(user_id: &str, partner_id: &str) -> Self {
        Self::user_threads(user_id).child(partner_id)
    }

    pub fn message(message_id: &str) -> Self {
        Self::new(paths::MESSAGES).child(message_id)
    }

    pub fn user(user_id: &str) -> Self {
        Self::new(paths::USERS).child(user_id)
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}

/// A child appearing under a watched node.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildEvent {
    pub key: String,
    pub value: Value,
}

pub type ChildStream = BoxStream<'static, Result<ChildEvent, SubscriptionError>>;
pub type ValueStream = BoxStream<'static, Result<Value, SubscriptionError>>;

/// Change feeds of the realtime store.
///
/// Streams are long-lived; dropping one ends the subscription. A stream that
/// yields an error is finished and must be reopened.
pub trait RemoteStore: Send + Sync + 'static {
    /// Existing children of `path` followed by every child added later.
    fn subscribe_child_added(&self, path: &StorePath) -> Result<ChildStream, SubscriptionError>;

    /// The current value of `path` (if any) followed by every later change.
    fn subscribe_value(&self, path: &StorePath) -> Result<ValueStream, SubscriptionError>;
}

pub trait AuthProvider: Send + Sync + 'static {
    fn current_user_id(&self) -> Option<String>;

    fn sign_out(&self) -> Result<(), AuthError>;
}
