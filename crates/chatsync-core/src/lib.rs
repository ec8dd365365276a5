//! Keeps a "recent conversations" list in sync with a hosted realtime store.
//!
//! A user's thread feed is watched for partners, each thread for message ids,
//! and each message record for its contents. The latest message per partner
//! is kept in a `ConversationIndex` and handed to a `Presenter` as a sorted
//! list, at most once per quiet period.

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod models;
pub mod presenter;
pub mod remote;
pub mod runtime;
pub mod stats;
pub mod store;
pub mod sync;
pub mod tracing_setup;

pub use config::{RetryPolicy, SyncConfig};
pub use error::{AuthError, DecodeError, SubscriptionError, SyncError};
pub use events::SyncUpdate;
pub use models::{Message, MessagePayload, UserProfile};
pub use presenter::Presenter;
pub use remote::{AuthProvider, MemoryStore, RemoteStore, StorePath};
pub use runtime::{SyncEngine, SyncHandle};
pub use stats::{SharedSyncStats, SyncStats};
pub use store::ConversationIndex;
