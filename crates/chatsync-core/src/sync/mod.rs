//! The sync pipeline: subscriptions feed a single worker that owns the
//! conversation index and materializes it through a debouncer.

pub mod debounce;
pub mod session;
pub mod subscriptions;
pub mod worker;

pub use debounce::Debouncer;
pub use session::Session;
pub use subscriptions::SubscriptionHandle;
pub use worker::{RemoteEvent, SyncCommand, SyncWorker};
