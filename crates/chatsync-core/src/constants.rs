//! Application-wide constants
//!
//! Centralized location for store paths and timing defaults
//! that are used across multiple modules.

/// Quiet period before a burst of resolved messages is materialized
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Upper bound on a single profile lookup
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;

// Subscription retry defaults
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_RETRY_INITIAL_BACKOFF_MS: u64 = 250;
pub const DEFAULT_RETRY_MAX_BACKOFF_MS: u64 = 8_000;

/// Environment variable that enables the debug log file
pub const LOG_FILE_ENV: &str = "CHATSYNC_LOG_FILE";

// Top-level nodes of the realtime store
pub mod paths {
    /// `user-messages/<user>/<partner>/<message id>` fan-out index
    pub const USER_MESSAGES: &str = "user-messages";
    /// `messages/<message id>` full message records
    pub const MESSAGES: &str = "messages";
    /// `users/<user id>` profile records
    pub const USERS: &str = "users";
}
