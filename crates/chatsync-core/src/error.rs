use crate::remote::StorePath;

/// A record from the store could not be turned into a model.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("{entity} {id}: record is not an object")]
    NotAnObject { entity: &'static str, id: String },

    #[error("{entity} {id}: {source}")]
    Schema {
        entity: &'static str,
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{entity} {id}: field `{field}` is empty")]
    EmptyField {
        entity: &'static str,
        id: String,
        field: &'static str,
    },

    #[error("message {id}: no text, image or video payload")]
    MissingPayload { id: String },
}

/// A standing subscription failed or could not be opened.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionError {
    #[error("subscription to {path} was cancelled by the store")]
    Cancelled { path: StorePath },

    #[error("permission denied for {path}")]
    PermissionDenied { path: StorePath },

    #[error("disconnected from {path}: {reason}")]
    Disconnected { path: StorePath, reason: String },
}

impl SubscriptionError {
    pub fn path(&self) -> &StorePath {
        match self {
            SubscriptionError::Cancelled { path }
            | SubscriptionError::PermissionDenied { path }
            | SubscriptionError::Disconnected { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Sign-out failed: {0}")]
    SignOutFailed(String),
}

/// Errors returned by `SyncHandle` operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Sync worker is not running")]
    WorkerStopped,

    #[error("Timed out waiting for {path}")]
    Timeout { path: StorePath },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}
