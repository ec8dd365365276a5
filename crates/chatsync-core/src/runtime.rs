use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::error::{SubscriptionError, SyncError};
use crate::events::SyncUpdate;
use crate::models::{Message, UserProfile};
use crate::remote::{AuthProvider, RemoteStore, StorePath};
use crate::stats::SharedSyncStats;
use crate::sync::{SyncCommand, SyncWorker};

/// Cheap, cloneable entry point for driving the sync worker.
#[derive(Clone)]
pub struct SyncHandle {
    command_tx: UnboundedSender<SyncCommand>,
    store: Arc<dyn RemoteStore>,
    fetch_timeout: Duration,
}

impl SyncHandle {
    pub fn send(&self, command: SyncCommand) -> Result<(), SyncError> {
        self.command_tx
            .send(command)
            .map_err(|_| SyncError::WorkerStopped)
    }

    /// Start (or restart) syncing for `user_id`. Any previous session is
    /// cleared first.
    pub fn login(&self, user_id: impl Into<String>) -> Result<(), SyncError> {
        self.send(SyncCommand::Login {
            user_id: user_id.into(),
        })
    }

    /// Clear the session and sign out. Local state is cleared and
    /// `SignedOut` is emitted even when the sign-out call fails; that failure
    /// is still returned here.
    pub async fn logout(&self) -> Result<(), SyncError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(SyncCommand::Logout {
            response_tx: Some(response_tx),
        })?;
        response_rx.await.map_err(|_| SyncError::WorkerStopped)??;
        Ok(())
    }

    /// Re-check the auth service, as on app foreground.
    pub fn resume(&self) -> Result<(), SyncError> {
        self.send(SyncCommand::Resume)
    }

    /// Request a debounced rebuild of the conversation list.
    pub fn refresh(&self) -> Result<(), SyncError> {
        self.send(SyncCommand::Refresh)
    }

    /// Sorted copy of the current index, regardless of pending debounce.
    pub async fn snapshot(&self) -> Result<Vec<Message>, SyncError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(SyncCommand::Snapshot { response_tx })?;
        response_rx.await.map_err(|_| SyncError::WorkerStopped)
    }

    /// One-shot read of `users/<user_id>`, e.g. when a row is selected.
    pub async fn fetch_profile(&self, user_id: &str) -> Result<UserProfile, SyncError> {
        let path = StorePath::user(user_id);
        let mut stream = self.store.subscribe_value(&path)?;

        let first = tokio::time::timeout(self.fetch_timeout, stream.next())
            .await
            .map_err(|_| {
                warn!(%path, "profile fetch timed out");
                SyncError::Timeout { path: path.clone() }
            })?;

        match first {
            Some(Ok(raw)) => Ok(UserProfile::from_value(user_id, &raw)?),
            Some(Err(e)) => Err(e.into()),
            None => Err(SubscriptionError::Cancelled { path }.into()),
        }
    }
}

/// Owns the worker task and the update receiver for the presentation layer.
pub struct SyncEngine {
    handle: SyncHandle,
    updates: Option<UnboundedReceiver<SyncUpdate>>,
    worker_handle: Option<JoinHandle<()>>,
    stats: SharedSyncStats,
}

impl SyncEngine {
    /// Spawn the sync worker. Must be called inside a tokio runtime.
    pub fn start(
        store: Arc<dyn RemoteStore>,
        auth: Arc<dyn AuthProvider>,
        config: SyncConfig,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let stats = SharedSyncStats::new();

        let worker = SyncWorker::new(
            store.clone(),
            auth,
            &config,
            command_rx,
            update_tx,
            stats.clone(),
        );
        let worker_handle = tokio::spawn(worker.run());

        Self {
            handle: SyncHandle {
                command_tx,
                store,
                fetch_timeout: config.fetch_timeout(),
            },
            updates: Some(update_rx),
            worker_handle: Some(worker_handle),
            stats,
        }
    }

    pub fn handle(&self) -> SyncHandle {
        self.handle.clone()
    }

    /// The update stream can only be taken once.
    pub fn take_updates(&mut self) -> Option<UnboundedReceiver<SyncUpdate>> {
        self.updates.take()
    }

    pub fn stats(&self) -> SharedSyncStats {
        self.stats.clone()
    }

    /// Stop the worker and wait for it to release its session.
    pub async fn shutdown(&mut self) {
        let _ = self.handle.send(SyncCommand::Shutdown);
        if let Some(worker_handle) = self.worker_handle.take() {
            if let Err(e) = worker_handle.await {
                warn!(error = %e, "sync worker ended abnormally");
            }
        }
        debug!("sync engine shut down");
    }
}
