use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::debounce::Debouncer;
use super::session::Session;
use super::subscriptions::{watch, WatchContext};
use crate::config::SyncConfig;
use crate::error::AuthError;
use crate::events::SyncUpdate;
use crate::models::Message;
use crate::remote::{AuthProvider, ChildEvent, RemoteStore, StorePath};
use crate::stats::SharedSyncStats;
use crate::store::ConversationIndex;

/// Requests from `SyncHandle`s.
pub enum SyncCommand {
    Login {
        user_id: String,
    },
    Logout {
        /// Receives the sign-out outcome once the session is cleared
        response_tx: Option<oneshot::Sender<Result<(), AuthError>>>,
    },
    /// Log in whoever the auth service reports, or run the logout transition
    Resume,
    /// Schedule a rebuild through the debouncer
    Refresh,
    /// Current index contents, sorted as a materialization would be
    Snapshot {
        response_tx: oneshot::Sender<Vec<Message>>,
    },
    Shutdown,
}

/// Items forwarded by subscription tasks, tagged with the session epoch
/// that opened the subscription.
#[derive(Debug)]
pub enum RemoteEvent {
    /// A conversation partner appeared under `user-messages/<user>`
    ThreadAdded { epoch: u64, partner_id: String },
    /// A message id appeared under a thread
    MessageIdAdded { epoch: u64, message_id: String },
    /// A message record was fetched or changed
    MessageValue {
        epoch: u64,
        message_id: String,
        raw: Value,
    },
    /// A subscription gave up after exhausting its retries
    SubscriptionLost { epoch: u64, path: StorePath },
}

impl RemoteEvent {
    fn epoch(&self) -> u64 {
        match self {
            RemoteEvent::ThreadAdded { epoch, .. }
            | RemoteEvent::MessageIdAdded { epoch, .. }
            | RemoteEvent::MessageValue { epoch, .. }
            | RemoteEvent::SubscriptionLost { epoch, .. } => *epoch,
        }
    }
}

/// Single owner of the conversation index, the session and the debouncer.
/// Everything that mutates them arrives as a message on one of its channels.
pub struct SyncWorker {
    store: Arc<dyn RemoteStore>,
    auth: Arc<dyn AuthProvider>,
    index: ConversationIndex,
    session: Option<Session>,
    /// Bumped whenever a session ends; events from older epochs are stale
    epoch: u64,
    debouncer: Debouncer,
    debounce_rx: UnboundedReceiver<u64>,
    command_rx: UnboundedReceiver<SyncCommand>,
    event_rx: UnboundedReceiver<RemoteEvent>,
    watch_ctx: WatchContext,
    update_tx: UnboundedSender<SyncUpdate>,
    stats: SharedSyncStats,
}

impl SyncWorker {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        auth: Arc<dyn AuthProvider>,
        config: &SyncConfig,
        command_rx: UnboundedReceiver<SyncCommand>,
        update_tx: UnboundedSender<SyncUpdate>,
        stats: SharedSyncStats,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (debouncer, debounce_rx) = Debouncer::new(config.debounce());
        let watch_ctx = WatchContext {
            events: event_tx,
            retry: config.retry,
            stats: stats.clone(),
        };

        Self {
            store,
            auth,
            index: ConversationIndex::new(),
            session: None,
            epoch: 0,
            debouncer,
            debounce_rx,
            command_rx,
            event_rx,
            watch_ctx,
            update_tx,
            stats,
        }
    }

    pub async fn run(mut self) {
        debug!("sync worker started");

        loop {
            tokio::select! {
                command = self.command_rx.recv() => {
                    let keep_running = match command {
                        Some(command) => self.handle_command(command),
                        None => false,
                    };
                    if !keep_running {
                        break;
                    }
                }
                Some(event) = self.event_rx.recv() => self.handle_remote_event(event),
                Some(generation) = self.debounce_rx.recv() => self.handle_debounce_elapsed(generation),
            }
        }

        self.end_session();
        debug!("sync worker stopped");
    }

    fn handle_command(&mut self, command: SyncCommand) -> bool {
        match command {
            SyncCommand::Login { user_id } => self.handle_login(user_id),
            SyncCommand::Logout { response_tx } => {
                let result = self.handle_logout();
                if let Some(tx) = response_tx {
                    let _ = tx.send(result);
                }
            }
            SyncCommand::Resume => self.handle_resume(),
            SyncCommand::Refresh => {
                debug!("refresh requested");
                self.debouncer.signal();
            }
            SyncCommand::Snapshot { response_tx } => {
                let _ = response_tx.send(self.index.sorted());
            }
            SyncCommand::Shutdown => return false,
        }
        true
    }

    // ===== Session controller =====

    fn handle_login(&mut self, user_id: String) {
        info!(user = %user_id, "starting conversation sync");
        self.end_session();
        self.emit(SyncUpdate::SessionCleared);
        self.session = Some(Session::new(user_id, self.epoch));
        self.subscribe_user();
    }

    /// Clears local state first; a failed sign-out is logged and returned but
    /// does not stop the transition.
    fn handle_logout(&mut self) -> Result<(), AuthError> {
        info!("logging out");
        self.end_session();

        let result = self.auth.sign_out();
        if let Err(e) = &result {
            self.stats.record_auth_error();
            warn!(error = %e, "sign-out failed, continuing logout");
        }

        self.emit(SyncUpdate::SessionCleared);
        self.emit(SyncUpdate::SignedOut);
        result
    }

    fn handle_resume(&mut self) {
        match self.auth.current_user_id() {
            Some(user_id) => self.handle_login(user_id),
            None => {
                info!("no signed-in user on resume");
                let _ = self.handle_logout();
            }
        }
    }

    fn end_session(&mut self) {
        self.debouncer.cancel();
        self.index.clear();
        self.epoch += 1;
        // Dropping the session stops its subscriptions.
        self.session = None;
    }

    // ===== Subscription manager =====

    /// Watch the user's thread feed; each partner id becomes `ThreadAdded`.
    fn subscribe_user(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let path = StorePath::user_threads(session.user_id());
        let epoch = session.epoch();
        let store = self.store.clone();

        let handle = watch(
            path,
            epoch,
            &self.watch_ctx,
            move |path| store.subscribe_child_added(path),
            move |child: ChildEvent| RemoteEvent::ThreadAdded {
                epoch,
                partner_id: child.key,
            },
        );
        session.hold(handle);
    }

    /// Watch the message ids of one thread, unless already watching it.
    fn subscribe_thread(&mut self, partner_id: &str) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let path = StorePath::thread_messages(session.user_id(), partner_id);
        if session.is_watching(&path) {
            debug!(%path, "thread already watched");
            return;
        }
        let epoch = session.epoch();
        let store = self.store.clone();

        let handle = watch(
            path,
            epoch,
            &self.watch_ctx,
            move |path| store.subscribe_child_added(path),
            move |child: ChildEvent| RemoteEvent::MessageIdAdded {
                epoch,
                message_id: child.key,
            },
        );
        session.hold(handle);
    }

    // ===== Message resolver =====

    /// Watch a message record. The subscription stays open so edits re-fire.
    fn resolve(&mut self, message_id: String) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let path = StorePath::message(&message_id);
        if session.is_watching(&path) {
            debug!(%path, "message already resolving");
            return;
        }
        let epoch = session.epoch();
        let store = self.store.clone();

        let handle = watch(
            path,
            epoch,
            &self.watch_ctx,
            move |path| store.subscribe_value(path),
            move |raw: Value| RemoteEvent::MessageValue {
                epoch,
                message_id: message_id.clone(),
                raw,
            },
        );
        session.hold(handle);
    }

    fn apply_message(&mut self, message_id: &str, raw: &Value) {
        let Some(session) = self.session.as_ref() else {
            return;
        };

        let message = match Message::from_value(message_id, raw) {
            Ok(message) => message,
            Err(e) => {
                self.stats.record_decode_error();
                warn!(error = %e, "dropping undecodable message");
                return;
            }
        };

        let partner_id = message.chat_partner_id(session.user_id()).to_string();
        debug!(
            message_id,
            partner = %partner_id,
            timestamp = message.timestamp,
            "resolved message"
        );
        self.index.upsert(partner_id, message);
        self.stats.record_resolved();
        self.debouncer.signal();
    }

    fn handle_remote_event(&mut self, event: RemoteEvent) {
        if event.epoch() != self.epoch || self.session.is_none() {
            debug!(?event, current_epoch = self.epoch, "dropping stale event");
            return;
        }

        match event {
            RemoteEvent::ThreadAdded { partner_id, .. } => {
                self.stats.record_thread();
                debug!(partner = %partner_id, "thread observed");
                self.subscribe_thread(&partner_id);
            }
            RemoteEvent::MessageIdAdded { message_id, .. } => {
                self.stats.record_message_id();
                self.resolve(message_id);
            }
            RemoteEvent::MessageValue {
                message_id, raw, ..
            } => self.apply_message(&message_id, &raw),
            RemoteEvent::SubscriptionLost { path, .. } => {
                // Forgetting the path lets a later observation reopen it.
                if let Some(session) = self.session.as_mut() {
                    session.release(&path);
                }
            }
        }
    }

    // ===== Debounced materializer =====

    fn handle_debounce_elapsed(&mut self, generation: u64) {
        if !self.debouncer.take_if_current(generation) {
            debug!(generation, "ignoring superseded timer");
            return;
        }

        let list = self.index.materialize().to_vec();
        self.stats.record_materialization();
        debug!(conversations = list.len(), "materialized conversation list");
        self.emit(SyncUpdate::ConversationListChanged(list));
    }

    fn emit(&self, update: SyncUpdate) {
        if self.update_tx.send(update).is_err() {
            debug!("presentation layer dropped its update receiver");
        }
    }
}
