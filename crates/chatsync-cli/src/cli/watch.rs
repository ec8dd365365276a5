use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chatsync_core::presenter::dispatch;
use chatsync_core::{
    Message, MemoryStore, Presenter, SyncConfig, SyncEngine, SyncHandle, SyncUpdate,
};
use chrono::{Local, TimeZone};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::fixture::Fixture;

pub struct WatchOptions {
    pub fixture: PathBuf,
    pub user: String,
    pub for_ms: u64,
    pub logout_after_ms: Option<u64>,
}

/// `hh:mm:ss AM` in `tz`, or the raw number if it is out of range.
pub fn format_time<Tz>(timestamp: i64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    tz.timestamp_opt(timestamp, 0)
        .single()
        .map(|dt| dt.format("%I:%M:%S %p").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

/// Prints each materialized list as a block of rows.
pub struct TerminalPresenter<W: Write> {
    out: W,
    current_user: String,
    names: HashMap<String, String>,
    /// Last list shown, kept so rows can be redrawn when a name arrives
    shown: Vec<Message>,
}

impl<W: Write> TerminalPresenter<W> {
    pub fn new(out: W, current_user: impl Into<String>) -> Self {
        Self {
            out,
            current_user: current_user.into(),
            names: HashMap::new(),
            shown: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Whether `user_id` is a partner in the list currently shown.
    pub fn is_showing(&self, user_id: &str) -> bool {
        self.shown
            .iter()
            .any(|m| m.chat_partner_id(&self.current_user) == user_id)
    }

    pub fn rerender(&mut self) {
        let shown = std::mem::take(&mut self.shown);
        self.on_conversation_list_changed(&shown);
    }

    pub fn show_signed_in_user(&mut self, name: &str) {
        self.write_line(&format!("--- signed in as {}", name));
    }

    pub fn remember_name(&mut self, user_id: &str, name: &str) {
        self.names.insert(user_id.to_string(), name.to_string());
    }

    fn display_name<'a>(&'a self, user_id: &'a str) -> &'a str {
        self.names.get(user_id).map(String::as_str).unwrap_or(user_id)
    }

    pub fn render_row(&self, message: &Message) -> String {
        let partner = message.chat_partner_id(&self.current_user);
        format!(
            "{:<16} {:>11}  {}",
            self.display_name(partner),
            format_time(message.timestamp, &Local),
            message.preview_text()
        )
    }

    fn write_line(&mut self, line: &str) {
        if let Err(e) = writeln!(self.out, "{}", line) {
            warn!(error = %e, "failed to write to terminal");
        }
    }
}

impl<W: Write> Presenter for TerminalPresenter<W> {
    fn on_conversation_list_changed(&mut self, messages: &[Message]) {
        let rows: Vec<String> = messages.iter().map(|m| self.render_row(m)).collect();
        self.shown = messages.to_vec();
        self.write_line(&format!("--- {} conversation(s)", rows.len()));
        for row in rows {
            self.write_line(&row);
        }
    }

    fn on_session_cleared(&mut self) {
        self.shown.clear();
        self.write_line("--- cleared");
    }

    fn on_signed_out(&mut self) {
        self.write_line("--- signed out");
    }
}

/// Outcome of a background profile lookup: the user id and, if found, the
/// name to show for it.
type NameLookup = (String, Option<String>);

fn spawn_lookup(
    handle: &SyncHandle,
    user_id: String,
    names_tx: &mpsc::UnboundedSender<NameLookup>,
) -> JoinHandle<()> {
    let handle = handle.clone();
    let names_tx = names_tx.clone();
    tokio::spawn(async move {
        let name = match handle.fetch_profile(&user_id).await {
            Ok(profile) => Some(profile.display_name().to_string()),
            Err(e) => {
                warn!(user = %user_id, error = %e, "profile lookup failed");
                None
            }
        };
        let _ = names_tx.send((user_id, name));
    })
}

pub async fn run_watch(config: SyncConfig, options: WatchOptions) -> Result<()> {
    watch_to(config, options, std::io::stdout()).await?;
    Ok(())
}

/// Run a watch session, printing to `out`. Profile lookups run in the
/// background so a slow or missing profile never delays rendering or the
/// `for_ms` deadline; rows show the raw id until the name arrives.
pub async fn watch_to<W: Write>(config: SyncConfig, options: WatchOptions, out: W) -> Result<W> {
    let fixture = Fixture::load(&options.fixture)?;
    let store = Arc::new(MemoryStore::new());
    let delayed = fixture.seed(&store)?;
    store.sign_in(&options.user);

    let mut engine = SyncEngine::start(store.clone(), store.clone(), config);
    let handle = engine.handle();
    let mut updates = engine
        .take_updates()
        .context("sync engine update stream already taken")?;

    info!(user = %options.user, "watching conversations");
    handle.resume()?;

    let logout = options.logout_after_ms.map(|ms| {
        let handle = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            if let Err(e) = handle.logout().await {
                warn!(error = %e, "logout reported an error");
            }
        })
    });

    let (names_tx, mut names_rx) = mpsc::unbounded_channel::<NameLookup>();
    let mut requested: HashSet<String> = HashSet::new();
    // Signed-in user's own profile, for the header line.
    requested.insert(options.user.clone());
    let mut lookups = vec![spawn_lookup(&handle, options.user.clone(), &names_tx)];

    let mut presenter = TerminalPresenter::new(out, options.user.clone());
    let deadline = tokio::time::sleep(Duration::from_millis(options.for_ms));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(update) = update else { break };
                if let SyncUpdate::ConversationListChanged(messages) = &update {
                    for message in messages {
                        let partner = message.chat_partner_id(&options.user);
                        if requested.insert(partner.to_string()) {
                            lookups.push(spawn_lookup(&handle, partner.to_string(), &names_tx));
                        }
                    }
                }
                dispatch(&mut presenter, &update);
            }
            Some((user_id, name)) = names_rx.recv() => {
                if user_id == options.user {
                    presenter.show_signed_in_user(name.as_deref().unwrap_or(&user_id));
                } else if let Some(name) = name {
                    presenter.remember_name(&user_id, &name);
                    if presenter.is_showing(&user_id) {
                        presenter.rerender();
                    }
                }
            }
            _ = &mut deadline => break,
        }
    }

    for lookup in lookups {
        lookup.abort();
    }
    delayed.abort();
    if let Some(logout) = logout {
        logout.abort();
    }

    let stats = engine.stats().snapshot();
    engine.shutdown().await;
    info!(
        materializations = stats.materializations,
        resolved = stats.messages_resolved,
        errors = stats.total_errors(),
        "watch finished"
    );
    Ok(presenter.into_inner())
}
