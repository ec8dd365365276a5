//! Standing subscriptions to the remote store.
//!
//! Each subscription runs in its own task that forwards items to the sync
//! worker as `RemoteEvent`s and resubscribes with backoff when the stream
//! fails. The task lives exactly as long as its `SubscriptionHandle`.

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::worker::RemoteEvent;
use crate::config::RetryPolicy;
use crate::error::SubscriptionError;
use crate::remote::StorePath;
use crate::stats::SharedSyncStats;

/// Owns one running subscription. Dropping it stops the subscription.
pub struct SubscriptionHandle {
    path: StorePath,
    task: JoinHandle<()>,
    stats: SharedSyncStats,
}

impl SubscriptionHandle {
    pub(crate) fn new(path: StorePath, task: JoinHandle<()>, stats: SharedSyncStats) -> Self {
        stats.subscription_opened();
        Self { path, task, stats }
    }

    pub fn path(&self) -> &StorePath {
        &self.path
    }

    /// The forwarding task has ended (stream closed or retries exhausted).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.task.abort();
        self.stats.subscription_closed();
    }
}

/// Shared plumbing handed to every subscription task.
#[derive(Clone)]
pub(crate) struct WatchContext {
    pub events: UnboundedSender<RemoteEvent>,
    pub retry: RetryPolicy,
    pub stats: SharedSyncStats,
}

/// Open `path` with `open` and forward every item through `map`.
///
/// A stream error (or a failed open) is counted and retried per the retry
/// policy; the backoff restarts once an item gets through. When retries run
/// out the worker is told with `RemoteEvent::SubscriptionLost`.
pub(crate) fn watch<T, O, M>(
    path: StorePath,
    epoch: u64,
    ctx: &WatchContext,
    open: O,
    map: M,
) -> SubscriptionHandle
where
    T: Send + 'static,
    O: Fn(&StorePath) -> Result<BoxStream<'static, Result<T, SubscriptionError>>, SubscriptionError>
        + Send
        + 'static,
    M: Fn(T) -> RemoteEvent + Send + 'static,
{
    let ctx = ctx.clone();
    let handle_stats = ctx.stats.clone();
    let task_path = path.clone();

    let task = tokio::spawn(async move {
        let path = task_path;
        let mut attempt = 0u32;

        loop {
            let failure = match open(&path) {
                Ok(mut stream) => {
                    let mut failure = None;
                    while let Some(item) = stream.next().await {
                        match item {
                            Ok(value) => {
                                attempt = 0;
                                if ctx.events.send(map(value)).is_err() {
                                    // Worker is gone
                                    return;
                                }
                            }
                            Err(e) => {
                                failure = Some(e);
                                break;
                            }
                        }
                    }
                    match failure {
                        Some(e) => e,
                        None => {
                            debug!(%path, "subscription stream ended");
                            return;
                        }
                    }
                }
                Err(e) => e,
            };

            ctx.stats.record_subscription_error();
            match ctx.retry.backoff(attempt) {
                Some(delay) => {
                    warn!(
                        %path,
                        error = %failure,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "subscription failed, retrying"
                    );
                    ctx.stats.record_retry();
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
                None => {
                    error!(%path, error = %failure, "subscription lost after {} retries", attempt);
                    ctx.stats.record_lost();
                    let _ = ctx.events.send(RemoteEvent::SubscriptionLost { epoch, path });
                    return;
                }
            }
        }
    });

    SubscriptionHandle::new(path, task, handle_stats)
}
