use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// Trailing-edge debouncer with unbounded deadline extension.
///
/// Each `signal` aborts the pending timer and schedules a new one `delay`
/// later, so a steady stream of signals keeps postponing the deadline. When a
/// timer runs out it sends its generation on the channel returned by `new`;
/// the owner must confirm it with `take_if_current` before acting, which
/// rejects a timer that fired just before being superseded.
pub struct Debouncer {
    delay: Duration,
    generation: u64,
    pending: Option<JoinHandle<()>>,
    fired_tx: UnboundedSender<u64>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> (Self, UnboundedReceiver<u64>) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let debouncer = Self {
            delay,
            generation: 0,
            pending: None,
            fired_tx,
        };
        (debouncer, fired_rx)
    }

    /// Restart the countdown. Must be called inside a tokio runtime.
    pub fn signal(&mut self) {
        self.cancel();
        self.generation += 1;

        let generation = self.generation;
        let delay = self.delay;
        let fired_tx = self.fired_tx.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = fired_tx.send(generation);
        }));
    }

    /// Drop the pending timer, if any.
    pub fn cancel(&mut self) {
        if let Some(timer) = self.pending.take() {
            timer.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// True exactly once for the timer scheduled by the latest `signal`,
    /// returning the debouncer to idle.
    pub fn take_if_current(&mut self, generation: u64) -> bool {
        if self.pending.is_some() && generation == self.generation {
            self.pending = None;
            true
        } else {
            false
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
