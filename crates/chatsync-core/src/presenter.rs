use tokio::sync::mpsc::UnboundedReceiver;

use crate::events::SyncUpdate;
use crate::models::Message;

/// Receiver of sync notifications on the presentation context.
///
/// Calls arrive on whichever task runs `drive`/`drain`, never on the worker,
/// so implementations may touch UI state directly.
pub trait Presenter {
    /// Replace the displayed list. `messages` is newest first.
    fn on_conversation_list_changed(&mut self, messages: &[Message]);

    /// Discard whatever is displayed.
    fn on_session_cleared(&mut self);

    fn on_signed_out(&mut self) {}
}

pub fn dispatch<P: Presenter + ?Sized>(presenter: &mut P, update: &SyncUpdate) {
    match update {
        SyncUpdate::ConversationListChanged(messages) => {
            presenter.on_conversation_list_changed(messages)
        }
        SyncUpdate::SessionCleared => presenter.on_session_cleared(),
        SyncUpdate::SignedOut => presenter.on_signed_out(),
    }
}

/// Deliver updates until the worker goes away.
pub async fn drive<P: Presenter + ?Sized>(
    updates: &mut UnboundedReceiver<SyncUpdate>,
    presenter: &mut P,
) {
    while let Some(update) = updates.recv().await {
        dispatch(presenter, &update);
    }
}

/// Deliver whatever is queued without waiting, for hosts that poll from
/// their own loop. Returns how many updates were delivered.
pub fn drain<P: Presenter + ?Sized>(
    updates: &mut UnboundedReceiver<SyncUpdate>,
    presenter: &mut P,
) -> usize {
    let mut delivered = 0;
    while let Ok(update) = updates.try_recv() {
        dispatch(presenter, &update);
        delivered += 1;
    }
    delivered
}
