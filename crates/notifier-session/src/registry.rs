use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::debug;

use crate::notification::{ActionCallback, ClosedCallback};

/// Per-id callback bookkeeping shared by `send` and the dispatcher.
///
/// Closed callbacks form a stack per id: the daemon may reuse an id once the
/// earlier notification is gone, and the most recent send is resolved first.
/// Action maps are one-shot and replaced on every send.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    closed: Mutex<HashMap<u32, Vec<ClosedCallback>>>,
    actions: Mutex<HashMap<u32, HashMap<String, ActionCallback>>>,
}

impl ListenerRegistry {
    /// Records the callbacks of a freshly sent notification.
    ///
    /// Both tracks are locked together so a dispatch never observes one
    /// without the other.
    pub(crate) async fn register(
        &self,
        id: u32,
        closed_callback: ClosedCallback,
        action_callbacks: HashMap<String, ActionCallback>,
    ) {
        let mut closed = self.closed.lock().await;
        let mut actions = self.actions.lock().await;

        let stack = closed.entry(id).or_default();
        stack.push(closed_callback);
        let pending = stack.len();

        if actions.insert(id, action_callbacks).is_some() {
            debug!(id, "replaced stale action listeners");
        }
        debug!(id, pending, "registered notification listeners");
    }

    /// Pops the most recently registered closed callback for `id`.
    ///
    /// Once the last pending send for `id` is resolved the notification is
    /// gone, so its entry and any unused action map are dropped.
    pub(crate) async fn pop_closed(&self, id: u32) -> Option<ClosedCallback> {
        let mut closed = self.closed.lock().await;
        let stack = closed.get_mut(&id)?;
        let callback = stack.pop();
        if stack.is_empty() {
            closed.remove(&id);
            if self.actions.lock().await.remove(&id).is_some() {
                debug!(id, "dropped unused action listeners");
            }
        }
        callback
    }

    /// Removes and returns the whole action map for `id`.
    pub(crate) async fn take_actions(&self, id: u32) -> Option<HashMap<String, ActionCallback>> {
        self.actions.lock().await.remove(&id)
    }

    #[cfg(test)]
    pub(crate) async fn is_empty(&self) -> bool {
        self.closed.lock().await.is_empty() && self.actions.lock().await.is_empty()
    }

    #[cfg(test)]
    pub(crate) async fn pending_closed(&self, id: u32) -> usize {
        self.closed.lock().await.get(&id).map_or(0, Vec::len)
    }
}
