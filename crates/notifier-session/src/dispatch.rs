use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use notifier_types::{CloseReason, NotificationEvent};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::registry::ListenerRegistry;

/// Resolves daemon signals against the [`ListenerRegistry`] and fires the
/// matching callbacks.
///
/// Registry state is consumed before a callback runs, so a panicking callback
/// leaves the registry consistent.
pub(crate) struct Dispatcher {
    registry: Arc<ListenerRegistry>,
}

impl Dispatcher {
    pub(crate) fn new(registry: Arc<ListenerRegistry>) -> Self {
        Self { registry }
    }

    /// Consumes events until every sender is dropped.
    pub(crate) async fn run(self, mut events: mpsc::Receiver<NotificationEvent>) {
        while let Some(event) = events.recv().await {
            self.dispatch(event).await;
        }
        debug!("notification event channel closed; dispatcher stopping");
    }

    pub(crate) async fn dispatch(&self, event: NotificationEvent) {
        match event {
            NotificationEvent::Closed { id, reason } => {
                self.notification_closed(id, CloseReason::from_code(reason))
                    .await;
            }
            NotificationEvent::ActionInvoked { id, action_key } => {
                self.action_invoked(id, &action_key).await;
            }
        }
    }

    async fn notification_closed(&self, id: u32, reason: CloseReason) {
        let Some(callback) = self.registry.pop_closed(id).await else {
            debug!(id, ?reason, "dropping closed signal for unknown notification");
            return;
        };

        debug!(id, ?reason, "dispatching closed callback");
        if catch_unwind(AssertUnwindSafe(|| callback(id, reason))).is_err() {
            warn!(id, ?reason, "closed callback panicked");
        }
    }

    async fn action_invoked(&self, id: u32, action_key: &str) {
        let Some(mut actions) = self.registry.take_actions(id).await else {
            debug!(id, action_key, "dropping action signal for unknown notification");
            return;
        };

        let Some(callback) = actions.remove(action_key) else {
            debug!(id, action_key, "no callback registered for action");
            return;
        };

        debug!(id, action_key, "dispatching action callback");
        if catch_unwind(AssertUnwindSafe(|| callback(id))).is_err() {
            warn!(id, action_key, "action callback panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            Mutex as StdMutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use super::*;
    use crate::notification::{ActionCallback, ClosedCallback};

    type ClosedLog = Arc<StdMutex<Vec<(&'static str, u32, CloseReason)>>>;

    fn closed_recorder(log: &ClosedLog, name: &'static str) -> ClosedCallback {
        let log = Arc::clone(log);
        Arc::new(move |id: u32, reason: CloseReason| log.lock().unwrap().push((name, id, reason)))
    }

    fn action_counter(counter: &Arc<AtomicUsize>) -> ActionCallback {
        let counter = Arc::clone(counter);
        Arc::new(move |_: u32| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn setup() -> (Arc<ListenerRegistry>, Dispatcher) {
        let registry = Arc::new(ListenerRegistry::default());
        let dispatcher = Dispatcher::new(Arc::clone(&registry));
        (registry, dispatcher)
    }

    fn closed(id: u32, reason: u32) -> NotificationEvent {
        NotificationEvent::Closed { id, reason }
    }

    fn action(id: u32, key: &str) -> NotificationEvent {
        NotificationEvent::ActionInvoked {
            id,
            action_key: key.to_string(),
        }
    }

    #[tokio::test]
    async fn reused_id_resolves_most_recent_send_first() {
        let (registry, dispatcher) = setup();
        let log = ClosedLog::default();

        registry
            .register(5, closed_recorder(&log, "a"), HashMap::new())
            .await;
        registry
            .register(5, closed_recorder(&log, "b"), HashMap::new())
            .await;

        dispatcher.dispatch(closed(5, 1)).await;
        dispatcher.dispatch(closed(5, 2)).await;

        assert_eq!(
            *log.lock().unwrap(),
            [
                ("b", 5, CloseReason::Expired),
                ("a", 5, CloseReason::Dismissed)
            ]
        );
    }

    #[tokio::test]
    async fn unknown_reason_code_resolves_to_unknown() {
        let (registry, dispatcher) = setup();
        let log = ClosedLog::default();

        registry
            .register(9, closed_recorder(&log, "a"), HashMap::new())
            .await;
        dispatcher.dispatch(closed(9, 99)).await;

        assert_eq!(*log.lock().unwrap(), [("a", 9, CloseReason::Unknown)]);
    }

    #[tokio::test]
    async fn closed_signal_for_unregistered_id_is_dropped() {
        let (registry, dispatcher) = setup();
        let log = ClosedLog::default();

        registry
            .register(1, closed_recorder(&log, "a"), HashMap::new())
            .await;
        dispatcher.dispatch(closed(2, 3)).await;
        dispatcher.dispatch(closed(1, 3)).await;
        dispatcher.dispatch(closed(1, 3)).await;

        assert_eq!(*log.lock().unwrap(), [("a", 1, CloseReason::Closed)]);
    }

    #[tokio::test]
    async fn action_signal_fires_only_matching_callback_once() {
        let (registry, dispatcher) = setup();
        let log = ClosedLog::default();
        let view = Arc::new(AtomicUsize::new(0));
        let close = Arc::new(AtomicUsize::new(0));

        let mut actions = HashMap::new();
        actions.insert("view".to_string(), action_counter(&view));
        actions.insert("close".to_string(), action_counter(&close));
        registry
            .register(4, closed_recorder(&log, "a"), actions)
            .await;

        dispatcher.dispatch(action(4, "view")).await;
        dispatcher.dispatch(action(4, "close")).await;
        dispatcher.dispatch(action(4, "view")).await;

        assert_eq!(view.load(Ordering::SeqCst), 1);
        assert_eq!(close.load(Ordering::SeqCst), 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn action_without_callback_still_consumes_map() {
        let (registry, dispatcher) = setup();
        let log = ClosedLog::default();
        let view = Arc::new(AtomicUsize::new(0));

        let mut actions = HashMap::new();
        actions.insert("view".to_string(), action_counter(&view));
        registry
            .register(4, closed_recorder(&log, "a"), actions)
            .await;

        dispatcher.dispatch(action(4, "snooze")).await;
        dispatcher.dispatch(action(4, "view")).await;

        assert_eq!(view.load(Ordering::SeqCst), 0);
        assert!(registry.take_actions(4).await.is_none());
    }

    fn exploding(_: u32, _: CloseReason) {
        panic!("closed callback failure");
    }

    #[tokio::test]
    async fn panicking_callback_leaves_registry_consistent() {
        let (registry, dispatcher) = setup();
        let log = ClosedLog::default();

        registry
            .register(6, closed_recorder(&log, "a"), HashMap::new())
            .await;
        registry
            .register(6, Arc::new(exploding), HashMap::new())
            .await;

        dispatcher.dispatch(closed(6, 2)).await;
        assert_eq!(registry.pending_closed(6).await, 1);

        dispatcher.dispatch(closed(6, 2)).await;
        assert_eq!(*log.lock().unwrap(), [("a", 6, CloseReason::Dismissed)]);
        assert_eq!(registry.pending_closed(6).await, 0);
    }

    #[tokio::test]
    async fn run_drains_channel_until_senders_drop() {
        let (registry, dispatcher) = setup();
        let log = ClosedLog::default();
        registry
            .register(8, closed_recorder(&log, "a"), HashMap::new())
            .await;

        let (tx, rx) = mpsc::channel(4);
        let task = tokio::spawn(dispatcher.run(rx));
        tx.send(closed(8, 1)).await.unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(*log.lock().unwrap(), [("a", 8, CloseReason::Expired)]);
    }
}
