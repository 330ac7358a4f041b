use std::{
    collections::HashMap,
    sync::{Arc, LazyLock},
};

use thiserror::Error;
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tracing::{debug, info};
use zbus::zvariant;

use crate::{
    dbus::{ConnectionTarget, DEFAULT_DBUS_NAME, DEFAULT_DBUS_PATH, DbusTransport},
    dispatch::Dispatcher,
    notification::{ActionCallback, ClosedCallback, Notification},
    registry::ListenerRegistry,
    transport::{HINT_IMAGE_PATH, NotifyRequest, ServerInformation, Transport, TransportError},
};

/// Stands in for a missing closed callback so every send owns a stack slot.
static IGNORE_CLOSED: LazyLock<ClosedCallback> = LazyLock::new(ignore_closed);

fn ignore_closed() -> ClosedCallback {
    Arc::new(|_, _| {})
}

/// Configuration for [`Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Bus to connect to.
    pub target: ConnectionTarget,
    /// Bus name of the notification daemon.
    pub dbus_name: String,
    /// Object path of the notification daemon.
    pub dbus_path: String,
    /// Capacity of the signal hand-off channel.
    pub channel_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            target: ConnectionTarget::Session,
            dbus_name: DEFAULT_DBUS_NAME.to_string(),
            dbus_path: DEFAULT_DBUS_PATH.to_string(),
            channel_capacity: 256,
        }
    }
}

/// Errors produced while establishing a [`Session`].
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The bus or the notification service could not be reached.
    #[error("failed to connect to notification service: {0}")]
    Unreachable(#[source] TransportError),
    /// Signal subscription failed.
    #[error("failed to subscribe to notification signals: {0}")]
    Subscribe(#[source] TransportError),
}

/// Client session with a notification daemon.
///
/// Tracks the callbacks of every sent notification and fires them when the
/// daemon reports the notification closed or one of its actions invoked.
pub struct Session<T: Transport = DbusTransport> {
    inner: Arc<Inner<T>>,
}

impl<T: Transport> Clone for Session<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<T> {
    transport: T,
    registry: Arc<ListenerRegistry>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Session<DbusTransport> {
    /// Connects to the notification daemon over D-Bus.
    pub async fn connect(cfg: SessionConfig) -> Result<Self, ConnectionError> {
        let transport = DbusTransport::connect(&cfg.target, &cfg.dbus_name, &cfg.dbus_path)
            .await
            .map_err(ConnectionError::Unreachable)?;
        Self::with_transport(transport, &cfg).await
    }
}

impl<T: Transport> Session<T> {
    /// Builds a session on top of an established transport.
    ///
    /// Signals are subscribed and the dispatcher is running before this returns.
    pub async fn with_transport(transport: T, cfg: &SessionConfig) -> Result<Self, ConnectionError> {
        let registry = Arc::new(ListenerRegistry::default());
        let (sender, receiver) = mpsc::channel(cfg.channel_capacity.max(1));

        if let Err(err) = transport.subscribe(sender).await {
            transport.disconnect().await;
            return Err(ConnectionError::Subscribe(err));
        }

        let dispatcher = tokio::spawn(Dispatcher::new(Arc::clone(&registry)).run(receiver));
        info!("notification session ready");

        Ok(Self {
            inner: Arc::new(Inner {
                transport,
                registry,
                dispatcher: Mutex::new(Some(dispatcher)),
            }),
        })
    }

    /// Returns the capabilities advertised by the daemon.
    pub async fn capabilities(&self) -> Result<Vec<String>, TransportError> {
        self.inner.transport.capabilities().await
    }

    /// Returns the daemon's `GetServerInformation` reply.
    pub async fn server_information(&self) -> Result<ServerInformation, TransportError> {
        self.inner.transport.server_information().await
    }

    /// Sends a notification and registers its callbacks under the returned id.
    pub async fn send(&self, notification: &Notification) -> Result<u32, TransportError> {
        let closed_callback = notification
            .closed_callback()
            .map_or_else(|| Arc::clone(&*IGNORE_CLOSED), Arc::clone);

        let action_callbacks: HashMap<String, ActionCallback> = notification
            .actions()
            .iter()
            .filter_map(|action| {
                action
                    .callback()
                    .map(|callback| (action.id().to_owned(), Arc::clone(callback)))
            })
            .collect();

        let mut hints = HashMap::new();
        if let Some(path) = notification.image_path() {
            hints.insert(
                HINT_IMAGE_PATH.to_string(),
                zvariant::OwnedValue::from(zvariant::Str::from(path.to_owned())),
            );
        }

        let request = NotifyRequest {
            app_name: notification.app_name().to_owned(),
            replaces_id: 0,
            app_icon: notification.icon().to_owned(),
            summary: notification.title().to_owned(),
            body: notification.body().to_owned(),
            actions: notification.flat_actions(),
            hints,
            expire_timeout: notification.timeout_ms(),
        };

        debug!(
            app = %request.app_name,
            summary = %request.summary,
            expire_timeout = request.expire_timeout,
            action_pairs = request.actions.len() / 2,
            "sending notification"
        );
        let id = self.inner.transport.notify(request).await?;
        self.inner
            .registry
            .register(id, closed_callback, action_callbacks)
            .await;

        info!(id, "notification sent");
        Ok(id)
    }

    /// Asks the daemon to close a notification.
    ///
    /// Callbacks fire when the daemon reports the closure.
    pub async fn close_notification(&self, id: u32) -> Result<(), TransportError> {
        debug!(id, "requesting notification close");
        self.inner.transport.close_notification(id).await
    }

    /// Disconnects from the daemon and stops dispatching. Safe to call more
    /// than once.
    pub async fn close(&self) {
        self.inner.transport.disconnect().await;
        if let Some(dispatcher) = self.inner.dispatcher.lock().await.take() {
            dispatcher.abort();
            info!("notification session closed");
        }
    }
}
