use std::{convert::Infallible, fmt, str::FromStr};

use futures_util::StreamExt;
use notifier_types::NotificationEvent;
use tokio::{
    sync::{Mutex, RwLock, mpsc},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use zbus::{
    Message,
    connection::Builder as ConnectionBuilder,
    message::Type as MessageType,
    proxy::{Builder as ProxyBuilder, CacheProperties},
};

use crate::transport::{NotifyRequest, ServerInformation, Transport, TransportError};

/// Default freedesktop notification bus name.
pub const DEFAULT_DBUS_NAME: &str = "org.freedesktop.Notifications";
/// Default freedesktop notification object path.
pub const DEFAULT_DBUS_PATH: &str = "/org/freedesktop/Notifications";
/// Freedesktop notifications D-Bus interface name.
pub const DBUS_INTERFACE: &str = "org.freedesktop.Notifications";

/// Which bus to connect to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConnectionTarget {
    /// The user's session bus.
    #[default]
    Session,
    /// The system bus.
    System,
    /// An explicit D-Bus address such as `unix:path=/run/user/1000/bus`.
    Address(String),
}

impl FromStr for ConnectionTarget {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "" | "session" => Self::Session,
            "system" => Self::System,
            address => Self::Address(address.to_string()),
        })
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session => f.write_str("session"),
            Self::System => f.write_str("system"),
            Self::Address(address) => f.write_str(address),
        }
    }
}

/// [`Transport`] backed by a zbus connection to the notification daemon.
#[derive(Debug)]
pub struct DbusTransport {
    dbus_path: String,
    bus: RwLock<Option<Bus>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Debug)]
struct Bus {
    connection: zbus::Connection,
    proxy: zbus::Proxy<'static>,
}

impl DbusTransport {
    /// Opens a connection to `target` and binds a proxy for the daemon at
    /// `dbus_name`/`dbus_path`.
    pub async fn connect(
        target: &ConnectionTarget,
        dbus_name: &str,
        dbus_path: &str,
    ) -> Result<Self, TransportError> {
        info!(%target, dbus_name, dbus_path, "connecting to notification service");
        let builder = match target {
            ConnectionTarget::Session => ConnectionBuilder::session()?,
            ConnectionTarget::System => ConnectionBuilder::system()?,
            ConnectionTarget::Address(address) => ConnectionBuilder::address(address.as_str())?,
        };
        let connection = builder.build().await?;

        // The interface exposes no properties.
        let proxy = ProxyBuilder::<zbus::Proxy<'static>>::new(&connection)
            .destination(dbus_name.to_owned())?
            .path(dbus_path.to_owned())?
            .interface(DBUS_INTERFACE)?
            .cache_properties(CacheProperties::No)
            .build()
            .await?;

        info!(%target, dbus_name, "connected to notification service");
        Ok(Self {
            dbus_path: dbus_path.to_owned(),
            bus: RwLock::new(Some(Bus { connection, proxy })),
            listener: Mutex::new(None),
        })
    }

    async fn proxy(&self) -> Result<zbus::Proxy<'static>, TransportError> {
        self.bus
            .read()
            .await
            .as_ref()
            .map(|bus| bus.proxy.clone())
            .ok_or(TransportError::Disconnected)
    }
}

impl Transport for DbusTransport {
    async fn notify(&self, request: NotifyRequest) -> Result<u32, TransportError> {
        let proxy = self.proxy().await?;
        debug!(app = %request.app_name, summary = %request.summary, "calling Notify");
        let id: u32 = proxy
            .call(
                "Notify",
                &(
                    request.app_name,
                    request.replaces_id,
                    request.app_icon,
                    request.summary,
                    request.body,
                    request.actions,
                    request.hints,
                    request.expire_timeout,
                ),
            )
            .await?;
        Ok(id)
    }

    async fn close_notification(&self, id: u32) -> Result<(), TransportError> {
        let proxy = self.proxy().await?;
        debug!(id, "calling CloseNotification");
        proxy.call_noreply("CloseNotification", &id).await?;
        Ok(())
    }

    async fn capabilities(&self) -> Result<Vec<String>, TransportError> {
        let proxy = self.proxy().await?;
        let capabilities: Vec<String> = proxy.call("GetCapabilities", &()).await?;
        Ok(capabilities)
    }

    async fn server_information(&self) -> Result<ServerInformation, TransportError> {
        let proxy = self.proxy().await?;
        let info: (String, String, String, String) =
            proxy.call("GetServerInformation", &()).await?;
        Ok(info.into())
    }

    async fn subscribe(
        &self,
        sink: mpsc::Sender<NotificationEvent>,
    ) -> Result<(), TransportError> {
        // Signals are matched against the current owner of the daemon's name,
        // so other bus clients cannot fire callbacks.
        let proxy = self.proxy().await?;
        let mut stream = proxy.receive_all_signals().await?;
        info!(
            dbus_name = %proxy.destination(),
            dbus_path = %self.dbus_path,
            "subscribed to notification signals"
        );

        let listener = tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match parse_signal(&msg) {
                    Ok(Some(event)) => {
                        debug!(?event, "received notification signal");
                        if sink.send(event).await.is_err() {
                            debug!("event receiver dropped; stopping signal listener");
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(err) => warn!(?err, "failed to parse notification signal"),
                }
            }
            debug!("notification signal stream ended");
        });

        if let Some(previous) = self.listener.lock().await.replace(listener) {
            previous.abort();
        }
        Ok(())
    }

    async fn disconnect(&self) {
        if let Some(listener) = self.listener.lock().await.take() {
            listener.abort();
        }

        let Some(Bus { connection, proxy }) = self.bus.write().await.take() else {
            return;
        };
        drop(proxy);

        info!("closing notification service connection");
        if let Err(err) = connection.close().await {
            warn!(?err, "failed to close dbus connection");
        }
    }
}

impl Drop for DbusTransport {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.get_mut().take() {
            listener.abort();
        }
    }
}

/// Decodes a `NotificationClosed` or `ActionInvoked` signal. Other messages
/// yield `Ok(None)`.
pub(crate) fn parse_signal(msg: &Message) -> zbus::Result<Option<NotificationEvent>> {
    if msg.message_type() != MessageType::Signal {
        return Ok(None);
    }

    let header = msg.header();
    let iface_is_notify = header
        .interface()
        .is_some_and(|iface| iface.as_str() == DBUS_INTERFACE);

    if !iface_is_notify {
        return Ok(None);
    }

    match header.member().map(|m| m.as_str()) {
        Some("NotificationClosed") => {
            let (id, reason) = msg.body().deserialize::<(u32, u32)>()?;
            Ok(Some(NotificationEvent::Closed { id, reason }))
        }
        Some("ActionInvoked") => {
            let (id, action_key) = msg.body().deserialize::<(u32, String)>()?;
            Ok(Some(NotificationEvent::ActionInvoked { id, action_key }))
        }
        _ => Ok(None),
    }
}
