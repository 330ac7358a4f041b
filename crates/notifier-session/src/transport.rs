use std::{collections::HashMap, future::Future};

use notifier_types::NotificationEvent;
use thiserror::Error;
use tokio::sync::mpsc;
use zbus::zvariant;

/// Hint key carrying a local image path.
pub const HINT_IMAGE_PATH: &str = "image-path";

/// Errors produced by transport calls.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection was closed or never established.
    #[error("not connected to the notification service")]
    Disconnected,
    /// A D-Bus error occurred.
    #[error("dbus error: {0}")]
    Dbus(#[from] zbus::Error),
}

/// Arguments of a `Notify` call.
#[derive(Debug)]
pub struct NotifyRequest {
    /// Sending application name.
    pub app_name: String,
    /// Id of a notification to replace, or `0` for a new one.
    pub replaces_id: u32,
    /// Icon name or URI, empty for none.
    pub app_icon: String,
    /// Summary line.
    pub summary: String,
    /// Body text.
    pub body: String,
    /// Flat `[id, label, id, label, ...]` list.
    pub actions: Vec<String>,
    /// Notification hints keyed by hint name.
    pub hints: HashMap<String, zvariant::OwnedValue>,
    /// Expiration timeout in milliseconds; `-1` lets the daemon decide and
    /// `0` never expires.
    pub expire_timeout: i32,
}

/// Server details returned by `GetServerInformation`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInformation {
    /// Daemon name.
    pub name: String,
    /// Daemon vendor.
    pub vendor: String,
    /// Daemon version.
    pub version: String,
    /// Version of the notification specification the daemon implements.
    pub spec_version: String,
}

impl From<(String, String, String, String)> for ServerInformation {
    fn from((name, vendor, version, spec_version): (String, String, String, String)) -> Self {
        Self {
            name,
            vendor,
            version,
            spec_version,
        }
    }
}

/// Connection to a notification daemon.
///
/// Implementations deliver `NotificationClosed` and `ActionInvoked` signals to
/// the sink passed to [`Transport::subscribe`], in the order they arrive.
pub trait Transport: Send + Sync + 'static {
    /// Sends a notification and returns the id allocated by the daemon.
    fn notify(
        &self,
        request: NotifyRequest,
    ) -> impl Future<Output = Result<u32, TransportError>> + Send;

    /// Asks the daemon to close a notification without waiting for a reply.
    fn close_notification(&self, id: u32)
    -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the optional features the daemon supports.
    fn capabilities(&self) -> impl Future<Output = Result<Vec<String>, TransportError>> + Send;

    /// Returns the daemon's identity and supported specification version.
    fn server_information(
        &self,
    ) -> impl Future<Output = Result<ServerInformation, TransportError>> + Send;

    /// Starts forwarding daemon signals into `sink`.
    fn subscribe(
        &self,
        sink: mpsc::Sender<NotificationEvent>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Closes the connection. Calling it more than once is a no-op.
    fn disconnect(&self) -> impl Future<Output = ()> + Send;
}
