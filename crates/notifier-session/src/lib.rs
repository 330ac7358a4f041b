//! Client session for the freedesktop notifications service.
//!
//! Build a [`Notification`], hand it to [`Session::send`], and the session
//! fires the notification's closed and action callbacks when the daemon
//! reports them.

mod dbus;
mod dispatch;
mod notification;
mod registry;
mod session;
mod transport;

pub use dbus::{
    ConnectionTarget, DBUS_INTERFACE, DEFAULT_DBUS_NAME, DEFAULT_DBUS_PATH, DbusTransport,
};
pub use notification::{
    Action, ActionCallback, ClosedCallback, Notification, NotificationError, TIMEOUT_DEFAULT,
    TIMEOUT_NEVER,
};
pub use notifier_types::{CloseReason, NotificationEvent};
pub use session::{ConnectionError, Session, SessionConfig};
pub use transport::{HINT_IMAGE_PATH, NotifyRequest, ServerInformation, Transport, TransportError};
