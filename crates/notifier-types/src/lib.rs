use serde::{Deserialize, Serialize};

/// Reason why a notification was closed, as reported by the daemon.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CloseReason {
    /// Notification timed out and expired.
    Expired,
    /// Notification was dismissed by the user.
    Dismissed,
    /// Notification was closed by a `CloseNotification` call.
    Closed,
    /// Undefined or unrecognized reason.
    Unknown,
}

impl CloseReason {
    /// Resolves a `NotificationClosed` reason code. Unrecognized codes map to
    /// [`CloseReason::Unknown`].
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Self::Expired,
            2 => Self::Dismissed,
            3 => Self::Closed,
            _ => Self::Unknown,
        }
    }
}

/// Signal emitted by the notification daemon, decoded from the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum NotificationEvent {
    /// `NotificationClosed` signal.
    Closed {
        /// Closed notification id.
        id: u32,
        /// Raw reason code, resolved later with [`CloseReason::from_code`].
        reason: u32,
    },
    /// `ActionInvoked` signal.
    ActionInvoked {
        /// Notification id for which the action was triggered.
        id: u32,
        /// Invoked action key.
        action_key: String,
    },
}
