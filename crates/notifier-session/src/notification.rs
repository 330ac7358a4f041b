use std::{fmt, sync::Arc};

use notifier_types::CloseReason;
use thiserror::Error;

/// Let the daemon pick the expiration timeout.
pub const TIMEOUT_DEFAULT: i32 = -1;
/// Never expire the notification.
pub const TIMEOUT_NEVER: i32 = 0;

/// Callback invoked once when a sent notification is closed.
pub type ClosedCallback = Arc<dyn Fn(u32, CloseReason) + Send + Sync>;
/// Callback invoked when the user triggers an action.
pub type ActionCallback = Arc<dyn Fn(u32) + Send + Sync>;

/// Errors produced while building a [`Notification`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NotificationError {
    /// An action with the same id was already added.
    #[error("an action with id {0:?} already exists on this notification")]
    DuplicateAction(String),
    /// Timeout below [`TIMEOUT_DEFAULT`].
    #[error("invalid timeout {0}ms; must be >= -1")]
    InvalidTimeout(i32),
}

/// A button attached to a notification.
#[derive(Clone)]
pub struct Action {
    id: String,
    label: String,
    callback: Option<ActionCallback>,
}

impl Action {
    /// Action key sent to the daemon and reported back in `ActionInvoked`.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Text shown on the button.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn callback(&self) -> Option<&ActionCallback> {
        self.callback.as_ref()
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

/// A notification request, ready to hand to [`crate::Session::send`].
///
/// Sending the same value twice registers its callbacks twice; each closed
/// event consumes one registration.
#[derive(Clone)]
pub struct Notification {
    app_name: String,
    title: String,
    body: String,
    icon: String,
    timeout_ms: i32,
    image_path: Option<String>,
    actions: Vec<Action>,
    closed_callback: Option<ClosedCallback>,
}

impl Notification {
    /// Creates a notification with no icon, no actions and the daemon's
    /// default timeout.
    pub fn new(
        app_name: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            title: title.into(),
            body: body.into(),
            icon: String::new(),
            timeout_ms: TIMEOUT_DEFAULT,
            image_path: None,
            actions: Vec::new(),
            closed_callback: None,
        }
    }

    /// Appends an action without a callback.
    pub fn add_action(
        &mut self,
        id: impl Into<String>,
        label: impl Into<String>,
    ) -> Result<&mut Self, NotificationError> {
        self.push_action(id.into(), label.into(), None)
    }

    /// Appends an action whose callback fires when the user triggers it.
    pub fn add_action_with_callback<F>(
        &mut self,
        id: impl Into<String>,
        label: impl Into<String>,
        callback: F,
    ) -> Result<&mut Self, NotificationError>
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.push_action(id.into(), label.into(), Some(Arc::new(callback)))
    }

    fn push_action(
        &mut self,
        id: String,
        label: String,
        callback: Option<ActionCallback>,
    ) -> Result<&mut Self, NotificationError> {
        if self.actions.iter().any(|action| action.id == id) {
            return Err(NotificationError::DuplicateAction(id));
        }

        self.actions.push(Action {
            id,
            label,
            callback,
        });
        Ok(self)
    }

    /// Sets the expiration timeout in milliseconds.
    ///
    /// [`TIMEOUT_DEFAULT`] and [`TIMEOUT_NEVER`] are passed to the daemon as-is.
    pub fn set_timeout(&mut self, timeout_ms: i32) -> Result<&mut Self, NotificationError> {
        if timeout_ms < TIMEOUT_DEFAULT {
            return Err(NotificationError::InvalidTimeout(timeout_ms));
        }

        self.timeout_ms = timeout_ms;
        Ok(self)
    }

    /// Sets the icon name or `file://` URI shown by the daemon.
    pub fn set_icon(&mut self, icon: impl Into<String>) -> &mut Self {
        self.icon = icon.into();
        self
    }

    /// Sets the `image-path` hint.
    pub fn set_image_path(&mut self, path: impl Into<String>) -> &mut Self {
        self.image_path = Some(path.into());
        self
    }

    /// Sets the callback fired when this notification is closed.
    pub fn on_closed<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(u32, CloseReason) + Send + Sync + 'static,
    {
        self.closed_callback = Some(Arc::new(callback));
        self
    }

    /// Name of the sending application.
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Summary line.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Body text.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Icon name, empty when unset.
    pub fn icon(&self) -> &str {
        &self.icon
    }

    /// Expiration timeout in milliseconds.
    pub fn timeout_ms(&self) -> i32 {
        self.timeout_ms
    }

    /// Value of the `image-path` hint, if any.
    pub fn image_path(&self) -> Option<&str> {
        self.image_path.as_deref()
    }

    /// Actions in insertion order.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub(crate) fn closed_callback(&self) -> Option<&ClosedCallback> {
        self.closed_callback.as_ref()
    }

    /// Flattens actions into the `[id0, label0, id1, label1, ...]` layout
    /// expected by `Notify`.
    pub(crate) fn flat_actions(&self) -> Vec<String> {
        self.actions
            .iter()
            .flat_map(|action| [action.id.clone(), action.label.clone()])
            .collect()
    }
}

impl fmt::Debug for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notification")
            .field("app_name", &self.app_name)
            .field("title", &self.title)
            .field("body", &self.body)
            .field("icon", &self.icon)
            .field("timeout_ms", &self.timeout_ms)
            .field("image_path", &self.image_path)
            .field("actions", &self.actions)
            .field("has_closed_callback", &self.closed_callback.is_some())
            .finish()
    }
}
