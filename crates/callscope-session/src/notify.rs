//! User-facing notifications

use parking_lot::Mutex;
use std::fmt;
use tracing::{error, info};

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationLevel {
    /// An operation completed
    Success,
    /// An operation failed
    Error,
}

/// A toast-style message for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Severity
    pub level: NotificationLevel,
    /// Short headline
    pub title: String,
    /// Detail text
    pub message: String,
}

/// Surface that shows notifications to the user
pub trait Notifier: Send + Sync + fmt::Debug {
    /// Show one notification
    fn notify(&self, notification: Notification);

    /// Report a completed operation
    fn success(&self, title: &str, message: &str) {
        self.notify(Notification {
            level: NotificationLevel::Success,
            title: title.to_string(),
            message: message.to_string(),
        });
    }

    /// Report a failed operation
    fn error(&self, title: &str, message: &str) {
        self.notify(Notification {
            level: NotificationLevel::Error,
            title: title.to_string(),
            message: message.to_string(),
        });
    }
}

/// Notifier that writes to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Success => {
                info!(title = %notification.title, "{}", notification.message);
            }
            NotificationLevel::Error => {
                error!(title = %notification.title, "{}", notification.message);
            }
        }
    }
}

/// Notifier that keeps everything it was given
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    entries: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every notification so far, oldest first
    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.entries.lock().clone()
    }

    /// Error notifications so far
    #[must_use]
    pub fn errors(&self) -> Vec<Notification> {
        self.entries
            .lock()
            .iter()
            .filter(|n| n.level == NotificationLevel::Error)
            .cloned()
            .collect()
    }

    /// Drop everything recorded so far
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.entries.lock().push(notification);
    }
}
