use std::sync::Mutex;

use log::info;
use serde::{Deserialize, Serialize};

use super::policy::Priority;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum NotificationPermission {
    /// Not asked yet.
    Default,
    Granted,
    Denied,
    /// The host has no notification facility.
    Unsupported,
}

/// System notification capability supplied by the host.
pub trait Notifier: Send + Sync {
    fn permission(&self) -> NotificationPermission;

    /// Prompt the user. Only called while the permission is `Default`.
    fn request_permission(&self) -> NotificationPermission;

    fn deliver(&self, priority: Priority, title: &str, body: &str) -> Result<(), String>;
}

/// Writes notifications to the log. Permission is granted on first request.
pub struct LogNotifier {
    permission: Mutex<NotificationPermission>,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self {
            permission: Mutex::new(NotificationPermission::Default),
        }
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for LogNotifier {
    fn permission(&self) -> NotificationPermission {
        match self.permission.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn request_permission(&self) -> NotificationPermission {
        let mut guard = match self.permission.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *guard == NotificationPermission::Default {
            *guard = NotificationPermission::Granted;
        }
        *guard
    }

    fn deliver(&self, priority: Priority, title: &str, body: &str) -> Result<(), String> {
        info!("[notification:{}] {title}: {body}", priority.as_str());
        Ok(())
    }
}
