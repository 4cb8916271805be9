//! Admin notifications raised when an import creates a new account.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::records::{EntityKind, RecordId};

/// Outbound notification hook (e-mail, chat, or a log sink in development).
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &AdminNotification) -> Result<(), NotifyError>;
}

/// Payload describing one newly created record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminNotification {
    pub entity: EntityKind,
    pub record_id: RecordId,
    pub label: String,
}

impl AdminNotification {
    pub fn subject(&self) -> String {
        match self.entity {
            EntityKind::Employer => format!("New employer registered: {}", self.label),
            EntityKind::JobSeeker => format!("New job seeker registered: {}", self.label),
            other => format!("New {} record: {}", other, self.label),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Emits each notification as a tracing event addressed to the configured admin.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    recipient: String,
}

impl LogNotifier {
    pub fn new(recipient: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
        }
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }
}

impl Notifier for LogNotifier {
    fn notify(&self, notification: &AdminNotification) -> Result<(), NotifyError> {
        info!(
            recipient = %self.recipient,
            entity = %notification.entity,
            record_id = %notification.record_id,
            subject = %notification.subject(),
            "admin notification queued"
        );
        Ok(())
    }
}

/// Collects notifications in memory so callers can assert on them.
#[derive(Debug, Default, Clone)]
pub struct MemoryNotifier {
    events: Arc<Mutex<Vec<AdminNotification>>>,
}

impl MemoryNotifier {
    pub fn events(&self) -> Vec<AdminNotification> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notification: &AdminNotification) -> Result<(), NotifyError> {
        let mut events = self
            .events
            .lock()
            .map_err(|_| NotifyError::Transport("notification buffer poisoned".to_string()))?;
        events.push(notification.clone());
        Ok(())
    }
}
