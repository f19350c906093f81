//! Event Fan-out
//!
//! Turns app events into notification entries for the UI's notification
//! surface. Translation is pure formatting plus the choice of which app the
//! entry opens; the [`NotificationLog`] keeps the entries newest first.

use uuid::Uuid;

use peerline_core::{
    AppEvent, AppTag, CallStatus, ConnectionStatus, Failure, Notification, Timestamp,
};

/// Stateless translator from app events to notifications
pub struct EventFanout;

impl EventFanout {
    /// Notification for `event`, if it deserves one
    pub fn translate(event: &AppEvent, now: Timestamp) -> Option<Notification> {
        let (title, message, app) = match event {
            AppEvent::IdentityConfirmed { address } => (
                "Connected to network".to_string(),
                format!("Your number is {}", address),
                AppTag::Settings,
            ),
            AppEvent::ConnectionStatusChanged {
                status: ConnectionStatus::Error,
                ..
            } => (
                "Network error".to_string(),
                "Could not connect to the network. Reconnect from settings.".to_string(),
                AppTag::Settings,
            ),
            AppEvent::ChatAppended {
                message,
                sender_name,
            } if !message.is_own => (
                format!(
                    "Message from {}",
                    sender_name.as_deref().unwrap_or(message.remote.as_str())
                ),
                message.text.clone(),
                AppTag::Messages,
            ),
            AppEvent::CallStateChanged {
                snapshot: Some(snapshot),
            } if snapshot.status == CallStatus::Incoming => (
                "Incoming call".to_string(),
                format!("{} is calling", snapshot.label()),
                AppTag::Phone,
            ),
            AppEvent::RecordingCompleted { recording } => (
                "Recording saved".to_string(),
                format!("{} ({})", recording.name, recording.size_label()),
                AppTag::Phone,
            ),
            AppEvent::FileDownloaded { file } => (
                "Download complete".to_string(),
                file.name.clone(),
                AppTag::Browser,
            ),
            AppEvent::Failure { failure } => Self::failure(failure)?,
            _ => return None,
        };
        Some(Notification::new(title, message, app, now))
    }

    fn failure(failure: &Failure) -> Option<(String, String, AppTag)> {
        let entry = match failure {
            Failure::NoNetwork => (
                "No network".to_string(),
                "You are not connected to the network".to_string(),
                AppTag::Phone,
            ),
            Failure::CallInProgress => return None,
            Failure::CaptureDenied => (
                "Microphone blocked".to_string(),
                "Allow microphone access to make calls".to_string(),
                AppTag::Phone,
            ),
            Failure::CaptureUnsupported => (
                "Calls unavailable".to_string(),
                "This device does not support audio calls".to_string(),
                AppTag::Phone,
            ),
            Failure::CallTransport { reason } => (
                "Call failed".to_string(),
                reason.clone(),
                AppTag::Phone,
            ),
            Failure::DeliveryFailed { target } => (
                "Message not delivered".to_string(),
                format!("Could not reach {}", target),
                AppTag::Messages,
            ),
        };
        Some(entry)
    }
}

/// Bounded, newest-first notification log
#[derive(Debug)]
pub struct NotificationLog {
    entries: Vec<Notification>,
    max_entries: usize,
}

impl NotificationLog {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries,
        }
    }

    pub fn push(&mut self, notification: Notification) {
        self.entries.insert(0, notification);
        self.entries.truncate(self.max_entries);
    }

    /// Returns false if no entry has that id
    pub fn mark_read(&mut self, id: Uuid) -> bool {
        match self.entries.iter_mut().find(|entry| entry.id == id) {
            Some(entry) => {
                entry.read = true;
                true
            }
            None => false,
        }
    }

    pub fn entries(&self) -> &[Notification] {
        &self.entries
    }

    pub fn unread_count(&self) -> usize {
        self.entries.iter().filter(|entry| !entry.read).count()
    }
}
