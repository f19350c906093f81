//! Terminal rendering of app events

use peerline_core::{format_duration, AppEvent, Failure};

use crate::error::Result;

/// Output style for app events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFormat {
    Text,
    /// One JSON object per line
    Json,
}

/// Render one event, or `None` when it is not worth a line in text mode
pub fn render(event: &AppEvent, format: EventFormat) -> Result<Option<String>> {
    match format {
        EventFormat::Json => Ok(Some(serde_json::to_string(event)?)),
        EventFormat::Text => Ok(render_text(event)),
    }
}

fn render_text(event: &AppEvent) -> Option<String> {
    let line = match event {
        AppEvent::IdentityConfirmed { address } => format!("* Your number is {}", address),
        AppEvent::ConnectionStatusChanged { status, address } => match address {
            Some(address) => format!("* Network: {} ({})", status, address),
            None => format!("* Network: {}", status),
        },
        AppEvent::ChatAppended {
            message,
            sender_name,
        } => {
            let who = if message.is_own {
                format!("you -> {}", message.remote)
            } else {
                sender_name
                    .clone()
                    .unwrap_or_else(|| message.remote.to_string())
            };
            format!("[{}] {}: {}", message.display_time(), who, message.text)
        }
        AppEvent::ChatCleared => "* Chats cleared".to_string(),
        AppEvent::CallStateChanged { snapshot: None } => "* Call ended".to_string(),
        AppEvent::CallStateChanged {
            snapshot: Some(call),
        } => {
            let mut line = format!("* {} {}", call.status, call.label());
            if call.is_muted {
                line.push_str(" [muted]");
            }
            if call.is_recording {
                line.push_str(" [rec]");
            }
            line
        }
        // Ticks every second while connected
        AppEvent::CallDurationChanged { .. } => return None,
        AppEvent::RecordingCompleted { recording } => {
            format!("* Saved {} ({})", recording.name, recording.size_label())
        }
        AppEvent::FileDownloaded { file } => format!("* Downloaded {}", file.name),
        AppEvent::Failure { failure } => format!("! {}", describe_failure(failure)),
        AppEvent::Notification { notification } => format!(
            "(!) {}: {} [{} {}]",
            notification.title, notification.message, notification.app, notification.id
        ),
        AppEvent::NotificationRead { id } => format!("* Notification {} read", id),
        AppEvent::StatusReport {
            address,
            status,
            call,
            unread_notifications,
            recordings,
        } => {
            let address = address
                .as_ref()
                .map(|address| address.to_string())
                .unwrap_or_else(|| "-".to_string());
            let call = match call {
                Some(call) => format!(
                    "{} {} {}",
                    call.status,
                    call.label(),
                    format_duration(call.duration_secs)
                ),
                None => "idle".to_string(),
            };
            format!(
                "number {} | network {} | call {} | unread {} | recordings {}",
                address, status, call, unread_notifications, recordings
            )
        }
    };
    Some(line)
}

fn describe_failure(failure: &Failure) -> String {
    match failure {
        Failure::NoNetwork => "Not connected to the network".to_string(),
        Failure::CallInProgress => "Already in a call".to_string(),
        Failure::CaptureDenied => "Microphone access denied".to_string(),
        Failure::CaptureUnsupported => "No microphone available".to_string(),
        Failure::CallTransport { reason } => format!("Call failed: {}", reason),
        Failure::DeliveryFailed { target } => format!("Message to {} not delivered", target),
    }
}
