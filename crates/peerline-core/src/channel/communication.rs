//! CSP Channel Communication Protocol Types
//!
//! This module defines the typed communication protocol.
//! All inter-task communication flows through these channel message types:
//!
//! - [`Command`]: UI → Core Logic
//! - [`Event`]: Broker task → Core Logic
//! - [`Effect`]: Core Logic → Broker task
//! - [`AppEvent`]: Core Logic → UI

use core::fmt;
use core::time::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    errors::{CaptureError, TransportError},
    media::LocalMedia,
    transport::{CallControl, CallSignal},
    types::{
        CallId, CallSnapshot, ChatMessage, DownloadedFile, LocalAddress, Notification, Recording,
    },
};

/// Monotonic counter identifying one registration attempt chain
pub type Generation = u64;

// ----------------------------------------------------------------------------
// Command: UI → Core Logic
// ----------------------------------------------------------------------------

/// Commands sent from the UI to the Core Logic task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Place a voice call to `target`
    Dial { target: LocalAddress },
    /// Answer the ringing inbound call
    AcceptIncoming,
    /// End or reject the current call
    HangUp,
    ToggleMute,
    ToggleRecord,
    /// Send one chat message
    SendMessage { target: LocalAddress, text: String },
    /// Restart the broker registration from scratch
    Reconnect,
    MarkNotificationRead { id: Uuid },
    ClearMessages,
    /// Report a file the browser surface finished downloading
    RecordDownload {
        name: String,
        kind: String,
        size_bytes: u64,
    },
    /// Request a [`AppEvent::StatusReport`]
    GetStatus,
    /// Shutdown the engine gracefully
    Shutdown,
}

// ----------------------------------------------------------------------------
// Event: Broker task → Core Logic
// ----------------------------------------------------------------------------

/// Events posted by the broker task as asynchronous work completes
#[derive(Debug, Clone)]
pub enum Event {
    /// Registration under the generation's address is live
    RegistrationOpened { generation: Generation },
    /// The rendezvous service rejected the address as in use
    AddressTaken { generation: Generation },
    /// Registration failed for a reason other than a collision
    RegistrationFailed {
        generation: Generation,
        reason: String,
    },
    /// A live registration dropped
    Disconnected {
        generation: Generation,
        reason: String,
    },
    /// The registration's inbound stream ended; it cannot be resumed
    RegistrationLost {
        generation: Generation,
        reason: String,
    },
    /// A resume attempt failed
    ReconnectFailed {
        generation: Generation,
        reason: String,
    },
    /// A peer is calling; the call id was assigned by the broker task
    IncomingCall {
        generation: Generation,
        call_id: CallId,
        from: LocalAddress,
        control: Arc<dyn CallControl>,
    },
    /// One payload arrived on an inbound data channel
    InboundData {
        from: LocalAddress,
        payload: Vec<u8>,
    },
    /// Microphone capture succeeded
    MediaCaptured { call_id: CallId, media: LocalMedia },
    /// Microphone capture failed
    CaptureFailed { call_id: CallId, error: CaptureError },
    /// Outbound call object created by the transport
    CallPlaced {
        call_id: CallId,
        control: Arc<dyn CallControl>,
    },
    /// Placing or answering the call failed
    CallFailed {
        call_id: CallId,
        error: TransportError,
    },
    /// Signal from a live call handle
    CallSignal { call_id: CallId, signal: CallSignal },
    /// A chat payload could not be delivered
    DeliveryFailed {
        target: LocalAddress,
        error: TransportError,
    },
}

impl Event {
    /// Short name for log lines
    pub fn kind(&self) -> &'static str {
        match self {
            Event::RegistrationOpened { .. } => "registration_opened",
            Event::AddressTaken { .. } => "address_taken",
            Event::RegistrationFailed { .. } => "registration_failed",
            Event::Disconnected { .. } => "disconnected",
            Event::RegistrationLost { .. } => "registration_lost",
            Event::ReconnectFailed { .. } => "reconnect_failed",
            Event::IncomingCall { .. } => "incoming_call",
            Event::InboundData { .. } => "inbound_data",
            Event::MediaCaptured { .. } => "media_captured",
            Event::CaptureFailed { .. } => "capture_failed",
            Event::CallPlaced { .. } => "call_placed",
            Event::CallFailed { .. } => "call_failed",
            Event::CallSignal { .. } => "call_signal",
            Event::DeliveryFailed { .. } => "delivery_failed",
        }
    }

    /// Release what an event owns when nobody will handle it
    pub fn discard(self) {
        match self {
            Event::MediaCaptured { media, .. } => {
                media.release();
            }
            Event::IncomingCall { control, .. } | Event::CallPlaced { control, .. } => {
                control.close();
            }
            _ => {}
        }
    }
}

// ----------------------------------------------------------------------------
// Effect: Core Logic → Broker task (External Side Effects Only)
// ----------------------------------------------------------------------------

/// Effects sent from Core Logic to the broker task
/// Effects describe external side effects only - no UI knowledge
#[derive(Debug, Clone)]
pub enum Effect {
    /// Open a registration, destroying any previous one first
    Register {
        generation: Generation,
        address: LocalAddress,
    },
    /// Resume a dropped registration after `delay`
    Reconnect {
        generation: Generation,
        address: LocalAddress,
        delay: Duration,
    },
    /// Acquire microphone audio for a call
    CaptureAudio { call_id: CallId },
    /// Dial `target` carrying `media`
    PlaceCall {
        call_id: CallId,
        target: LocalAddress,
        media: LocalMedia,
    },
    /// Answer an inbound call with `media`
    AnswerCall {
        call_id: CallId,
        control: Arc<dyn CallControl>,
        media: LocalMedia,
    },
    /// Open a channel to `target`, write `payload`, then close it
    SendChat {
        target: LocalAddress,
        payload: Vec<u8>,
    },
    /// Stop all background work
    Shutdown,
}

impl Effect {
    /// Release what an effect owns when the broker task will never run it
    pub fn discard(self) {
        match self {
            Effect::PlaceCall { media, .. } => {
                media.release();
            }
            Effect::AnswerCall { control, media, .. } => {
                media.release();
                control.close();
            }
            _ => {}
        }
    }
}

// ----------------------------------------------------------------------------
// AppEvent: Core Logic → UI (State Changes Only)
// ----------------------------------------------------------------------------

/// Application events sent from Core Logic to the UI
/// AppEvents describe state changes that UI components need to know about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppEvent {
    /// The endpoint is reachable under `address`
    IdentityConfirmed { address: LocalAddress },
    /// Status dot changed
    ConnectionStatusChanged {
        status: ConnectionStatus,
        address: Option<LocalAddress>,
    },
    /// A message was appended to a chat log
    ChatAppended {
        message: ChatMessage,
        sender_name: Option<String>,
    },
    /// All chat logs were cleared
    ChatCleared,
    /// Current call changed; `None` means no call
    CallStateChanged { snapshot: Option<CallSnapshot> },
    /// Connected-call duration recomputed
    CallDurationChanged { seconds: u64 },
    RecordingCompleted { recording: Recording },
    FileDownloaded { file: DownloadedFile },
    /// A user-facing failure condition
    Failure { failure: Failure },
    /// A new entry was prepended to the notification log
    Notification { notification: Notification },
    NotificationRead { id: Uuid },
    /// Response to [`Command::GetStatus`]
    StatusReport {
        address: Option<LocalAddress>,
        status: ConnectionStatus,
        call: Option<CallSnapshot>,
        unread_notifications: usize,
        recordings: usize,
    },
}

// ----------------------------------------------------------------------------
// Supporting Types
// ----------------------------------------------------------------------------

/// Connection status for UI display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "Disconnected"),
            ConnectionStatus::Connecting => write!(f, "Connecting"),
            ConnectionStatus::Connected => write!(f, "Connected"),
            ConnectionStatus::Error => write!(f, "Error"),
        }
    }
}

/// Failure conditions reported to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Failure {
    /// An action needed the network while the broker was not connected
    NoNetwork,
    /// A dial was attempted while another call is active
    CallInProgress,
    CaptureDenied,
    CaptureUnsupported,
    /// The call ended because the transport failed
    CallTransport { reason: String },
    DeliveryFailed { target: LocalAddress },
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
