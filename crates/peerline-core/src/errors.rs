//! Error types for the Peerline engine
//!
//! This module contains all error types used throughout the engine: transport
//! errors from the rendezvous service, registration errors, media capture errors,
//! wire format errors, and the `PeerlineError` type that unifies them all.

use crate::types::LocalAddress;

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Failures reported by the rendezvous transport for calls and data channels
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Local endpoint is not registered")]
    NotRegistered,
    #[error("Peer {address} is unreachable")]
    PeerUnavailable { address: LocalAddress },
    #[error("Data channel to {address} failed: {reason}")]
    ChannelFailed { address: LocalAddress, reason: String },
    #[error("Call to {address} failed: {reason}")]
    CallFailed { address: LocalAddress, reason: String },
    #[error("Operation not valid on this call handle: {reason}")]
    InvalidCallOperation { reason: String },
    #[error("Transport timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },
    #[error("Transport shutdown: {reason}")]
    Shutdown { reason: String },
}

/// Failures opening or resuming a registration with the rendezvous service
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("Address {address} is already taken")]
    AddressTaken { address: LocalAddress },
    #[error("Rendezvous service unavailable: {reason}")]
    Unavailable { reason: String },
    #[error("Registration timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },
}

/// Failures acquiring local audio capture
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("Microphone access denied")]
    Denied,
    #[error("Audio capture is not supported on this device")]
    Unsupported,
    #[error("Audio device busy: {reason}")]
    DeviceBusy { reason: String },
}

/// Failures encoding or decoding data channel frames
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("Frame encoding failed: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("Malformed frame: {0}")]
    Decode(#[source] serde_json::Error),
}

// ----------------------------------------------------------------------------
// Main Error Type
// ----------------------------------------------------------------------------

/// Unified error type for the Peerline engine
#[derive(Debug, thiserror::Error)]
pub enum PeerlineError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Wire error: {0}")]
    Wire(#[from] WireError),

    #[error("Channel error: {message}")]
    Channel { message: String },

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("Invalid address: {value:?}")]
    InvalidAddress { value: String },
}

impl PeerlineError {
    pub fn channel(message: impl Into<String>) -> Self {
        Self::Channel {
            message: message.into(),
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Errors after which the core loop cannot continue
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Channel { .. } | Self::Configuration { .. })
    }
}

/// Result type for Peerline operations
pub type PeerlineResult<T> = Result<T, PeerlineError>;
