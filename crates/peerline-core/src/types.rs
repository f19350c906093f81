//! Core types for the Peerline engine
//!
//! This module defines the fundamental domain types, using newtype patterns
//! for semantic validation and type safety.

use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::errors::PeerlineError;

// ----------------------------------------------------------------------------
// Local Address
// ----------------------------------------------------------------------------

/// Number of digits in a generated address
pub const ADDRESS_DIGITS: usize = 6;

/// Longest address accepted from peers or the UI
pub const MAX_ADDRESS_DIGITS: usize = 15;

/// Short numeric address an endpoint is reachable at
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LocalAddress(String);

impl LocalAddress {
    /// Parse and validate an address (non-empty, ASCII digits only)
    pub fn parse(value: &str) -> Result<Self, PeerlineError> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.len() > MAX_ADDRESS_DIGITS {
            return Err(PeerlineError::InvalidAddress {
                value: value.to_string(),
            });
        }
        if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PeerlineError::InvalidAddress {
                value: value.to_string(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Build an address from a number in the generated range
    pub fn from_number(number: u32) -> Self {
        Self(format!("{:0width$}", number, width = ADDRESS_DIGITS))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LocalAddress {
    type Err = PeerlineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for LocalAddress {
    type Error = PeerlineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<LocalAddress> for String {
    fn from(address: LocalAddress) -> Self {
        address.0
    }
}

// ----------------------------------------------------------------------------
// Timestamps and time sources
// ----------------------------------------------------------------------------

/// Milliseconds since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn new(millis: u64) -> Self {
        Self(millis)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Whole seconds elapsed from `earlier` to `self`, saturating at zero
    pub fn seconds_since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0) / 1000
    }

    /// `HH:MM` wall-clock label (UTC)
    pub fn display_time(&self) -> String {
        let (hours, minutes, _) = self.clock_parts();
        format!("{:02}:{:02}", hours, minutes)
    }

    /// `HH-MM-SS` label, safe for file names (UTC)
    pub fn file_stamp(&self) -> String {
        let (hours, minutes, seconds) = self.clock_parts();
        format!("{:02}-{:02}-{:02}", hours, minutes, seconds)
    }

    fn clock_parts(&self) -> (u64, u64, u64) {
        let day_secs = (self.0 / 1000) % 86_400;
        (day_secs / 3600, (day_secs % 3600) / 60, day_secs % 60)
    }
}

/// Source of wall-clock time, injectable for deterministic tests
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// System clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::new(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
        )
    }
}

// ----------------------------------------------------------------------------
// Identifiers
// ----------------------------------------------------------------------------

/// Identifier of one call attempt, inbound or outbound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(Uuid);

impl CallId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First block is enough to tell calls apart in logs
        let full = self.0.simple().to_string();
        f.write_str(&full[..8])
    }
}

// ----------------------------------------------------------------------------
// Chat, contacts and artifacts
// ----------------------------------------------------------------------------

/// One entry in a per-peer chat log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub remote: LocalAddress,
    pub text: String,
    pub sent_at: Timestamp,
    pub is_own: bool,
}

impl ChatMessage {
    pub fn new(remote: LocalAddress, text: String, sent_at: Timestamp, is_own: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            remote,
            text,
            sent_at,
            is_own,
        }
    }

    pub fn display_time(&self) -> String {
        self.sent_at.display_time()
    }
}

/// Address book entry, owned by the UI layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: Uuid,
    pub name: String,
    pub address: LocalAddress,
}

impl Contact {
    pub fn new(name: impl Into<String>, address: LocalAddress) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            address,
        }
    }
}

/// Completed call recording artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recording {
    pub id: Uuid,
    pub name: String,
    pub created_at: Timestamp,
    pub size_bytes: u64,
}

impl Recording {
    /// Human readable size, e.g. `3.4 MB`
    pub fn size_label(&self) -> String {
        format!("{:.1} MB", self.size_bytes as f64 / 1_000_000.0)
    }
}

/// File reported as downloaded by the browser surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadedFile {
    pub id: Uuid,
    pub name: String,
    pub kind: String,
    pub size_bytes: u64,
}

// ----------------------------------------------------------------------------
// Notifications
// ----------------------------------------------------------------------------

/// Deep-link tag telling the UI which app a notification opens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppTag {
    Settings,
    Messages,
    Phone,
    Browser,
    Files,
}

impl fmt::Display for AppTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppTag::Settings => write!(f, "settings"),
            AppTag::Messages => write!(f, "messages"),
            AppTag::Phone => write!(f, "phone"),
            AppTag::Browser => write!(f, "browser"),
            AppTag::Files => write!(f, "files"),
        }
    }
}

/// Entry in the notification log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    pub timestamp: Timestamp,
    pub read: bool,
    pub app: AppTag,
}

impl Notification {
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        app: AppTag,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            message: message.into(),
            timestamp,
            read: false,
            app,
        }
    }
}

// ----------------------------------------------------------------------------
// Call snapshot
// ----------------------------------------------------------------------------

/// Call life-cycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallStatus {
    Dialing,
    Incoming,
    Connected,
    Ended,
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallStatus::Dialing => write!(f, "Calling..."),
            CallStatus::Incoming => write!(f, "Incoming call..."),
            CallStatus::Connected => write!(f, "In call"),
            CallStatus::Ended => write!(f, "Ended"),
        }
    }
}

/// Display-ready view of the active call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSnapshot {
    pub call_id: CallId,
    pub remote: LocalAddress,
    pub display_name: Option<String>,
    pub status: CallStatus,
    pub started_at: Option<Timestamp>,
    pub duration_secs: u64,
    pub is_muted: bool,
    pub is_recording: bool,
}

impl CallSnapshot {
    /// Contact name if known, otherwise the raw address
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .unwrap_or_else(|| self.remote.as_str())
    }
}

/// Format a call duration as `m:ss`
pub fn format_duration(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
