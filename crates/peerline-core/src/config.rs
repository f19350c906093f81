//! Centralized Configuration Management
//!
//! This module consolidates all configuration structures used throughout the
//! engine to provide a unified, consistent configuration interface.

use core::time::Duration;
use serde::{Deserialize, Serialize};

use crate::errors::{PeerlineError, PeerlineResult};

// ----------------------------------------------------------------------------
// Channel Configuration
// ----------------------------------------------------------------------------

/// Configuration for CSP channel buffer sizes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Buffer size for Command channels (UI → Core Logic)
    pub command_buffer_size: usize,
    /// Buffer size for Event channels (Broker → Core Logic)
    pub event_buffer_size: usize,
    /// Buffer size for Effect channels (Core Logic → Broker)
    pub effect_buffer_size: usize,
    /// Buffer size for AppEvent channels (Core Logic → UI)
    pub app_event_buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            command_buffer_size: 32,   // UI commands are infrequent
            event_buffer_size: 128,    // Network events can be bursty
            effect_buffer_size: 64,    // Effects are processed quickly
            app_event_buffer_size: 64, // UI updates need responsiveness
        }
    }
}

impl ChannelConfig {
    /// Create configuration optimized for testing
    pub fn testing() -> Self {
        Self {
            command_buffer_size: 100,
            event_buffer_size: 100,
            effect_buffer_size: 100,
            app_event_buffer_size: 256,
        }
    }
}

// ----------------------------------------------------------------------------
// Broker Configuration
// ----------------------------------------------------------------------------

/// Registration and recovery behaviour of the peer connection broker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Automatic resume attempts after a disconnect before escalating to error
    pub max_reconnect_attempts: u32,
    /// Base delay before a resume attempt; multiplied by the attempt number
    pub reconnect_backoff_ms: u64,
    /// Upper bound on a single registration or resume attempt
    pub registration_timeout_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 3,
            reconnect_backoff_ms: 500,
            registration_timeout_ms: 10_000,
        }
    }
}

impl BrokerConfig {
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms.saturating_mul(attempt.max(1) as u64))
    }

    pub fn registration_timeout(&self) -> Duration {
        Duration::from_millis(self.registration_timeout_ms)
    }
}

// ----------------------------------------------------------------------------
// Messaging Configuration
// ----------------------------------------------------------------------------

/// Lifetime bounds for outgoing data channels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    /// Give up on opening a channel after this long
    pub channel_open_timeout_ms: u64,
    /// Keep a channel open this long after writing before closing it
    pub channel_linger_ms: u64,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            channel_open_timeout_ms: 5_000,
            channel_linger_ms: 1_000,
        }
    }
}

impl MessagingConfig {
    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.channel_open_timeout_ms)
    }

    pub fn linger(&self) -> Duration {
        Duration::from_millis(self.channel_linger_ms)
    }
}

// ----------------------------------------------------------------------------
// Call Configuration
// ----------------------------------------------------------------------------

/// Call session settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// Interval at which the connected-call duration is recomputed
    pub duration_tick_ms: u64,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            duration_tick_ms: 1_000,
        }
    }
}

impl CallConfig {
    pub fn duration_tick(&self) -> Duration {
        Duration::from_millis(self.duration_tick_ms)
    }
}

// ----------------------------------------------------------------------------
// Notification Configuration
// ----------------------------------------------------------------------------

/// Notification log settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Oldest entries are dropped beyond this many
    pub max_entries: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { max_entries: 200 }
    }
}

// ----------------------------------------------------------------------------
// Top-level Configuration
// ----------------------------------------------------------------------------

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerlineConfig {
    pub channels: ChannelConfig,
    pub broker: BrokerConfig,
    pub messaging: MessagingConfig,
    pub call: CallConfig,
    pub notifications: NotificationConfig,
}

impl PeerlineConfig {
    /// Fast timings for tests against the simulated network
    pub fn testing() -> Self {
        Self {
            channels: ChannelConfig::testing(),
            broker: BrokerConfig {
                max_reconnect_attempts: 3,
                reconnect_backoff_ms: 10,
                registration_timeout_ms: 1_000,
            },
            messaging: MessagingConfig {
                channel_open_timeout_ms: 500,
                channel_linger_ms: 20,
            },
            call: CallConfig {
                duration_tick_ms: 50,
            },
            notifications: NotificationConfig::default(),
        }
    }

    /// Shorter recovery windows for local networks
    pub fn low_latency() -> Self {
        Self {
            broker: BrokerConfig {
                max_reconnect_attempts: 5,
                reconnect_backoff_ms: 200,
                registration_timeout_ms: 3_000,
            },
            messaging: MessagingConfig {
                channel_open_timeout_ms: 2_000,
                channel_linger_ms: 500,
            },
            ..Self::default()
        }
    }

    /// Reject settings the runtime cannot operate with
    pub fn validate(&self) -> PeerlineResult<()> {
        let channels = &self.channels;
        if channels.command_buffer_size == 0
            || channels.event_buffer_size == 0
            || channels.effect_buffer_size == 0
            || channels.app_event_buffer_size == 0
        {
            return Err(PeerlineError::configuration(
                "channel buffer sizes must be non-zero",
            ));
        }
        if self.call.duration_tick_ms == 0 {
            return Err(PeerlineError::configuration(
                "call.duration_tick_ms must be non-zero",
            ));
        }
        if self.broker.registration_timeout_ms == 0 {
            return Err(PeerlineError::configuration(
                "broker.registration_timeout_ms must be non-zero",
            ));
        }
        Ok(())
    }
}
