//! Core Logic State Management
//!
//! Contains the core application state and statistics.

use std::sync::Arc;

use peerline_core::{ContactDirectory, DownloadedFile, LocalAddress, TimeSource, Timestamp};

use crate::{
    fanout::NotificationLog,
    managers::{CallSessionManager, MessagingChannelManager, PeerConnectionBroker},
};

// ----------------------------------------------------------------------------
// Core Logic State
// ----------------------------------------------------------------------------

/// Core application state owned by the Core Logic task
pub struct CoreState {
    /// Registration and connection status
    pub broker: PeerConnectionBroker,
    /// The single call session
    pub calls: CallSessionManager,
    /// Per-peer chat logs
    pub messaging: MessagingChannelManager,
    /// Notifications shown to the user, newest first
    pub notifications: NotificationLog,
    /// Files reported by the browser surface, newest first
    pub downloads: Vec<DownloadedFile>,
    /// Display name lookup
    pub contacts: Arc<dyn ContactDirectory>,
    /// Wall clock
    pub clock: Arc<dyn TimeSource>,
    /// Statistics
    pub stats: CoreStats,
}

impl CoreState {
    pub fn new(
        broker: PeerConnectionBroker,
        calls: CallSessionManager,
        notifications: NotificationLog,
        contacts: Arc<dyn ContactDirectory>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            broker,
            calls,
            messaging: MessagingChannelManager::new(),
            notifications,
            downloads: Vec::new(),
            contacts,
            clock,
            stats: CoreStats::default(),
        }
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn resolve_name(&self, address: &LocalAddress) -> Option<String> {
        self.contacts.resolve_name(address)
    }
}

/// Core task statistics
#[derive(Debug, Default, Clone)]
pub struct CoreStats {
    pub commands_processed: u64,
    pub events_processed: u64,
    pub effects_generated: u64,
    pub app_events_generated: u64,
    pub calls_rejected_busy: u64,
    pub stale_events_dropped: u64,
}
