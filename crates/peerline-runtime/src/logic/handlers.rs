//! Core Logic Command and Event Handlers
//!
//! Contains all the command and event handling logic for the Core Logic task.
//! Handlers route into the managers and return the effects and app events to
//! publish; they never perform I/O themselves.

use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use peerline_core::{
    AppEvent, CallControl, CallId, CallSignal, CaptureError, DownloadedFile, Effect, Generation,
    LocalAddress, LocalMedia, PeerlineResult, TransportError,
};

use super::state::CoreState;

/// Effects for the broker task and events for the UI
pub type Handled = PeerlineResult<(Vec<Effect>, Vec<AppEvent>)>;

// ----------------------------------------------------------------------------
// Commands
// ----------------------------------------------------------------------------

/// Handlers for commands from the UI
pub struct CommandHandlers;

impl CommandHandlers {
    pub fn handle_dial(state: &mut CoreState, target: LocalAddress) -> Handled {
        let display_name = state.resolve_name(&target);
        let connected = state.broker.is_connected();
        Ok(state.calls.dial(target, display_name, connected).into_parts())
    }

    pub fn handle_accept_incoming(state: &mut CoreState) -> Handled {
        Ok(state.calls.accept_incoming().into_parts())
    }

    pub fn handle_hang_up(state: &mut CoreState) -> Handled {
        Ok(state.calls.hang_up().into_parts())
    }

    pub fn handle_toggle_mute(state: &mut CoreState) -> Handled {
        Ok(state.calls.toggle_mute().into_parts())
    }

    pub fn handle_toggle_record(state: &mut CoreState) -> Handled {
        let now = state.now();
        Ok(state.calls.toggle_record(now).into_parts())
    }

    pub fn handle_send_message(state: &mut CoreState, target: LocalAddress, text: String) -> Handled {
        let now = state.now();
        Ok(state.messaging.send(target, text, now)?.into_parts())
    }

    /// Full restart: end any call, then register from scratch
    pub fn handle_reconnect(state: &mut CoreState) -> Handled {
        let ended = state.calls.hang_up();
        Ok(ended.merge(state.broker.restart()).into_parts())
    }

    pub fn handle_mark_notification_read(state: &mut CoreState, id: Uuid) -> Handled {
        if !state.notifications.mark_read(id) {
            debug!(%id, "No notification to mark read");
            return Ok((Vec::new(), Vec::new()));
        }
        Ok((Vec::new(), vec![AppEvent::NotificationRead { id }]))
    }

    pub fn handle_clear_messages(state: &mut CoreState) -> Handled {
        Ok(state.messaging.clear().into_parts())
    }

    pub fn handle_record_download(
        state: &mut CoreState,
        name: String,
        kind: String,
        size_bytes: u64,
    ) -> Handled {
        let file = DownloadedFile {
            id: Uuid::new_v4(),
            name,
            kind,
            size_bytes,
        };
        state.downloads.insert(0, file.clone());
        Ok((Vec::new(), vec![AppEvent::FileDownloaded { file }]))
    }

    pub fn handle_get_status(state: &mut CoreState) -> Handled {
        let report = AppEvent::StatusReport {
            address: state.broker.address().cloned(),
            status: state.broker.status(),
            call: state.calls.snapshot(),
            unread_notifications: state.notifications.unread_count(),
            recordings: state.calls.recordings().len(),
        };
        Ok((Vec::new(), vec![report]))
    }

    pub fn handle_shutdown(state: &mut CoreState) -> Handled {
        info!("Shutting down: releasing call resources");
        let ended = state.calls.shutdown();
        Ok(ended.effect(Effect::Shutdown).into_parts())
    }
}

// ----------------------------------------------------------------------------
// Events
// ----------------------------------------------------------------------------

/// Handlers for events from the broker task
pub struct EventHandlers;

impl EventHandlers {
    pub fn handle_registration_opened(state: &mut CoreState, generation: Generation) -> Handled {
        Ok(state.broker.on_registration_opened(generation).into_parts())
    }

    pub fn handle_address_taken(state: &mut CoreState, generation: Generation) -> Handled {
        Ok(state.broker.on_address_taken(generation).into_parts())
    }

    pub fn handle_registration_failed(
        state: &mut CoreState,
        generation: Generation,
        reason: String,
    ) -> Handled {
        Ok(state
            .broker
            .on_registration_failed(generation, &reason)
            .into_parts())
    }

    pub fn handle_disconnected(state: &mut CoreState, generation: Generation, reason: String) -> Handled {
        Ok(state.broker.on_disconnected(generation, &reason).into_parts())
    }

    pub fn handle_registration_lost(
        state: &mut CoreState,
        generation: Generation,
        reason: String,
    ) -> Handled {
        Ok(state
            .broker
            .on_registration_lost(generation, &reason)
            .into_parts())
    }

    pub fn handle_reconnect_failed(
        state: &mut CoreState,
        generation: Generation,
        reason: String,
    ) -> Handled {
        Ok(state
            .broker
            .on_reconnect_failed(generation, &reason)
            .into_parts())
    }

    /// Broker boundary: a second call while busy is closed without a trace
    pub fn handle_incoming_call(
        state: &mut CoreState,
        generation: Generation,
        call_id: CallId,
        from: LocalAddress,
        control: Arc<dyn CallControl>,
    ) -> Handled {
        if generation != state.broker.generation() {
            warn!(call_id = %call_id, generation, "Closing call from a replaced registration");
            state.stats.stale_events_dropped += 1;
            control.close();
            return Ok((Vec::new(), Vec::new()));
        }
        if state.calls.is_busy() {
            info!(call_id = %call_id, from = %from, "Busy, rejecting incoming call");
            state.stats.calls_rejected_busy += 1;
            control.close();
            return Ok((Vec::new(), Vec::new()));
        }
        let display_name = state.resolve_name(&from);
        Ok(state
            .calls
            .on_incoming_call(call_id, from, display_name, control)
            .into_parts())
    }

    pub fn handle_inbound_data(state: &mut CoreState, from: LocalAddress, payload: Vec<u8>) -> Handled {
        let sender_name = state.resolve_name(&from);
        let now = state.now();
        Ok(state
            .messaging
            .on_inbound(from, &payload, sender_name, now)
            .into_parts())
    }

    pub fn handle_media_captured(state: &mut CoreState, call_id: CallId, media: LocalMedia) -> Handled {
        Ok(state.calls.on_media_captured(call_id, media).into_parts())
    }

    pub fn handle_capture_failed(
        state: &mut CoreState,
        call_id: CallId,
        error: CaptureError,
    ) -> Handled {
        Ok(state.calls.on_capture_failed(call_id, &error).into_parts())
    }

    pub fn handle_call_placed(
        state: &mut CoreState,
        call_id: CallId,
        control: Arc<dyn CallControl>,
    ) -> Handled {
        Ok(state.calls.on_call_placed(call_id, control).into_parts())
    }

    pub fn handle_call_failed(state: &mut CoreState, call_id: CallId, error: TransportError) -> Handled {
        Ok(state.calls.on_call_failed(call_id, &error).into_parts())
    }

    pub fn handle_call_signal(state: &mut CoreState, call_id: CallId, signal: CallSignal) -> Handled {
        let now = state.now();
        Ok(state.calls.on_call_signal(call_id, signal, now).into_parts())
    }

    pub fn handle_delivery_failed(
        state: &mut CoreState,
        target: LocalAddress,
        error: TransportError,
    ) -> Handled {
        Ok(state
            .messaging
            .on_delivery_failed(target, &error)
            .into_parts())
    }
}
