//! Core Logic Task Implementation
//!
//! Contains the main CoreLogicTask struct and its coordination logic.

use core::time::Duration;
use tokio::{sync::mpsc::error::SendError, time::MissedTickBehavior};
use tracing::{debug, error, info, warn};

use peerline_core::{
    AppEvent, AppEventSender, CallConfig, Command, CommandReceiver, Effect, EffectSender, Event,
    EventReceiver, PeerlineError, PeerlineResult,
};

use super::handlers::{CommandHandlers, EventHandlers, Handled};
use super::state::{CoreState, CoreStats};
use crate::fanout::EventFanout;

// ----------------------------------------------------------------------------
// Core Logic Task
// ----------------------------------------------------------------------------

/// The Core Logic task that processes all commands and events
pub struct CoreLogicTask {
    /// Core application state (single owner)
    state: CoreState,
    /// Channel for receiving commands from the UI
    command_receiver: CommandReceiver,
    /// Channel for receiving events from the broker task
    event_receiver: EventReceiver,
    /// Channel for sending effects to the broker task
    effect_sender: EffectSender,
    /// Channel for sending app events to the UI
    app_event_sender: AppEventSender,
    /// Interval of the call duration ticker
    tick_interval: Duration,
    /// False once the UI dropped its app event receiver
    ui_attached: bool,
    /// Whether the task should continue running
    running: bool,
}

impl CoreLogicTask {
    /// Create a new Core Logic task
    pub fn new(
        state: CoreState,
        command_receiver: CommandReceiver,
        event_receiver: EventReceiver,
        effect_sender: EffectSender,
        app_event_sender: AppEventSender,
        call_config: &CallConfig,
    ) -> Self {
        Self {
            state,
            command_receiver,
            event_receiver,
            effect_sender,
            app_event_sender,
            tick_interval: call_config.duration_tick(),
            ui_attached: true,
            running: true,
        }
    }

    /// Run the main Core Logic task loop
    pub async fn run(&mut self) -> PeerlineResult<()> {
        info!("Core Logic task starting");
        let result = self.run_loop().await;
        self.drain_events().await;
        info!("Core Logic task stopped");
        result
    }

    async fn run_loop(&mut self) -> PeerlineResult<()> {
        let started = self.state.broker.start().into_parts();
        self.dispatch(started).await?;

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut events_open = true;

        while self.running {
            tokio::select! {
                // Process command from the UI
                command = self.command_receiver.recv() => {
                    match command {
                        Some(cmd) => {
                            debug!(?cmd, "Command received");
                            let result = self.process_command(cmd).await;
                            self.check(result, "command")?;
                        }
                        None => {
                            info!("Command channel closed, shutting down");
                            let result = self.process_command(Command::Shutdown).await;
                            self.check(result, "shutdown")?;
                        }
                    }
                }

                // Process event from the broker task
                event = self.event_receiver.recv(), if events_open => {
                    match event {
                        Some(evt) => {
                            debug!(kind = evt.kind(), "Event received");
                            let result = self.process_event(evt).await;
                            self.check(result, "event")?;
                        }
                        None => {
                            info!("Event channel closed");
                            events_open = false;
                        }
                    }
                }

                // Recompute the call duration
                _ = ticker.tick() => {
                    let now = self.state.now();
                    let ticked = self.state.calls.tick(now).into_parts();
                    self.dispatch(ticked).await?;
                }
            }
        }
        Ok(())
    }

    /// Release media and calls carried by events that were never processed
    async fn drain_events(&mut self) {
        self.event_receiver.close();
        let mut discarded = 0usize;
        while let Some(event) = self.event_receiver.recv().await {
            debug!(kind = event.kind(), "Discarding unprocessed event");
            event.discard();
            discarded += 1;
        }
        if discarded > 0 {
            info!(discarded, "Released resources of unprocessed events");
        }
    }

    /// Stop after fatal errors, log and continue otherwise
    fn check(&mut self, result: PeerlineResult<()>, what: &str) -> PeerlineResult<()> {
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.is_fatal() => {
                error!("Unrecoverable error processing {}, shutting down CoreLogicTask: {}", what, e);
                self.running = false;
                Err(e)
            }
            Err(e) => {
                warn!("Error processing {}: {}", what, e);
                Ok(())
            }
        }
    }

    /// Stop the Core Logic task
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn state(&self) -> &CoreState {
        &self.state
    }

    pub fn stats(&self) -> &CoreStats {
        &self.state.stats
    }

    /// Process a command and publish its effects and app events
    async fn process_command(&mut self, command: Command) -> PeerlineResult<()> {
        self.state.stats.commands_processed += 1;
        let state = &mut self.state;

        let handled: Handled = match command {
            Command::Dial { target } => CommandHandlers::handle_dial(state, target),
            Command::AcceptIncoming => CommandHandlers::handle_accept_incoming(state),
            Command::HangUp => CommandHandlers::handle_hang_up(state),
            Command::ToggleMute => CommandHandlers::handle_toggle_mute(state),
            Command::ToggleRecord => CommandHandlers::handle_toggle_record(state),
            Command::SendMessage { target, text } => {
                CommandHandlers::handle_send_message(state, target, text)
            }
            Command::Reconnect => CommandHandlers::handle_reconnect(state),
            Command::MarkNotificationRead { id } => {
                CommandHandlers::handle_mark_notification_read(state, id)
            }
            Command::ClearMessages => CommandHandlers::handle_clear_messages(state),
            Command::RecordDownload {
                name,
                kind,
                size_bytes,
            } => CommandHandlers::handle_record_download(state, name, kind, size_bytes),
            Command::GetStatus => CommandHandlers::handle_get_status(state),
            Command::Shutdown => {
                self.running = false;
                CommandHandlers::handle_shutdown(state)
            }
        };

        self.dispatch(handled?).await
    }

    /// Process an event from the broker task
    async fn process_event(&mut self, event: Event) -> PeerlineResult<()> {
        self.state.stats.events_processed += 1;
        let state = &mut self.state;

        let handled: Handled = match event {
            Event::RegistrationOpened { generation } => {
                EventHandlers::handle_registration_opened(state, generation)
            }
            Event::AddressTaken { generation } => EventHandlers::handle_address_taken(state, generation),
            Event::RegistrationFailed { generation, reason } => {
                EventHandlers::handle_registration_failed(state, generation, reason)
            }
            Event::Disconnected { generation, reason } => {
                EventHandlers::handle_disconnected(state, generation, reason)
            }
            Event::ReconnectFailed { generation, reason } => {
                EventHandlers::handle_reconnect_failed(state, generation, reason)
            }
            Event::RegistrationLost { generation, reason } => {
                EventHandlers::handle_registration_lost(state, generation, reason)
            }
            Event::IncomingCall {
                generation,
                call_id,
                from,
                control,
            } => EventHandlers::handle_incoming_call(state, generation, call_id, from, control),
            Event::InboundData { from, payload } => {
                EventHandlers::handle_inbound_data(state, from, payload)
            }
            Event::MediaCaptured { call_id, media } => {
                EventHandlers::handle_media_captured(state, call_id, media)
            }
            Event::CaptureFailed { call_id, error } => {
                EventHandlers::handle_capture_failed(state, call_id, error)
            }
            Event::CallPlaced { call_id, control } => {
                EventHandlers::handle_call_placed(state, call_id, control)
            }
            Event::CallFailed { call_id, error } => {
                EventHandlers::handle_call_failed(state, call_id, error)
            }
            Event::CallSignal { call_id, signal } => {
                EventHandlers::handle_call_signal(state, call_id, signal)
            }
            Event::DeliveryFailed { target, error } => {
                EventHandlers::handle_delivery_failed(state, target, error)
            }
        };

        self.dispatch(handled?).await
    }

    async fn dispatch(&mut self, (effects, app_events): (Vec<Effect>, Vec<AppEvent>)) -> PeerlineResult<()> {
        for effect in effects {
            self.send_effect(effect).await?;
        }
        for app_event in app_events {
            self.publish(app_event).await;
        }
        Ok(())
    }

    /// Send effect to the broker task
    async fn send_effect(&mut self, effect: Effect) -> PeerlineResult<()> {
        debug!(?effect, "Sending effect");
        if let Err(SendError(effect)) = self.effect_sender.send(effect).await {
            effect.discard();
            return Err(PeerlineError::channel("Effect channel closed"));
        }
        self.state.stats.effects_generated += 1;
        Ok(())
    }

    /// Send an app event, followed by the notification it produces
    async fn publish(&mut self, app_event: AppEvent) {
        let notification = EventFanout::translate(&app_event, self.state.now());
        self.send_app_event(app_event).await;

        if let Some(notification) = notification {
            self.state.notifications.push(notification.clone());
            self.send_app_event(AppEvent::Notification { notification })
                .await;
        }
    }

    /// Send app event to the UI; a departed UI is not an error
    async fn send_app_event(&mut self, app_event: AppEvent) {
        if !self.ui_attached {
            return;
        }
        if self.app_event_sender.send(app_event).await.is_err() {
            info!("App event receiver dropped, continuing without UI");
            self.ui_attached = false;
            return;
        }
        self.state.stats.app_events_generated += 1;
    }
}
