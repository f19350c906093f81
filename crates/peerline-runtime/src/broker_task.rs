//! Broker Task
//!
//! Executes effects against the rendezvous service and the audio device, and
//! reports every outcome back to the Core Logic task as an [`Event`].
//!
//! The main loop never awaits an event send: each effect that does I/O runs
//! in its own spawned task. Core Logic may therefore block on a full effect
//! channel without deadlocking against a full event channel.

use std::sync::Arc;
use tokio::{
    sync::mpsc::{error::SendError, UnboundedReceiver},
    task::{JoinHandle, JoinSet},
};
use tracing::{debug, error, info, warn};

use peerline_core::{
    BrokerConfig, CallId, CallSignal, Effect, EffectReceiver, Event, EventSender, Generation,
    Inbound, IncomingCall, LocalAddress, MediaDevices, MessagingConfig, PeerlineResult,
    RegistrationError, Rendezvous, TransportError,
};

// ----------------------------------------------------------------------------
// Broker Task
// ----------------------------------------------------------------------------

pub struct BrokerTask {
    rendezvous: Arc<dyn Rendezvous>,
    media: Arc<dyn MediaDevices>,
    effect_receiver: EffectReceiver,
    event_sender: EventSender,
    broker_config: BrokerConfig,
    messaging_config: MessagingConfig,
    /// Registration attempt and its inbound pump
    registration: Option<JoinHandle<()>>,
    /// Pending resume of a dropped registration
    reconnect: Option<JoinHandle<()>>,
    /// Address of the last registration request
    current_address: Option<LocalAddress>,
    /// Captures, dials, answers and chat deliveries in flight
    operations: JoinSet<()>,
    running: bool,
}

impl BrokerTask {
    pub fn new(
        rendezvous: Arc<dyn Rendezvous>,
        media: Arc<dyn MediaDevices>,
        effect_receiver: EffectReceiver,
        event_sender: EventSender,
        broker_config: BrokerConfig,
        messaging_config: MessagingConfig,
    ) -> Self {
        Self {
            rendezvous,
            media,
            effect_receiver,
            event_sender,
            broker_config,
            messaging_config,
            registration: None,
            reconnect: None,
            current_address: None,
            operations: JoinSet::new(),
            running: true,
        }
    }

    pub async fn run(&mut self) -> PeerlineResult<()> {
        info!("Broker task starting");

        while self.running {
            tokio::select! {
                effect = self.effect_receiver.recv() => {
                    match effect {
                        Some(effect) => self.handle_effect(effect).await,
                        None => {
                            info!("Effect channel closed, stopping broker task");
                            self.shutdown().await;
                        }
                    }
                }

                Some(finished) = self.operations.join_next(), if !self.operations.is_empty() => {
                    if let Err(e) = finished {
                        if e.is_panic() {
                            error!("Broker operation panicked: {}", e);
                        }
                    }
                }
            }
        }

        info!("Broker task stopped");
        Ok(())
    }

    async fn handle_effect(&mut self, effect: Effect) {
        match effect {
            Effect::Register {
                generation,
                address,
            } => self.register(generation, address),
            Effect::Reconnect {
                generation,
                address,
                delay,
            } => {
                if let Some(previous) = self.reconnect.take() {
                    previous.abort();
                }
                let rendezvous = self.rendezvous.clone();
                let events = self.event_sender.clone();
                let config = self.broker_config.clone();
                self.reconnect = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    resume(rendezvous.as_ref(), &events, &config, generation, &address).await;
                }));
            }
            Effect::CaptureAudio { call_id } => {
                let media = self.media.clone();
                let events = self.event_sender.clone();
                self.operations.spawn(async move {
                    let event = match media.capture_audio().await {
                        Ok(media) => Event::MediaCaptured { call_id, media },
                        Err(error) => Event::CaptureFailed { call_id, error },
                    };
                    // Nobody will own the tracks if the core is gone
                    if let Err(SendError(Event::MediaCaptured { media, .. })) =
                        events.send(event).await
                    {
                        media.release();
                    }
                });
            }
            Effect::PlaceCall {
                call_id,
                target,
                media,
            } => {
                let rendezvous = self.rendezvous.clone();
                let events = self.event_sender.clone();
                self.operations.spawn(async move {
                    match rendezvous.dial(&target, &media).await {
                        Ok(handle) => {
                            debug!(call_id = %call_id, target = %target, "Call placed");
                            let placed = Event::CallPlaced {
                                call_id,
                                control: handle.control,
                            };
                            if let Err(SendError(Event::CallPlaced { control, .. })) =
                                events.send(placed).await
                            {
                                control.close();
                                return;
                            }
                            forward_signals(call_id, handle.signals, events).await;
                        }
                        Err(error) => {
                            post(&events, Event::CallFailed { call_id, error }).await;
                        }
                    }
                });
            }
            Effect::AnswerCall {
                call_id,
                control,
                media,
            } => {
                let events = self.event_sender.clone();
                self.operations.spawn(async move {
                    if let Err(error) = control.answer(&media) {
                        post(&events, Event::CallFailed { call_id, error }).await;
                    }
                });
            }
            Effect::SendChat { target, payload } => {
                let rendezvous = self.rendezvous.clone();
                let events = self.event_sender.clone();
                let config = self.messaging_config.clone();
                self.operations.spawn(async move {
                    if let Err(error) = deliver(rendezvous.as_ref(), &target, &payload, &config).await {
                        post(&events, Event::DeliveryFailed { target, error }).await;
                    }
                });
            }
            Effect::Shutdown => self.shutdown().await,
        }
    }

    /// Replace the current registration with one under `address`
    fn register(&mut self, generation: Generation, address: LocalAddress) {
        self.abort_registration();
        let previous = self.current_address.replace(address.clone());

        let rendezvous = self.rendezvous.clone();
        let events = self.event_sender.clone();
        let config = self.broker_config.clone();
        self.registration = Some(tokio::spawn(async move {
            if let Some(previous) = previous {
                rendezvous.unregister(&previous).await;
            }
            let inbound = match tokio::time::timeout(
                config.registration_timeout(),
                rendezvous.register(&address),
            )
            .await
            {
                Ok(Ok(inbound)) => inbound,
                Ok(Err(RegistrationError::AddressTaken { .. })) => {
                    post(&events, Event::AddressTaken { generation }).await;
                    return;
                }
                Ok(Err(e)) => {
                    post(
                        &events,
                        Event::RegistrationFailed {
                            generation,
                            reason: e.to_string(),
                        },
                    )
                    .await;
                    return;
                }
                Err(_) => {
                    let e = RegistrationError::Timeout {
                        duration_ms: config.registration_timeout_ms,
                    };
                    post(
                        &events,
                        Event::RegistrationFailed {
                            generation,
                            reason: e.to_string(),
                        },
                    )
                    .await;
                    return;
                }
            };

            if post(&events, Event::RegistrationOpened { generation }).await {
                pump_inbound(generation, inbound, events).await;
            }
        }));
    }

    fn abort_registration(&mut self) {
        if let Some(task) = self.registration.take() {
            task.abort();
        }
        if let Some(task) = self.reconnect.take() {
            task.abort();
        }
    }

    async fn shutdown(&mut self) {
        info!("Broker task shutting down");
        self.abort_registration();
        self.operations.abort_all();
        if let Some(address) = self.current_address.take() {
            self.rendezvous.unregister(&address).await;
        }
        self.running = false;
    }
}

impl Drop for BrokerTask {
    fn drop(&mut self) {
        self.abort_registration();
    }
}

// ----------------------------------------------------------------------------
// Operations
// ----------------------------------------------------------------------------

/// Send `event` to Core Logic; false once it has gone away
async fn post(events: &EventSender, event: Event) -> bool {
    let kind = event.kind();
    if events.send(event).await.is_err() {
        debug!(kind, "Event channel closed, dropping event");
        return false;
    }
    true
}

async fn resume(
    rendezvous: &dyn Rendezvous,
    events: &EventSender,
    config: &BrokerConfig,
    generation: Generation,
    address: &LocalAddress,
) {
    let event = match tokio::time::timeout(config.registration_timeout(), rendezvous.reconnect(address)).await {
        Ok(Ok(())) => Event::RegistrationOpened { generation },
        Ok(Err(e)) => Event::ReconnectFailed {
            generation,
            reason: e.to_string(),
        },
        Err(_) => Event::ReconnectFailed {
            generation,
            reason: RegistrationError::Timeout {
                duration_ms: config.registration_timeout_ms,
            }
            .to_string(),
        },
    };
    post(events, event).await;
}

/// Relay everything arriving on an open registration
async fn pump_inbound(
    generation: Generation,
    mut inbound: tokio::sync::mpsc::Receiver<Inbound>,
    events: EventSender,
) {
    // Forwarders die with the registration that produced their calls
    let mut forwarders = JoinSet::new();
    let mut live_calls: Vec<CallId> = Vec::new();

    loop {
        tokio::select! {
            item = inbound.recv() => {
                let Some(item) = item else {
                    warn!(generation, live_calls = live_calls.len(), "Inbound stream closed");
                    forwarders.abort_all();
                    for call_id in live_calls {
                        post(&events, Event::CallSignal {
                            call_id,
                            signal: CallSignal::Closed,
                        })
                        .await;
                    }
                    post(&events, Event::RegistrationLost {
                        generation,
                        reason: "inbound stream closed".to_string(),
                    })
                    .await;
                    return;
                };
                let delivered = match item {
                    Inbound::Call(IncomingCall { from, handle }) => {
                        let call_id = CallId::new();
                        debug!(call_id = %call_id, from = %from, "Incoming call");
                        let delivered = post(&events, Event::IncomingCall {
                            generation,
                            call_id,
                            from,
                            control: handle.control.clone(),
                        })
                        .await;
                        if delivered {
                            live_calls.push(call_id);
                            let events = events.clone();
                            forwarders.spawn(async move {
                                forward_signals(call_id, handle.signals, events).await;
                                call_id
                            });
                        } else {
                            handle.control.close();
                        }
                        delivered
                    }
                    Inbound::Data { from, payload } => {
                        post(&events, Event::InboundData { from, payload }).await
                    }
                    Inbound::Disconnected { reason } => {
                        post(&events, Event::Disconnected { generation, reason }).await
                    }
                };
                if !delivered {
                    return;
                }
            }

            Some(finished) = forwarders.join_next(), if !forwarders.is_empty() => {
                if let Ok(call_id) = finished {
                    live_calls.retain(|live| *live != call_id);
                }
            }
        }
    }
}

/// Relay one call's signals until it ends
///
/// Only the first remote stream is reported and nothing follows a terminal
/// signal. A stream that ends without one is reported as closed.
async fn forward_signals(
    call_id: CallId,
    mut signals: UnboundedReceiver<CallSignal>,
    events: EventSender,
) {
    let mut remote_seen = false;
    while let Some(signal) = signals.recv().await {
        if matches!(signal, CallSignal::RemoteStream(_)) {
            if remote_seen {
                continue;
            }
            remote_seen = true;
        }
        let terminal = signal.is_terminal();
        if !post(&events, Event::CallSignal { call_id, signal }).await || terminal {
            return;
        }
    }
    post(
        &events,
        Event::CallSignal {
            call_id,
            signal: CallSignal::Closed,
        },
    )
    .await;
}

/// Open a channel, write one payload, let it drain, then close
async fn deliver(
    rendezvous: &dyn Rendezvous,
    target: &LocalAddress,
    payload: &[u8],
    config: &MessagingConfig,
) -> Result<(), TransportError> {
    let mut channel = tokio::time::timeout(config.open_timeout(), rendezvous.open_channel(target))
        .await
        .map_err(|_| TransportError::Timeout {
            duration_ms: config.channel_open_timeout_ms,
        })??;

    let written = channel.write(payload).await;
    if written.is_ok() {
        tokio::time::sleep(config.linger()).await;
    } else {
        warn!(target = %target, "Chat write failed");
    }
    channel.close().await;
    written
}
