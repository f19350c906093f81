//! Runtime Builder API
//!
//! Provides a builder-style API for consumers (CLI, tests) to plug in the
//! rendezvous service, the audio device and the contact directory, and get
//! back command and app-event handles to a running engine.

use core::time::Duration;
use rand::{rngs::StdRng, SeedableRng};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use peerline_core::{
    channel::{
        create_app_event_channel, create_command_channel, create_effect_channel,
        create_event_channel,
    },
    AppEventReceiver, Command, CommandSender, ContactDirectory, LocalAddress, MediaDevices,
    NoContacts, PeerlineConfig, PeerlineError, PeerlineResult, Rendezvous, SystemTimeSource,
    TimeSource,
};

use crate::{
    broker_task::BrokerTask,
    fanout::NotificationLog,
    logic::{CoreLogicTask, CoreState},
    managers::{AddressRegistry, CallSessionManager, PeerConnectionBroker},
};

/// How long `shutdown` waits for each task
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

// ----------------------------------------------------------------------------
// Runtime Builder
// ----------------------------------------------------------------------------

/// Builder for a Peerline engine: one core logic task plus one broker task
pub struct RuntimeBuilder {
    config: PeerlineConfig,
    rendezvous: Option<Arc<dyn Rendezvous>>,
    media: Option<Arc<dyn MediaDevices>>,
    contacts: Arc<dyn ContactDirectory>,
    clock: Arc<dyn TimeSource>,
    seed: Option<u64>,
    cached_address: Option<LocalAddress>,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config: PeerlineConfig::default(),
            rendezvous: None,
            media: None,
            contacts: Arc::new(NoContacts),
            clock: Arc::new(SystemTimeSource),
            seed: None,
            cached_address: None,
        }
    }

    /// Set the engine configuration
    pub fn with_config(mut self, config: PeerlineConfig) -> Self {
        self.config = config;
        self
    }

    /// Connection to the rendezvous service (required)
    pub fn with_rendezvous(mut self, rendezvous: Arc<dyn Rendezvous>) -> Self {
        self.rendezvous = Some(rendezvous);
        self
    }

    /// Audio capture device (required)
    pub fn with_media_devices(mut self, media: Arc<dyn MediaDevices>) -> Self {
        self.media = Some(media);
        self
    }

    pub fn with_contacts(mut self, contacts: Arc<dyn ContactDirectory>) -> Self {
        self.contacts = contacts;
        self
    }

    pub fn with_time_source(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }

    /// Make address draws and recording sizes reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Reuse an address issued earlier in this session
    pub fn with_cached_address(mut self, address: LocalAddress) -> Self {
        self.cached_address = Some(address);
        self
    }

    /// Build and start the runtime
    pub async fn build_and_start(self) -> PeerlineResult<RuntimeHandle> {
        info!("Building Peerline runtime");
        self.config.validate()?;

        let rendezvous = self
            .rendezvous
            .ok_or_else(|| PeerlineError::configuration("no rendezvous service configured"))?;
        let media = self
            .media
            .ok_or_else(|| PeerlineError::configuration("no media devices configured"))?;

        let (mut registry, calls) = match self.seed {
            Some(seed) => (
                AddressRegistry::with_rng(Box::new(StdRng::seed_from_u64(seed))),
                CallSessionManager::with_rng(Box::new(StdRng::seed_from_u64(
                    seed.wrapping_add(1),
                ))),
            ),
            None => (AddressRegistry::new(), CallSessionManager::new()),
        };
        if let Some(address) = self.cached_address {
            registry = registry.with_cached(address);
        }

        let channels = &self.config.channels;
        let (command_sender, command_receiver) = create_command_channel(channels);
        let (app_event_sender, app_event_receiver) = create_app_event_channel(channels);
        let (event_sender, event_receiver) = create_event_channel(channels);
        let (effect_sender, effect_receiver) = create_effect_channel(channels);

        let state = CoreState::new(
            PeerConnectionBroker::new(registry, self.config.broker.clone()),
            calls,
            NotificationLog::new(self.config.notifications.max_entries),
            self.contacts,
            self.clock,
        );
        let mut core = CoreLogicTask::new(
            state,
            command_receiver,
            event_receiver,
            effect_sender,
            app_event_sender,
            &self.config.call,
        );
        let mut broker = BrokerTask::new(
            rendezvous,
            media,
            effect_receiver,
            event_sender,
            self.config.broker.clone(),
            self.config.messaging.clone(),
        );

        let broker_handle = tokio::spawn(async move { broker.run().await });
        let core_handle = tokio::spawn(async move { core.run().await });

        info!("Peerline runtime started successfully");

        Ok(RuntimeHandle {
            command_sender,
            app_event_receiver: Some(app_event_receiver),
            core_handle: Some(core_handle),
            broker_handle: Some(broker_handle),
            running: true,
        })
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------------
// Runtime Handle
// ----------------------------------------------------------------------------

/// Handle to a running Peerline runtime instance
pub struct RuntimeHandle {
    command_sender: CommandSender,
    app_event_receiver: Option<AppEventReceiver>,
    core_handle: Option<JoinHandle<PeerlineResult<()>>>,
    broker_handle: Option<JoinHandle<PeerlineResult<()>>>,
    running: bool,
}

impl RuntimeHandle {
    /// Get a command sender for sending commands to the runtime
    pub fn command_sender(&self) -> CommandSender {
        self.command_sender.clone()
    }

    /// Take the app event receiver (can only be called once)
    pub fn take_app_event_receiver(&mut self) -> Option<AppEventReceiver> {
        self.app_event_receiver.take()
    }

    /// Send a command to the runtime
    pub async fn send_command(&self, command: Command) -> PeerlineResult<()> {
        self.command_sender
            .send(command)
            .await
            .map_err(|_| PeerlineError::channel("Failed to send command to runtime"))
    }

    /// Check if the runtime is still running
    pub fn is_running(&self) -> bool {
        self.running
            && self
                .core_handle
                .as_ref()
                .is_some_and(|h| !h.is_finished())
    }

    /// Wait for the core logic task to complete
    pub async fn wait(&mut self) -> PeerlineResult<()> {
        let Some(handle) = self.core_handle.take() else {
            return Ok(());
        };
        let result = join(handle, "Core logic").await;
        if let Some(broker) = self.broker_handle.take() {
            join(broker, "Broker").await?;
        }
        self.running = false;
        result
    }

    /// Shutdown the runtime gracefully
    pub async fn shutdown(&mut self) -> PeerlineResult<()> {
        info!("Shutting down Peerline runtime");

        // The core may already have stopped on its own
        let _ = self.send_command(Command::Shutdown).await;

        let mut result = Ok(());
        for (handle, name) in [
            (self.core_handle.take(), "Core logic"),
            (self.broker_handle.take(), "Broker"),
        ] {
            let Some(mut handle) = handle else {
                continue;
            };
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, join(&mut handle, name)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("{} task ended with error: {}", name, e);
                    if result.is_ok() {
                        result = Err(e);
                    }
                }
                Err(_) => {
                    warn!("{} task did not stop in time, aborting", name);
                    handle.abort();
                }
            }
        }

        self.running = false;
        info!("Peerline runtime shut down");
        result
    }
}

async fn join<H>(handle: H, name: &str) -> PeerlineResult<()>
where
    H: core::future::Future<Output = Result<PeerlineResult<()>, tokio::task::JoinError>>,
{
    match handle.await {
        Ok(result) => result,
        Err(e) => Err(PeerlineError::channel(format!("{} task panicked: {}", name, e))),
    }
}

// ----------------------------------------------------------------------------
// Convenience Functions
// ----------------------------------------------------------------------------

/// Create a runtime with the fast testing configuration
pub async fn create_test_runtime(
    rendezvous: Arc<dyn Rendezvous>,
    media: Arc<dyn MediaDevices>,
) -> PeerlineResult<RuntimeHandle> {
    RuntimeBuilder::new()
        .with_config(PeerlineConfig::testing())
        .with_rendezvous(rendezvous)
        .with_media_devices(media)
        .build_and_start()
        .await
}
