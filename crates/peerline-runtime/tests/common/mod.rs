//! Shared fixtures for runtime integration tests

#![allow(dead_code)]

use std::sync::Arc;
use tokio::time::{timeout, Duration};

use peerline_core::{AppEventReceiver, CallSnapshot, CallStatus, ConnectionStatus};
use peerline_harness::{SimulatedMicrophone, SimulatedNetwork};
use peerline_runtime::{AppEvent, Command, LocalAddress, PeerlineConfig, RuntimeBuilder, RuntimeHandle};

const EVENT_TIMEOUT: Duration = Duration::from_secs(3);

/// Route engine logs through the test writer; repeated calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn addr(n: u32) -> LocalAddress {
    LocalAddress::from_number(n)
}

/// Builder wired to `network` with a cached address and a fixed seed
pub fn builder(network: &SimulatedNetwork, number: u32, mic: Arc<SimulatedMicrophone>) -> RuntimeBuilder {
    RuntimeBuilder::new()
        .with_config(PeerlineConfig::testing())
        .with_rendezvous(Arc::new(network.endpoint()))
        .with_media_devices(mic)
        .with_cached_address(addr(number))
        .with_seed(u64::from(number))
}

/// One running engine plus the UI end of its channels
pub struct TestPeer {
    pub runtime: RuntimeHandle,
    pub events: AppEventReceiver,
    pub mic: Arc<SimulatedMicrophone>,
}

impl TestPeer {
    /// Start without waiting for registration
    pub async fn start(builder: RuntimeBuilder, mic: Arc<SimulatedMicrophone>) -> Self {
        init_tracing();
        let mut runtime = builder.build_and_start().await.expect("Failed to start runtime");
        let events = runtime
            .take_app_event_receiver()
            .expect("Failed to get app event receiver");
        Self {
            runtime,
            events,
            mic,
        }
    }

    /// Start with a granting microphone and wait until registered
    pub async fn spawn(network: &SimulatedNetwork, number: u32) -> Self {
        Self::spawn_with_mic(network, number, SimulatedMicrophone::granting()).await
    }

    pub async fn spawn_with_mic(network: &SimulatedNetwork, number: u32, mic: SimulatedMicrophone) -> Self {
        let mic = Arc::new(mic);
        let mut peer = Self::start(builder(network, number, mic.clone()), mic).await;
        peer.identity().await;
        peer
    }

    pub async fn send(&self, command: Command) {
        self.runtime
            .send_command(command)
            .await
            .expect("Failed to send command");
    }

    /// Next app event matching `predicate`, skipping the rest
    pub async fn wait_for<F>(&mut self, mut predicate: F) -> AppEvent
    where
        F: FnMut(&AppEvent) -> bool,
    {
        let events = &mut self.events;
        timeout(EVENT_TIMEOUT, async move {
            loop {
                match events.recv().await {
                    Some(event) if predicate(&event) => return event,
                    Some(_) => continue,
                    None => panic!("app event channel closed"),
                }
            }
        })
        .await
        .expect("timed out waiting for app event")
    }

    pub async fn identity(&mut self) -> LocalAddress {
        match self
            .wait_for(|e| matches!(e, AppEvent::IdentityConfirmed { .. }))
            .await
        {
            AppEvent::IdentityConfirmed { address } => address,
            _ => unreachable!(),
        }
    }

    pub async fn connection_status(&mut self, status: ConnectionStatus) {
        self.wait_for(|e| {
            matches!(e, AppEvent::ConnectionStatusChanged { status: s, .. } if *s == status)
        })
        .await;
    }

    pub async fn call_status(&mut self, status: CallStatus) -> CallSnapshot {
        match self
            .wait_for(|e| {
                matches!(e, AppEvent::CallStateChanged { snapshot: Some(s) } if s.status == status)
            })
            .await
        {
            AppEvent::CallStateChanged {
                snapshot: Some(snapshot),
            } => snapshot,
            _ => unreachable!(),
        }
    }

    pub async fn call_ended(&mut self) {
        self.wait_for(|e| matches!(e, AppEvent::CallStateChanged { snapshot: None }))
            .await;
    }

    pub async fn notification(&mut self, title: &str) -> peerline_core::Notification {
        match self
            .wait_for(|e| matches!(e, AppEvent::Notification { notification } if notification.title == title))
            .await
        {
            AppEvent::Notification { notification } => notification,
            _ => unreachable!(),
        }
    }

    /// Ask for and return the next status report
    pub async fn status(&mut self) -> AppEvent {
        self.send(Command::GetStatus).await;
        self.wait_for(|e| matches!(e, AppEvent::StatusReport { .. }))
            .await
    }

    pub async fn shutdown(mut self) {
        self.runtime.shutdown().await.expect("Failed to shutdown");
    }
}
