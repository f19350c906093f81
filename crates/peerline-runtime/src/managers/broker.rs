//! Peer Connection Broker
//!
//! Owns the single registration with the rendezvous service and the
//! connection status shown to the user. Every registration attempt gets a new
//! generation; outcomes reported for an older generation are stale and ignored.
//!
//! Status transitions:
//!
//! ```text
//! start/restart/collision ──► Connecting ──opened──► Connected
//!                                  │                     │
//!                               failed               disconnected
//!                                  ▼                     ▼
//!                                Error ◄──exhausted── Disconnected ──resumed──► Connected
//! ```
//!
//! A registration whose inbound stream ends cannot be resumed; it is replaced
//! by a fresh registration under the same address.

use tracing::{debug, info, warn};

use peerline_core::{
    AppEvent, BrokerConfig, ConnectionStatus, Effect, Generation, LocalAddress,
};

use super::{address::AddressRegistry, Outcome};

#[derive(Debug)]
pub struct PeerConnectionBroker {
    registry: AddressRegistry,
    config: BrokerConfig,
    status: ConnectionStatus,
    generation: Generation,
    address: Option<LocalAddress>,
    identity_confirmed: bool,
    reconnect_attempts: u32,
}

impl PeerConnectionBroker {
    pub fn new(registry: AddressRegistry, config: BrokerConfig) -> Self {
        Self {
            registry,
            config,
            status: ConnectionStatus::Disconnected,
            generation: 0,
            address: None,
            identity_confirmed: false,
            reconnect_attempts: 0,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// Address of the current registration attempt
    pub fn address(&self) -> Option<&LocalAddress> {
        self.address.as_ref()
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    /// Register under the registry's address
    pub fn start(&mut self) -> Outcome {
        let address = self.registry.acquire_address();
        self.begin(address)
    }

    /// Full restart requested by the user; keeps the cached address
    pub fn restart(&mut self) -> Outcome {
        info!("Restarting broker registration");
        self.start()
    }

    fn begin(&mut self, address: LocalAddress) -> Outcome {
        self.generation += 1;
        self.identity_confirmed = false;
        self.reconnect_attempts = 0;
        self.address = Some(address.clone());
        debug!(generation = self.generation, address = %address, "Registering");

        let outcome = Outcome::new().effect(Effect::Register {
            generation: self.generation,
            address,
        });
        outcome.merge(self.set_status(ConnectionStatus::Connecting))
    }

    fn is_stale(&self, generation: Generation, what: &str) -> bool {
        if generation != self.generation {
            warn!(
                generation,
                current = self.generation,
                "Dropping stale {} report",
                what
            );
            return true;
        }
        false
    }

    fn set_status(&mut self, status: ConnectionStatus) -> Outcome {
        if self.status == status {
            return Outcome::new();
        }
        debug!("Connection status {} -> {}", self.status, status);
        self.status = status;
        Outcome::new().event(AppEvent::ConnectionStatusChanged {
            status,
            address: self.address.clone(),
        })
    }

    /// Registration (or a resume) succeeded
    pub fn on_registration_opened(&mut self, generation: Generation) -> Outcome {
        if self.is_stale(generation, "registration") {
            return Outcome::new();
        }
        self.reconnect_attempts = 0;
        let mut outcome = self.set_status(ConnectionStatus::Connected);
        if !self.identity_confirmed {
            if let Some(address) = &self.address {
                info!(address = %address, "Registered with rendezvous service");
                self.identity_confirmed = true;
                outcome = outcome.event(AppEvent::IdentityConfirmed {
                    address: address.clone(),
                });
            }
        }
        outcome
    }

    /// The address is in use elsewhere; retry silently under a new one
    pub fn on_address_taken(&mut self, generation: Generation) -> Outcome {
        if self.is_stale(generation, "collision") {
            return Outcome::new();
        }
        let address = self.registry.on_collision();
        info!(address = %address, "Address taken, retrying with a new one");
        self.begin(address)
    }

    pub fn on_registration_failed(&mut self, generation: Generation, reason: &str) -> Outcome {
        if self.is_stale(generation, "registration failure") {
            return Outcome::new();
        }
        warn!(generation, "Registration failed: {}", reason);
        self.set_status(ConnectionStatus::Error)
    }

    /// The live registration dropped; resume it automatically
    pub fn on_disconnected(&mut self, generation: Generation, reason: &str) -> Outcome {
        if self.is_stale(generation, "disconnect") {
            return Outcome::new();
        }
        if self.status == ConnectionStatus::Error {
            return Outcome::new();
        }
        info!(generation, "Disconnected from rendezvous service: {}", reason);
        let outcome = self.set_status(ConnectionStatus::Disconnected);
        outcome.merge(self.schedule_reconnect())
    }

    /// The inbound stream ended; register again from scratch
    pub fn on_registration_lost(&mut self, generation: Generation, reason: &str) -> Outcome {
        if self.is_stale(generation, "registration loss") {
            return Outcome::new();
        }
        warn!(generation, "Registration lost: {}", reason);
        let confirmed = self.identity_confirmed;
        let outcome = self.set_status(ConnectionStatus::Disconnected);
        let outcome = outcome.merge(self.start());
        // Same address, so the identity already shown stays valid
        self.identity_confirmed = confirmed;
        outcome
    }

    pub fn on_reconnect_failed(&mut self, generation: Generation, reason: &str) -> Outcome {
        if self.is_stale(generation, "reconnect failure") {
            return Outcome::new();
        }
        debug!(
            generation,
            attempt = self.reconnect_attempts,
            "Reconnect attempt failed: {}",
            reason
        );
        self.schedule_reconnect()
    }

    fn schedule_reconnect(&mut self) -> Outcome {
        let Some(address) = self.address.clone() else {
            return self.set_status(ConnectionStatus::Error);
        };
        if self.reconnect_attempts >= self.config.max_reconnect_attempts {
            warn!(
                attempts = self.reconnect_attempts,
                "Giving up on automatic reconnection"
            );
            return self.set_status(ConnectionStatus::Error);
        }
        self.reconnect_attempts += 1;
        Outcome::new().effect(Effect::Reconnect {
            generation: self.generation,
            address,
            delay: self.config.reconnect_delay(self.reconnect_attempts),
        })
    }
}
