//! The demo world: one engine, a simulated network and a scripted echo peer

use std::sync::Arc;

use tracing::{debug, info};

use peerline_core::{AppEventReceiver, Contact, ContactBook, LocalAddress};
use peerline_harness::{EchoPeer, SimulatedMicrophone, SimulatedNetwork, SimulatedRendezvous};
use peerline_runtime::{RuntimeBuilder, RuntimeHandle};

use crate::config::CliAppConfig;
use crate::error::{CliError, Result};
use crate::repl::ReplCommand;

/// Options taken from the command line rather than the config file
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub cached_address: Option<LocalAddress>,
    pub seed: Option<u64>,
}

/// A running engine wired to an in-memory rendezvous network
pub struct PeerlineApp {
    network: SimulatedNetwork,
    endpoint: Arc<SimulatedRendezvous>,
    contacts: Arc<ContactBook>,
    runtime: RuntimeHandle,
    echo: EchoPeer,
    rings: u32,
}

impl PeerlineApp {
    /// Bring up the network, the echo peer and the engine
    pub async fn start(config: &CliAppConfig, options: LaunchOptions) -> Result<Self> {
        let network = SimulatedNetwork::new();
        let echo = EchoPeer::spawn(&network, config.echo_address()?).await?;
        info!("Echo peer listening on {}", echo.address());

        let contacts = Arc::new(ContactBook::new());
        for (name, address) in config.contacts()? {
            contacts.add(name, address);
        }

        let endpoint = Arc::new(network.endpoint());
        let mic = Arc::new(SimulatedMicrophone::new(config.demo.microphone.into()));
        let mut builder = RuntimeBuilder::new()
            .with_config(config.core.clone())
            .with_rendezvous(endpoint.clone())
            .with_media_devices(mic)
            .with_contacts(contacts.clone());
        if let Some(address) = options.cached_address {
            builder = builder.with_cached_address(address);
        }
        if let Some(seed) = options.seed {
            builder = builder.with_seed(seed);
        }
        let runtime = builder.build_and_start().await?;

        Ok(Self {
            network,
            endpoint,
            contacts,
            runtime,
            echo,
            rings: 0,
        })
    }

    pub fn take_app_events(&mut self) -> Result<AppEventReceiver> {
        self.runtime
            .take_app_event_receiver()
            .ok_or_else(|| CliError::Config("app event receiver already taken".to_string()))
    }

    pub fn contacts(&self) -> Vec<Contact> {
        self.contacts.list()
    }

    pub fn echo_address(&self) -> &LocalAddress {
        self.echo.address()
    }

    /// Run one parsed line; returns a line to print, if any
    pub async fn execute(&mut self, command: ReplCommand) -> Result<Option<String>> {
        match command {
            ReplCommand::Engine(command) => {
                self.runtime.send_command(command).await?;
                Ok(None)
            }
            ReplCommand::Ring { from } => self.ring(from).map(Some),
            ReplCommand::DropConnection => {
                let address = self.own_address()?;
                if self.network.drop_connection(&address, "simulated link drop") {
                    Ok(Some(format!("Dropped registration of {}", address)))
                } else {
                    Ok(Some(format!("{} is not online", address)))
                }
            }
            ReplCommand::Outage { down } => {
                if down {
                    self.network.set_outage(Some("rendezvous service unreachable"));
                    Ok(Some("Rendezvous service is down".to_string()))
                } else {
                    self.network.set_outage(None);
                    Ok(Some("Rendezvous service is up".to_string()))
                }
            }
            ReplCommand::Contacts => Ok(Some(
                self.contacts()
                    .iter()
                    .map(|contact| format!("  {:<12} {}", contact.name, contact.address))
                    .collect::<Vec<_>>()
                    .join("\n"),
            )),
            ReplCommand::Help => Ok(Some(crate::repl::HELP.to_string())),
            ReplCommand::Quit => Ok(None),
        }
    }

    /// A scripted caller at `from` rings us and waits for the call to end
    fn ring(&mut self, from: LocalAddress) -> Result<String> {
        let address = self.own_address()?;
        self.rings += 1;
        let mut handle = self
            .network
            .ring(from.clone(), &address, &format!("scripted-{}", self.rings))
            .map_err(peerline_core::PeerlineError::from)?;
        tokio::spawn(async move {
            while let Some(signal) = handle.signals.recv().await {
                debug!("Scripted caller {}: {:?}", from, signal);
                if signal.is_terminal() {
                    break;
                }
            }
            handle.control.close();
        });
        Ok(format!("Ringing {}", address))
    }

    fn own_address(&self) -> Result<LocalAddress> {
        self.endpoint
            .registered_address()
            .ok_or_else(|| CliError::invalid_input("not registered yet"))
    }

    pub async fn shutdown(mut self) -> Result<()> {
        self.runtime.shutdown().await?;
        info!("Engine stopped");
        Ok(())
    }
}
