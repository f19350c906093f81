//! Scripted echo peer
//!
//! A minimal endpoint living on a [`SimulatedNetwork`] that answers every call
//! and replies to every chat message with `echo: <text>`. The CLI demo talks
//! to one of these.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use peerline_core::{
    Frame, Inbound, LocalAddress, MediaDevices, PeerlineResult, Rendezvous,
};

use crate::{media::SimulatedMicrophone, network::SimulatedNetwork};

pub struct EchoPeer {
    address: LocalAddress,
    task: JoinHandle<()>,
}

impl EchoPeer {
    /// Register an echo peer under `address` and start serving it
    pub async fn spawn(network: &SimulatedNetwork, address: LocalAddress) -> PeerlineResult<Self> {
        let endpoint = Arc::new(network.endpoint());
        let mut inbound = endpoint.register(&address).await?;
        let mic = Arc::new(SimulatedMicrophone::granting());

        let task = tokio::spawn(async move {
            while let Some(item) = inbound.recv().await {
                match item {
                    Inbound::Data { from, payload } => {
                        let Ok(Frame::Chat { text }) = Frame::decode(&payload) else {
                            continue;
                        };
                        let endpoint = endpoint.clone();
                        tokio::spawn(async move {
                            if let Err(e) = reply(endpoint.as_ref(), &from, &text).await {
                                warn!("Echo peer: reply to {} failed: {}", from, e);
                            }
                        });
                    }
                    Inbound::Call(mut call) => {
                        let mic = mic.clone();
                        tokio::spawn(async move {
                            let Ok(media) = mic.capture_audio().await else {
                                call.handle.control.close();
                                return;
                            };
                            if call.handle.control.answer(&media).is_ok() {
                                debug!("Echo peer: answered call from {}", call.from);
                                while let Some(signal) = call.handle.signals.recv().await {
                                    if signal.is_terminal() {
                                        break;
                                    }
                                }
                            }
                            media.release();
                        });
                    }
                    Inbound::Disconnected { reason } => {
                        debug!("Echo peer: disconnected ({})", reason);
                    }
                }
            }
        });

        Ok(Self { address, task })
    }

    pub fn address(&self) -> &LocalAddress {
        &self.address
    }
}

async fn reply(endpoint: &dyn Rendezvous, to: &LocalAddress, text: &str) -> PeerlineResult<()> {
    let payload = Frame::chat(format!("echo: {}", text)).encode()?;
    let mut channel = endpoint.open_channel(to).await?;
    let written = channel.write(&payload).await;
    channel.close().await;
    written?;
    Ok(())
}

impl Drop for EchoPeer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
