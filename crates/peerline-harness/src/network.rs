//! Simulated Rendezvous Network
//!
//! An in-memory rendezvous service shared by any number of endpoints. Each
//! [`SimulatedRendezvous`] is one endpoint's connection to it and implements
//! [`Rendezvous`]. The [`SimulatedNetwork`] handle exposes fault injection:
//! reserved addresses, dropped registrations, failing resumes, outages,
//! broken calls, and scripted peers that ring or message an endpoint.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard, Weak,
    },
};
use tokio::sync::mpsc;
use tracing::debug;

use peerline_core::{
    CallControl, CallHandle, CallSignal, DataChannel, Inbound, IncomingCall, LocalAddress,
    LocalMedia, RegistrationError, RemoteMedia, Rendezvous, TransportError,
};

/// Capacity of each endpoint's inbound queue
const INBOUND_BUFFER: usize = 64;

// ----------------------------------------------------------------------------
// Network state
// ----------------------------------------------------------------------------

#[derive(Debug)]
struct Registration {
    endpoint: u64,
    inbound: mpsc::Sender<Inbound>,
    online: bool,
}

#[derive(Debug, Default)]
struct NetworkState {
    registrations: HashMap<LocalAddress, Registration>,
    reserved: HashSet<LocalAddress>,
    outage: Option<String>,
    reconnect_failures: u32,
    broken_calls: Option<String>,
    calls: Vec<Weak<CallLink>>,
}

/// Counters observed by tests
#[derive(Debug, Default)]
pub struct NetworkStats {
    pub registrations: AtomicU64,
    pub reconnects: AtomicU64,
    pub dials: AtomicU64,
    pub channels_opened: AtomicU64,
    pub payloads_delivered: AtomicU64,
    open_channels: AtomicUsize,
}

impl NetworkStats {
    /// Data channels opened and not yet closed
    pub fn open_channels(&self) -> usize {
        self.open_channels.load(Ordering::SeqCst)
    }
}

/// Shared handle to the simulated rendezvous service
#[derive(Debug, Clone, Default)]
pub struct SimulatedNetwork {
    state: Arc<Mutex<NetworkState>>,
    stats: Arc<NetworkStats>,
    next_endpoint: Arc<AtomicU64>,
}

impl SimulatedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, NetworkState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create a new endpoint connection to this network
    pub fn endpoint(&self) -> SimulatedRendezvous {
        SimulatedRendezvous {
            network: self.clone(),
            id: self.next_endpoint.fetch_add(1, Ordering::SeqCst) + 1,
            registered: Mutex::new(None),
        }
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    /// Mark `address` as held by a foreign peer so registering it collides
    pub fn reserve(&self, address: LocalAddress) {
        self.lock().reserved.insert(address);
    }

    pub fn is_registered(&self, address: &LocalAddress) -> bool {
        self.lock()
            .registrations
            .get(address)
            .map(|registration| registration.online)
            .unwrap_or(false)
    }

    pub fn registered_addresses(&self) -> Vec<LocalAddress> {
        let mut addresses: Vec<_> = self
            .lock()
            .registrations
            .iter()
            .filter(|(_, registration)| registration.online)
            .map(|(address, _)| address.clone())
            .collect();
        addresses.sort();
        addresses
    }

    /// Take the registration of `address` offline and notify its endpoint
    pub fn drop_connection(&self, address: &LocalAddress, reason: &str) -> bool {
        let mut state = self.lock();
        let Some(registration) = state.registrations.get_mut(address) else {
            return false;
        };
        registration.online = false;
        let delivered = registration
            .inbound
            .try_send(Inbound::Disconnected {
                reason: reason.to_string(),
            })
            .is_ok();
        debug!("Simulated network: dropped registration {}", address);
        delivered
    }

    /// Forget the registration of `address`, ending its inbound stream
    ///
    /// The stream only ends once no open data channel still targets it.
    pub fn sever_registration(&self, address: &LocalAddress) -> bool {
        let severed = self.lock().registrations.remove(address).is_some();
        if severed {
            debug!("Simulated network: severed registration {}", address);
        }
        severed
    }

    /// Make the next `count` resume attempts fail
    pub fn fail_next_reconnects(&self, count: u32) {
        self.lock().reconnect_failures = count;
    }

    /// Reject every registration and resume until cleared
    pub fn set_outage(&self, reason: Option<&str>) {
        self.lock().outage = reason.map(str::to_string);
    }

    /// Make every new dial fail with `reason` until cleared
    pub fn break_calls(&self, reason: Option<&str>) {
        self.lock().broken_calls = reason.map(str::to_string);
    }

    /// Fail every live call with a transport error
    pub fn fail_active_calls(&self, reason: &str) -> usize {
        let links: Vec<_> = {
            let mut state = self.lock();
            state.calls.retain(|link| link.strong_count() > 0);
            state.calls.iter().filter_map(Weak::upgrade).collect()
        };
        links
            .into_iter()
            .filter(|link| link.fail(reason))
            .count()
    }

    /// Ring `to` from a scripted peer at `from`; returns the caller's side
    pub fn ring(
        &self,
        from: LocalAddress,
        to: &LocalAddress,
        media_id: &str,
    ) -> Result<CallHandle, TransportError> {
        self.connect_call(from, to, media_id.to_string())
    }

    /// Deliver one chat payload to `to` as if a scripted peer at `from` wrote it
    pub fn inject_data(
        &self,
        from: LocalAddress,
        to: &LocalAddress,
        payload: Vec<u8>,
    ) -> Result<(), TransportError> {
        let inbound = self.online_inbound(to)?;
        inbound
            .try_send(Inbound::Data { from, payload })
            .map_err(|_| TransportError::PeerUnavailable {
                address: to.clone(),
            })?;
        self.stats.payloads_delivered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn online_inbound(&self, address: &LocalAddress) -> Result<mpsc::Sender<Inbound>, TransportError> {
        let state = self.lock();
        match state.registrations.get(address) {
            Some(registration) if registration.online => Ok(registration.inbound.clone()),
            _ => Err(TransportError::PeerUnavailable {
                address: address.clone(),
            }),
        }
    }

    fn connect_call(
        &self,
        from: LocalAddress,
        to: &LocalAddress,
        caller_media: String,
    ) -> Result<CallHandle, TransportError> {
        if let Some(reason) = self.lock().broken_calls.clone() {
            return Err(TransportError::CallFailed {
                address: to.clone(),
                reason,
            });
        }
        let inbound = self.online_inbound(to)?;

        let (caller_tx, caller_rx) = mpsc::unbounded_channel();
        let (callee_tx, callee_rx) = mpsc::unbounded_channel();
        let link = Arc::new(CallLink {
            caller_media,
            inner: Mutex::new(LinkState {
                answered: false,
                closed: false,
                caller: caller_tx,
                callee: callee_tx,
            }),
        });
        self.lock().calls.push(Arc::downgrade(&link));

        let callee = CallHandle {
            remote: from.clone(),
            control: Arc::new(CallLeg {
                link: link.clone(),
                side: Side::Callee,
            }),
            signals: callee_rx,
        };
        inbound
            .try_send(Inbound::Call(IncomingCall {
                from,
                handle: callee,
            }))
            .map_err(|_| TransportError::PeerUnavailable {
                address: to.clone(),
            })?;

        self.stats.dials.fetch_add(1, Ordering::SeqCst);
        Ok(CallHandle {
            remote: to.clone(),
            control: Arc::new(CallLeg {
                link,
                side: Side::Caller,
            }),
            signals: caller_rx,
        })
    }
}

// ----------------------------------------------------------------------------
// Calls
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Caller,
    Callee,
}

#[derive(Debug)]
struct LinkState {
    answered: bool,
    closed: bool,
    caller: mpsc::UnboundedSender<CallSignal>,
    callee: mpsc::UnboundedSender<CallSignal>,
}

/// Both legs of one simulated call
#[derive(Debug)]
struct CallLink {
    caller_media: String,
    inner: Mutex<LinkState>,
}

impl CallLink {
    fn lock(&self) -> MutexGuard<'_, LinkState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn answer(&self, media: &LocalMedia) -> Result<(), TransportError> {
        let mut state = self.lock();
        if state.closed {
            return Err(TransportError::InvalidCallOperation {
                reason: "call already closed".to_string(),
            });
        }
        if state.answered {
            return Err(TransportError::InvalidCallOperation {
                reason: "call already answered".to_string(),
            });
        }
        state.answered = true;
        let _ = state.caller.send(CallSignal::RemoteStream(RemoteMedia {
            id: media.id().to_string(),
        }));
        let _ = state.callee.send(CallSignal::RemoteStream(RemoteMedia {
            id: self.caller_media.clone(),
        }));
        Ok(())
    }

    fn close(&self) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        let _ = state.caller.send(CallSignal::Closed);
        let _ = state.callee.send(CallSignal::Closed);
    }

    fn fail(&self, reason: &str) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        state.closed = true;
        let _ = state.caller.send(CallSignal::Error(reason.to_string()));
        let _ = state.callee.send(CallSignal::Error(reason.to_string()));
        true
    }
}

/// One side's control over a simulated call
#[derive(Debug)]
struct CallLeg {
    link: Arc<CallLink>,
    side: Side,
}

impl CallControl for CallLeg {
    fn answer(&self, media: &LocalMedia) -> Result<(), TransportError> {
        if self.side == Side::Caller {
            return Err(TransportError::InvalidCallOperation {
                reason: "only the callee can answer".to_string(),
            });
        }
        self.link.answer(media)
    }

    fn close(&self) {
        self.link.close();
    }
}

// ----------------------------------------------------------------------------
// Data channels
// ----------------------------------------------------------------------------

struct SimulatedDataChannel {
    from: LocalAddress,
    target: LocalAddress,
    inbound: mpsc::Sender<Inbound>,
    stats: Arc<NetworkStats>,
    closed: bool,
}

impl SimulatedDataChannel {
    fn mark_closed(&mut self) {
        if !self.closed {
            self.closed = true;
            self.stats.open_channels.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait::async_trait]
impl DataChannel for SimulatedDataChannel {
    async fn write(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::ChannelFailed {
                address: self.target.clone(),
                reason: "channel closed".to_string(),
            });
        }
        self.inbound
            .send(Inbound::Data {
                from: self.from.clone(),
                payload: payload.to_vec(),
            })
            .await
            .map_err(|_| TransportError::ChannelFailed {
                address: self.target.clone(),
                reason: "peer went away".to_string(),
            })?;
        self.stats.payloads_delivered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&mut self) {
        self.mark_closed();
    }
}

impl Drop for SimulatedDataChannel {
    fn drop(&mut self) {
        self.mark_closed();
    }
}

// ----------------------------------------------------------------------------
// Endpoint
// ----------------------------------------------------------------------------

/// One endpoint's connection to a [`SimulatedNetwork`]
#[derive(Debug)]
pub struct SimulatedRendezvous {
    network: SimulatedNetwork,
    id: u64,
    registered: Mutex<Option<LocalAddress>>,
}

impl SimulatedRendezvous {
    pub fn network(&self) -> &SimulatedNetwork {
        &self.network
    }

    /// Address this endpoint is currently registered under
    pub fn registered_address(&self) -> Option<LocalAddress> {
        self.registered
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn online_address(&self) -> Result<LocalAddress, TransportError> {
        let address = self.registered_address().ok_or(TransportError::NotRegistered)?;
        if self.network.is_registered(&address) {
            Ok(address)
        } else {
            Err(TransportError::NotRegistered)
        }
    }
}

#[async_trait::async_trait]
impl Rendezvous for SimulatedRendezvous {
    async fn register(
        &self,
        address: &LocalAddress,
    ) -> Result<mpsc::Receiver<Inbound>, RegistrationError> {
        let (tx, rx) = mpsc::channel(INBOUND_BUFFER);
        {
            let mut state = self.network.lock();
            if let Some(reason) = state.outage.clone() {
                return Err(RegistrationError::Unavailable { reason });
            }
            let taken_by_other = state
                .registrations
                .get(address)
                .map(|registration| registration.endpoint != self.id)
                .unwrap_or(false);
            if taken_by_other || state.reserved.contains(address) {
                return Err(RegistrationError::AddressTaken {
                    address: address.clone(),
                });
            }
            let endpoint = self.id;
            state
                .registrations
                .retain(|_, registration| registration.endpoint != endpoint);
            state.registrations.insert(
                address.clone(),
                Registration {
                    endpoint,
                    inbound: tx,
                    online: true,
                },
            );
        }
        *self
            .registered
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(address.clone());
        self.network.stats.registrations.fetch_add(1, Ordering::SeqCst);
        debug!("Simulated network: {} registered", address);
        Ok(rx)
    }

    async fn reconnect(&self, address: &LocalAddress) -> Result<(), RegistrationError> {
        let mut state = self.network.lock();
        self.network.stats.reconnects.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = state.outage.clone() {
            return Err(RegistrationError::Unavailable { reason });
        }
        if state.reconnect_failures > 0 {
            state.reconnect_failures -= 1;
            return Err(RegistrationError::Unavailable {
                reason: "rendezvous unreachable".to_string(),
            });
        }
        match state.registrations.get_mut(address) {
            Some(registration) if registration.endpoint == self.id => {
                registration.online = true;
                Ok(())
            }
            _ => Err(RegistrationError::Unavailable {
                reason: "registration expired".to_string(),
            }),
        }
    }

    async fn unregister(&self, address: &LocalAddress) {
        let endpoint = self.id;
        let mut state = self.network.lock();
        if state
            .registrations
            .get(address)
            .map(|registration| registration.endpoint == endpoint)
            .unwrap_or(false)
        {
            state.registrations.remove(address);
        }
        drop(state);

        let mut registered = self
            .registered
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if registered.as_ref() == Some(address) {
            *registered = None;
        }
    }

    async fn dial(
        &self,
        target: &LocalAddress,
        media: &LocalMedia,
    ) -> Result<CallHandle, TransportError> {
        let from = self.online_address()?;
        self.network
            .connect_call(from, target, media.id().to_string())
    }

    async fn open_channel(
        &self,
        target: &LocalAddress,
    ) -> Result<Box<dyn DataChannel>, TransportError> {
        let from = self.online_address()?;
        let inbound = self.network.online_inbound(target)?;
        let stats = self.network.stats.clone();
        stats.channels_opened.fetch_add(1, Ordering::SeqCst);
        stats.open_channels.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SimulatedDataChannel {
            from,
            target: target.clone(),
            inbound,
            stats,
            closed: false,
        }))
    }
}
