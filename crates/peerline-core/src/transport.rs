//! Rendezvous Transport Boundary
//!
//! Defines the external collaborator the engine needs from the rendezvous /
//! NAT-traversal service. Its internal protocol is opaque; the engine only uses:
//!
//! - `register(address)` with an inbound stream of calls, data and disconnects
//! - `reconnect(address)` to resume a dropped registration
//! - `dial(address, media)` returning a [`CallHandle`]
//! - `open_channel(address)` returning a short-lived [`DataChannel`]
//!
//! Implementations are per endpoint: the instance remembers the address it is
//! registered under and uses it as the caller identity for dials and channels.

use core::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::{
    errors::{RegistrationError, TransportError},
    media::{LocalMedia, RemoteMedia},
    types::LocalAddress,
};

// ----------------------------------------------------------------------------
// Inbound stream
// ----------------------------------------------------------------------------

/// Items delivered on an open registration
#[derive(Debug)]
pub enum Inbound {
    /// A peer is calling this endpoint
    Call(IncomingCall),
    /// A peer opened a data channel and wrote one payload
    Data {
        from: LocalAddress,
        payload: Vec<u8>,
    },
    /// The registration dropped; `Rendezvous::reconnect` may resume it
    Disconnected { reason: String },
}

/// An inbound call, not yet answered
#[derive(Debug)]
pub struct IncomingCall {
    pub from: LocalAddress,
    pub handle: CallHandle,
}

// ----------------------------------------------------------------------------
// Calls
// ----------------------------------------------------------------------------

/// Signals surfaced by a transport-level call over its lifetime
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallSignal {
    /// The remote party's audio arrived
    RemoteStream(RemoteMedia),
    /// The call was closed by either side
    Closed,
    /// The call failed
    Error(String),
}

impl CallSignal {
    /// Closed and Error end the call; nothing follows them
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallSignal::Closed | CallSignal::Error(_))
    }
}

/// Control surface of a transport-level call object
pub trait CallControl: Send + Sync + fmt::Debug {
    /// Answer an inbound call with local media
    fn answer(&self, media: &LocalMedia) -> Result<(), TransportError>;
    /// Close the call; idempotent
    fn close(&self);
}

/// Handle to a transport-level call
pub struct CallHandle {
    pub remote: LocalAddress,
    pub control: Arc<dyn CallControl>,
    pub signals: mpsc::UnboundedReceiver<CallSignal>,
}

impl fmt::Debug for CallHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallHandle")
            .field("remote", &self.remote)
            .field("control", &self.control)
            .finish_non_exhaustive()
    }
}

// ----------------------------------------------------------------------------
// Data channels
// ----------------------------------------------------------------------------

/// Reliable, ordered channel for one logical message exchange
#[async_trait::async_trait]
pub trait DataChannel: Send {
    async fn write(&mut self, payload: &[u8]) -> Result<(), TransportError>;
    async fn close(&mut self);
}

// ----------------------------------------------------------------------------
// Rendezvous
// ----------------------------------------------------------------------------

/// Connection to the rendezvous / NAT-traversal service for one endpoint
#[async_trait::async_trait]
pub trait Rendezvous: Send + Sync {
    /// Register under `address` and return the inbound stream
    ///
    /// The stream ending means the registration is gone for good and only a
    /// new `register` brings the endpoint back.
    async fn register(
        &self,
        address: &LocalAddress,
    ) -> Result<mpsc::Receiver<Inbound>, RegistrationError>;

    /// Resume a dropped registration; the inbound stream keeps flowing
    async fn reconnect(&self, address: &LocalAddress) -> Result<(), RegistrationError>;

    /// Destroy the registration under `address`
    async fn unregister(&self, address: &LocalAddress);

    /// Place a call carrying `media`
    async fn dial(
        &self,
        target: &LocalAddress,
        media: &LocalMedia,
    ) -> Result<CallHandle, TransportError>;

    /// Open a data channel to `target`
    async fn open_channel(
        &self,
        target: &LocalAddress,
    ) -> Result<Box<dyn DataChannel>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_signals() {
        assert!(CallSignal::Closed.is_terminal());
        assert!(CallSignal::Error("ice failed".to_string()).is_terminal());
        assert!(!CallSignal::RemoteStream(RemoteMedia {
            id: "remote".to_string()
        })
        .is_terminal());
    }
}
