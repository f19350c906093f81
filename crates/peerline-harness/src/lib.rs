//! Peerline Harness
//!
//! Deterministic stand-ins for the engine's external collaborators: an
//! in-memory rendezvous network with fault injection, a microphone that
//! tracks track releases, a manually advanced clock, and a scripted echo peer.

pub mod clock;
pub mod echo;
pub mod media;
pub mod network;

pub use clock::ManualClock;
pub use echo::EchoPeer;
pub use media::{MicMode, SimulatedMicrophone, SimulatedTrack};
pub use network::{NetworkStats, SimulatedNetwork, SimulatedRendezvous};
