//! Stateful managers for the Peerline runtime
//!
//! Each manager is a synchronous state machine owned by the core logic task.
//! Operations never perform I/O; they return an [`Outcome`] listing the
//! effects to hand to the broker task and the app events to publish.

pub mod address;
pub mod broker;
pub mod call;
pub mod messaging;

pub use address::{AddressRegistry, ADDRESS_RANGE};
pub use broker::PeerConnectionBroker;
pub use call::{CallSession, CallSessionManager};
pub use messaging::MessagingChannelManager;

use peerline_core::{AppEvent, Effect};

/// Effects and app events produced by one manager operation
#[derive(Debug, Default)]
pub struct Outcome {
    pub effects: Vec<Effect>,
    pub app_events: Vec<AppEvent>,
}

impl Outcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn event(mut self, event: AppEvent) -> Self {
        self.app_events.push(event);
        self
    }

    pub fn merge(mut self, other: Outcome) -> Self {
        self.effects.extend(other.effects);
        self.app_events.extend(other.app_events);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty() && self.app_events.is_empty()
    }

    pub fn into_parts(self) -> (Vec<Effect>, Vec<AppEvent>) {
        (self.effects, self.app_events)
    }
}
