//! Peerline Runtime Engine
//!
//! This crate contains the engine behind the Peerline phone surface:
//! - `CoreLogicTask`: the single owner of call, messaging and connection state
//! - `BrokerTask`: executes effects against the rendezvous service and the microphone
//! - The address registry, connection broker, call session and messaging managers
//! - `EventFanout`: turns state changes into user notifications
//!
//! `peerline-core` provides the stable API definitions; this crate wires them
//! together through `RuntimeBuilder`.

pub mod broker_task;
pub mod builder;
pub mod fanout;
pub mod logic;
pub mod managers;

pub use broker_task::BrokerTask;
pub use builder::{create_test_runtime, RuntimeBuilder, RuntimeHandle};
pub use fanout::{EventFanout, NotificationLog};
pub use logic::{CoreLogicTask, CoreState, CoreStats};
pub use managers::*;

// Re-export core types for convenience
pub use peerline_core::{
    AppEvent, AppEventReceiver, CallSnapshot, CallStatus, Command, CommandSender,
    ConnectionStatus, Failure, LocalAddress, Notification, PeerlineConfig, PeerlineError,
    PeerlineResult,
};
