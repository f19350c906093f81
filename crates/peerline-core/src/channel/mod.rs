//! Channel Module
//!
//! This module contains the CSP (Communicating Sequential Processes) channel infrastructure:
//! - `communication`: Core channel types, commands, events, and effects
//! - `utils`: Channel constructors and send helpers

pub mod communication;
pub mod utils;

pub use communication::{
    AppEvent, Command, ConnectionStatus, Effect, Event, Failure, Generation,
};

pub use crate::config::ChannelConfig;

pub use utils::{
    create_app_event_channel, create_command_channel, create_effect_channel,
    create_event_channel, AppEventReceiver, AppEventSender, ChannelError, CommandReceiver,
    CommandSender, EffectReceiver, EffectSender, EventReceiver, EventSender, NonBlockingSend,
};
