//! Peerline CLI library
//!
//! Terminal front end for the Peerline engine. The engine runs against an
//! in-memory rendezvous network with a scripted echo peer, so calls, chat and
//! connection recovery can be tried without any real network.

pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod display;
pub mod error;
pub mod repl;

pub use app::{LaunchOptions, PeerlineApp};
pub use cli::{Cli, Commands};
pub use config::CliAppConfig;
pub use error::{CliError, Result};
