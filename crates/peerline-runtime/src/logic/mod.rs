//! Core Logic Module
//!
//! The core logic task is split into focused components:
//! - `state`: Core application state and statistics
//! - `handlers`: Command and event handlers
//! - `task`: Main CoreLogicTask implementation and coordination
//!
//! All call, messaging and connection state is owned by the single
//! `CoreLogicTask` and mutated only from its event loop. The broker task and
//! the UI talk to it exclusively through channels, so no state is shared and
//! no locks guard it.

pub mod handlers;
pub mod state;
pub mod task;

pub use handlers::{CommandHandlers, EventHandlers, Handled};
pub use state::{CoreState, CoreStats};
pub use task::CoreLogicTask;
