//! Turn engine for Nightfall.
//!
//! Each match is one [`MatchEngine`] driven on its own Tokio task by a
//! [`MatchRunner`]. All phase resolution happens sequentially on that task;
//! other tasks only flip control flags and read progress.
//!
//! # Key types
//!
//! - [`DecisionProvider`]: the trait supplying every participant's choices
//! - [`MatchEngine`]: initialization, the run loop, and per-phase resolution
//! - [`MatchRunner`]: background start/pause/resume/stop and admin overrides
//! - [`MatchManager`]: creates and tracks several matches
//! - [`PhaseMachine`]: validated phase transitions with prioritized handlers
//! - [`EventBus`]: channel-based event publication with history

#![allow(async_fn_in_trait)]

mod bus;
mod command;
mod engine;
mod error;
mod manager;
mod phase;
mod provider;
mod runner;

pub use bus::{DEFAULT_HISTORY_CAPACITY, DEFAULT_HISTORY_LIMIT, EventBus, EventHandler, HandlerId};
pub use command::AdminCommand;
pub use engine::MatchEngine;
pub use error::{EngineError, HandlerError, ObserverError, ProviderError};
pub use manager::{MatchManager, MatchStatusReport};
pub use phase::{PhaseCallback, PhaseHandler, PhaseMachine};
pub use provider::{Decision, DecisionProvider, MatchSnapshot};
pub use runner::{CompletionCallback, MatchProgress, MatchRunner};
