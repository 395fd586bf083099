//! Game rules for Nightfall.
//!
//! Everything here is synchronous and owns no tasks: the configuration
//! bundle, the role capability set, the match state roles act on, the vote
//! tally, and the victory evaluator. The turn engine composes them.
//!
//! # Key types
//!
//! - [`MatchConfig`]: phase timing, role deal, cooldowns, option blocks
//! - [`Role`] / [`Capability`]: dealt roles and their shared skill gate
//! - [`MatchState`] / [`ActionScope`]: engine-owned state and the limited
//!   view roles act through
//! - [`VoteTally`]: strict plurality resolution
//! - [`VictoryEvaluator`]: ordered win rules

mod config;
mod error;
mod kind;
pub mod roles;
mod state;
mod victory;
mod vote;

pub use config::{
    FoolOptions, GuardOptions, HunterOptions, MatchConfig, MatchmakerOptions, NeutralVictory,
    PhaseSettings, PhaseTable, SeerOptions, ThiefOptions, WitchOptions, WolfOptions,
};
pub use error::ConfigError;
pub use kind::{RoleKind, Skill, UnknownName};
pub use roles::{Capability, Cooldowns, Role};
pub use state::{ActionScope, DeathCause, DeathSet, MatchState, Participant, Speech, Status};
pub use victory::VictoryEvaluator;
pub use vote::VoteTally;
