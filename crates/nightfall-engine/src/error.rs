//! Error types for the engine layer.

use nightfall_clock::ControlError;
use nightfall_protocol::{MatchId, Phase};
use nightfall_rules::ConfigError;

/// Errors returned to callers of the engine, runner, and manager.
///
/// Nothing that happens inside a running match surfaces here; rejected
/// actions and provider failures are logged and the match carries on.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The configuration cannot run a match for the given roster.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A start, pause, resume, or stop in the wrong run status.
    #[error(transparent)]
    Control(#[from] ControlError),

    /// `PhaseMachine::start` outside `Waiting`.
    #[error("phase machine already started (phase {0})")]
    AlreadyStarted(Phase),

    /// The match does not exist.
    #[error("match {0} not found")]
    NotFound(MatchId),

    /// An administrative command that did not parse or names an unknown
    /// participant.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// The match did not end within the stop timeout.
    #[error("match {0} did not stop in time")]
    StopTimeout(MatchId),
}

/// A phase handler failed. Forces the machine into `GameOver`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("phase handler failed: {0}")]
pub struct HandlerError(pub String);

/// A decision provider call failed. Treated as "no decision".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("malformed decision: {0}")]
    Malformed(String),
}

/// An event handler failed. The event is still delivered to the others.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("observer failed: {0}")]
pub struct ObserverError(pub String);
