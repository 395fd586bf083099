//! Error types for the rules layer.
//!
//! Only configuration can fail here. Everything that happens during play
//! (an ineligible target, an exhausted charge) is reported by a `false`
//! return from the role method, not by an error.

use nightfall_protocol::{ParticipantId, Phase};

/// A match configuration that cannot be played.
///
/// Raised before any match state exists; never recovered from.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The JSON bundle did not parse, including missing required keys.
    #[error("invalid match configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// The roster has no participants.
    #[error("participant roster is empty")]
    EmptyRoster,

    /// The same id appears twice in the roster.
    #[error("participant {0} appears more than once in the roster")]
    DuplicateParticipant(ParticipantId),

    /// The role distribution does not deal exactly one role per participant.
    #[error("role distribution deals {roles} roles for {participants} participants")]
    RoleCountMismatch { roles: usize, participants: usize },

    /// A phase block is unusable.
    #[error("phase {phase}: {reason}")]
    InvalidPhase { phase: Phase, reason: String },

    /// A role option block is out of range or inconsistent.
    #[error("invalid option: {0}")]
    InvalidOption(String),
}
