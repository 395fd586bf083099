//! The decision provider seam.
//!
//! The engine never decides anything on a participant's behalf. For every
//! action, speech, and initialization choice it asks a [`DecisionProvider`]
//! and treats anything it cannot use as "no choice".

use std::future::Future;

use nightfall_protocol::{ParticipantId, Phase};
use nightfall_rules::{MatchState, RoleKind, Skill, Speech};
use serde::{Deserialize, Serialize};

use crate::ProviderError;

/// Words a provider may use to explicitly choose nobody.
const NO_TARGET: [&str; 6] = ["none", "null", "skip", "pass", "abstain", "nobody"];

/// A provider's answer to an action request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Free-form target id, matched against the roster by the engine.
    pub target_id: Option<String>,
}

impl Decision {
    pub fn target(id: impl Into<String>) -> Self {
        Self {
            target_id: Some(id.into()),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    /// Resolves the target against the roster.
    ///
    /// Whitespace and case are ignored. Empty strings, the sentinel words
    /// (`none`, `skip`, `abstain`, ...), and ids nobody holds all resolve
    /// to `None`.
    pub fn resolve(&self, state: &MatchState) -> Option<ParticipantId> {
        let raw = self.target_id.as_deref()?.trim();
        if raw.is_empty() || NO_TARGET.iter().any(|w| raw.eq_ignore_ascii_case(w)) {
            return None;
        }
        state.find(raw).cloned()
    }
}

/// What a provider sees when asked for a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub round: u32,
    pub phase: Phase,
    pub alive: Vec<ParticipantId>,
    pub dead: Vec<ParticipantId>,
    /// Speeches made so far this round.
    pub speeches: Vec<Speech>,
    /// The skill being requested, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill: Option<Skill>,
    /// Tonight's pending deaths. Only filled for heal requests.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_deaths: Vec<ParticipantId>,
}

impl MatchSnapshot {
    pub fn capture(state: &MatchState, skill: Option<Skill>) -> Self {
        Self {
            round: state.round(),
            phase: state.phase(),
            alive: state.alive().to_vec(),
            dead: state.dead().to_vec(),
            speeches: state.speeches().to_vec(),
            skill,
            pending_deaths: Vec::new(),
        }
    }

    /// Adds the current phase's death set.
    pub fn with_pending_deaths(mut self, state: &MatchState) -> Self {
        self.pending_deaths = state.active_deaths().ids().cloned().collect();
        self
    }
}

/// Supplies every participant's choices.
///
/// `Send + Sync + 'static` because the provider is moved into the match's
/// background task. Errors are never fatal: the engine logs them and
/// carries on as if no choice was made.
///
/// # Example
///
/// ```rust
/// use nightfall_engine::{Decision, DecisionProvider, MatchSnapshot, ProviderError};
/// use nightfall_protocol::{ParticipantId, Phase};
/// use nightfall_rules::RoleKind;
///
/// /// Always targets the first other living participant.
/// struct FirstOther;
///
/// impl DecisionProvider for FirstOther {
///     async fn get_action(
///         &self,
///         participant: &ParticipantId,
///         _role: RoleKind,
///         snapshot: &MatchSnapshot,
///         _phase: Phase,
///     ) -> Result<Decision, ProviderError> {
///         Ok(snapshot
///             .alive
///             .iter()
///             .find(|id| *id != participant)
///             .map(|id| Decision::target(id.as_str()))
///             .unwrap_or_default())
///     }
///
///     async fn get_speech(
///         &self,
///         _participant: &ParticipantId,
///         _role: RoleKind,
///         _snapshot: &MatchSnapshot,
///     ) -> Result<Option<String>, ProviderError> {
///         Ok(None)
///     }
/// }
/// ```
pub trait DecisionProvider: Send + Sync + 'static {
    /// Chooses a target for `participant`'s skill in `phase`.
    fn get_action(
        &self,
        participant: &ParticipantId,
        role: RoleKind,
        snapshot: &MatchSnapshot,
        phase: Phase,
    ) -> impl Future<Output = Result<Decision, ProviderError>> + Send;

    /// Produces `participant`'s speech for the discussion phase.
    fn get_speech(
        &self,
        participant: &ParticipantId,
        role: RoleKind,
        snapshot: &MatchSnapshot,
    ) -> impl Future<Output = Result<Option<String>, ProviderError>> + Send;

    /// Picks the role a thief steals, by name. Default: no choice.
    fn choose_role(
        &self,
        _participant: &ParticipantId,
        _stealable: &[RoleKind],
        _snapshot: &MatchSnapshot,
    ) -> impl Future<Output = Result<Option<String>, ProviderError>> + Send {
        async { Ok(None) }
    }

    /// Names the two participants a matchmaker links. Default: no choice.
    fn choose_lovers(
        &self,
        _participant: &ParticipantId,
        _snapshot: &MatchSnapshot,
    ) -> impl Future<Output = Result<Option<(String, String)>, ProviderError>> + Send {
        async { Ok(None) }
    }
}
