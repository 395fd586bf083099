//! Core vocabulary shared by every Nightfall crate.
//!
//! Everything in here is plain data: identifiers, the team and phase
//! enumerations, and the [`GameEvent`] envelope that the engine publishes
//! to observers. None of it knows about roles or the turn engine.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Opaque identifier of a participant.
///
/// Rosters come from outside the engine, so ids are arbitrary strings
/// rather than counters. `#[serde(transparent)]` keeps the JSON form a
/// bare string: `ParticipantId("p7".into())` serializes as `"p7"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    /// Creates an id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrows the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for ParticipantId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identifier of one match instance, handed out by the match manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(pub u64);

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Team
// ---------------------------------------------------------------------------

/// Victory grouping a participant belongs to.
///
/// A participant's team mirrors its role's team until something overrides
/// it: a matchmaker link moves both lovers to [`Team::Lovers`], and a thief
/// takes on the team of the role it steals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    Unknown,
    Village,
    Wolf,
    Lovers,
    Neutral,
}

impl Team {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Village => "village",
            Self::Wolf => "wolf",
            Self::Lovers => "lovers",
            Self::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Team {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unknown" => Ok(Self::Unknown),
            "village" => Ok(Self::Village),
            "wolf" | "werewolf" => Ok(Self::Wolf),
            "lovers" => Ok(Self::Lovers),
            "neutral" => Ok(Self::Neutral),
            other => Err(ProtocolError::InvalidMessage(format!("unknown team '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// One stage of the match.
///
/// The cycle is strict, with no phase skipped:
///
/// ```text
/// Waiting → Night → DayDiscussion → DayVote → Night → ...
///                                                └──→ GameOver
/// ```
///
/// `GameOver` is never reached through [`Phase::next`]; it is forced by a
/// victory or by a failing phase handler, and it is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Waiting,
    Night,
    DayDiscussion,
    DayVote,
    GameOver,
}

impl Phase {
    /// The regular successor in the cycle, or `None` once the match is over.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Waiting => Some(Self::Night),
            Self::Night => Some(Self::DayDiscussion),
            Self::DayDiscussion => Some(Self::DayVote),
            Self::DayVote => Some(Self::Night),
            Self::GameOver => None,
        }
    }

    /// Returns `true` if `target` is the regular successor, or the forced
    /// jump to `GameOver` from any live phase.
    pub fn can_transition_to(self, target: Self) -> bool {
        if target == Self::GameOver {
            return self != Self::GameOver;
        }
        self.next() == Some(target)
    }

    /// Returns `true` for the day phases.
    pub fn is_day(&self) -> bool {
        matches!(self, Self::DayDiscussion | Self::DayVote)
    }

    /// Returns `true` once the match has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::GameOver)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::Night => "NIGHT",
            Self::DayDiscussion => "DAY_DISCUSSION",
            Self::DayVote => "DAY_VOTE",
            Self::GameOver => "GAME_OVER",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WAITING" => Ok(Self::Waiting),
            "NIGHT" => Ok(Self::Night),
            "DAY_DISCUSSION" => Ok(Self::DayDiscussion),
            "DAY_VOTE" => Ok(Self::DayVote),
            "GAME_OVER" => Ok(Self::GameOver),
            other => Err(ProtocolError::InvalidMessage(format!("unknown phase '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// EventChannel
// ---------------------------------------------------------------------------

/// Named channel an event is published on.
///
/// Observers register handlers per channel. The team channels
/// (`Team(...)`) are used by `send_team`; `Private` carries messages meant
/// for exactly one participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventChannel {
    /// Lifecycle, role reveal, reassignment, and death broadcasts.
    System,
    /// Phase description and duration on every transition.
    PhaseChange,
    /// One event per cast vote.
    Vote,
    Accuse,
    /// The result of a resolved elimination vote.
    Exile,
    /// One-recipient messages such as seer results.
    Private,
    /// Messages addressed to every member of a team.
    Team(Team),
}

impl EventChannel {
    pub fn name(&self) -> String {
        match self {
            Self::System => "system".into(),
            Self::PhaseChange => "phase_change".into(),
            Self::Vote => "vote".into(),
            Self::Accuse => "accuse".into(),
            Self::Exile => "exile".into(),
            Self::Private => "private".into(),
            Self::Team(team) => format!("team_{team}"),
        }
    }
}

impl fmt::Display for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for EventChannel {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        if let Some(team) = s.strip_prefix("team_") {
            return team.parse().map(Self::Team);
        }
        match s.as_str() {
            "system" => Ok(Self::System),
            "phase_change" => Ok(Self::PhaseChange),
            "vote" => Ok(Self::Vote),
            "accuse" => Ok(Self::Accuse),
            "exile" => Ok(Self::Exile),
            "private" => Ok(Self::Private),
            other => Err(ProtocolError::InvalidMessage(format!("unknown channel '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// GameEvent
// ---------------------------------------------------------------------------

/// Structured fields attached to an event.
///
/// Every field is optional; a field that is `None` is left out of the
/// serialized form, so a vote event encodes as
/// `{"from":"p1","to":"p4","round":2,"phase":"DAY_VOTE"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ParticipantId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<ParticipantId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<ParticipantId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Anything that does not fit the named fields.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl EventMetadata {
    /// Metadata for a cast vote. `to` is `None` for an abstention.
    pub fn vote(from: ParticipantId, to: Option<ParticipantId>, round: u32, phase: Phase) -> Self {
        Self {
            from: Some(from),
            to,
            round: Some(round),
            phase: Some(phase),
            ..Self::default()
        }
    }

    /// Metadata for an exile.
    pub fn exile(target: ParticipantId, round: u32, phase: Phase) -> Self {
        Self {
            target: Some(target),
            round: Some(round),
            phase: Some(phase),
            ..Self::default()
        }
    }

    /// Metadata for a phase change.
    pub fn phase_change(phase: Phase, round: u32, duration_ms: u64) -> Self {
        Self {
            round: Some(round),
            phase: Some(phase),
            duration_ms: Some(duration_ms),
            ..Self::default()
        }
    }

    /// Adds a free-form key.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// One narrated occurrence, as delivered to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Bus-assigned sequence number, starting at 1.
    pub seq: u64,
    pub channel: EventChannel,
    pub message: String,
    /// Participants the event is addressed to.
    pub recipients: Vec<ParticipantId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<EventMetadata>,
}

impl GameEvent {
    /// Returns `true` if `participant` is among the recipients.
    pub fn is_addressed_to(&self, participant: &ParticipantId) -> bool {
        self.recipients.contains(participant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_cycle_is_strict() {
        assert_eq!(Phase::Waiting.next(), Some(Phase::Night));
        assert_eq!(Phase::Night.next(), Some(Phase::DayDiscussion));
        assert_eq!(Phase::DayDiscussion.next(), Some(Phase::DayVote));
        assert_eq!(Phase::DayVote.next(), Some(Phase::Night));
        assert_eq!(Phase::GameOver.next(), None);
    }

    #[test]
    fn test_phase_can_transition_to() {
        assert!(Phase::Night.can_transition_to(Phase::DayDiscussion));
        assert!(!Phase::Night.can_transition_to(Phase::DayVote));
        assert!(Phase::DayDiscussion.can_transition_to(Phase::GameOver));
        assert!(!Phase::GameOver.can_transition_to(Phase::GameOver));
        assert!(!Phase::GameOver.can_transition_to(Phase::Night));
    }

    #[test]
    fn test_phase_round_trips_through_display() {
        for phase in [
            Phase::Waiting,
            Phase::Night,
            Phase::DayDiscussion,
            Phase::DayVote,
            Phase::GameOver,
        ] {
            assert_eq!(phase.to_string().parse::<Phase>().unwrap(), phase);
        }
    }

    #[test]
    fn test_team_parses_aliases() {
        assert_eq!("Werewolf".parse::<Team>().unwrap(), Team::Wolf);
        assert_eq!(" village ".parse::<Team>().unwrap(), Team::Village);
        assert!("pirates".parse::<Team>().is_err());
    }

    #[test]
    fn test_channel_names() {
        assert_eq!(EventChannel::PhaseChange.to_string(), "phase_change");
        assert_eq!(EventChannel::Team(Team::Wolf).to_string(), "team_wolf");
        assert_eq!(
            "team_lovers".parse::<EventChannel>().unwrap(),
            EventChannel::Team(Team::Lovers)
        );
        assert!("gossip".parse::<EventChannel>().is_err());
    }

    #[test]
    fn test_participant_id_display_is_raw() {
        let id = ParticipantId::new("p12");
        assert_eq!(id.to_string(), "p12");
        assert_eq!(MatchId(3).to_string(), "M-3");
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_vote_metadata_omits_empty_fields() {
        let meta = EventMetadata::vote("p1".into(), Some("p4".into()), 2, Phase::DayVote);
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"from": "p1", "to": "p4", "round": 2, "phase": "DAY_VOTE"})
        );
    }
}
