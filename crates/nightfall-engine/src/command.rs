//! Administrative overrides.

use std::fmt;
use std::str::FromStr;

use nightfall_protocol::ParticipantId;
use nightfall_rules::Skill;

use crate::EngineError;

/// An operator command applied to a match outside the normal rules.
///
/// Textual form: `SET_COOLDOWN <participant> <skill> <value>`. The value
/// overwrites the live counter as-is; configured bounds do not apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    SetCooldown {
        participant: ParticipantId,
        skill: Skill,
        value: u32,
    },
}

impl AdminCommand {
    pub fn participant(&self) -> &ParticipantId {
        match self {
            Self::SetCooldown { participant, .. } => participant,
        }
    }
}

impl FromStr for AdminCommand {
    type Err = EngineError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| EngineError::InvalidCommand(format!("{reason}: '{line}'"));
        let mut words = line.split_whitespace();

        match words.next() {
            Some(verb) if verb.eq_ignore_ascii_case("SET_COOLDOWN") => {}
            Some(_) => return Err(invalid("unknown command")),
            None => return Err(invalid("empty command")),
        }

        let (Some(participant), Some(skill), Some(value), None) =
            (words.next(), words.next(), words.next(), words.next())
        else {
            return Err(invalid("expected SET_COOLDOWN <participant> <skill> <value>"));
        };
        let skill = skill.parse().map_err(|_| invalid("unknown skill"))?;
        let value = value.parse().map_err(|_| invalid("value is not a count"))?;

        Ok(Self::SetCooldown {
            participant: participant.into(),
            skill,
            value,
        })
    }
}

impl fmt::Display for AdminCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetCooldown {
                participant,
                skill,
                value,
            } => write!(f, "SET_COOLDOWN {participant} {skill} {value}"),
        }
    }
}
