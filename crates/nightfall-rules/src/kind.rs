//! Role kinds and the skills they use.

use std::fmt;
use std::str::FromStr;

use nightfall_protocol::Team;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoleKind
// ---------------------------------------------------------------------------

/// The kinds of role a participant can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
    Villager,
    #[serde(alias = "werewolf")]
    Wolf,
    Seer,
    /// Holds one heal charge and one poison charge.
    #[serde(alias = "healer")]
    Witch,
    Guard,
    Hunter,
    Fool,
    Thief,
    #[serde(alias = "cupid")]
    Matchmaker,
}

impl RoleKind {
    pub const ALL: [RoleKind; 9] = [
        Self::Villager,
        Self::Wolf,
        Self::Seer,
        Self::Witch,
        Self::Guard,
        Self::Hunter,
        Self::Fool,
        Self::Thief,
        Self::Matchmaker,
    ];

    /// The team a freshly dealt role of this kind plays for.
    pub fn default_team(self) -> Team {
        match self {
            Self::Wolf => Team::Wolf,
            Self::Thief | Self::Matchmaker => Team::Neutral,
            Self::Villager | Self::Seer | Self::Witch | Self::Guard | Self::Hunter | Self::Fool => {
                Team::Village
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Villager => "villager",
            Self::Wolf => "wolf",
            Self::Seer => "seer",
            Self::Witch => "witch",
            Self::Guard => "guard",
            Self::Hunter => "hunter",
            Self::Fool => "fool",
            Self::Thief => "thief",
            Self::Matchmaker => "matchmaker",
        }
    }
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleKind {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "villager" => Ok(Self::Villager),
            "wolf" | "werewolf" => Ok(Self::Wolf),
            "seer" => Ok(Self::Seer),
            "witch" | "healer" => Ok(Self::Witch),
            "guard" => Ok(Self::Guard),
            "hunter" => Ok(Self::Hunter),
            "fool" => Ok(Self::Fool),
            "thief" => Ok(Self::Thief),
            "matchmaker" | "cupid" => Ok(Self::Matchmaker),
            _ => Err(UnknownName(s.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// Skill
// ---------------------------------------------------------------------------

/// A cooldown-tracked ability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    Kill,
    Check,
    Heal,
    Poison,
    Protect,
    Shoot,
    Reveal,
    Steal,
    Match,
}

impl Skill {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kill => "kill",
            Self::Check => "check",
            Self::Heal => "heal",
            Self::Poison => "poison",
            Self::Protect => "protect",
            Self::Shoot => "shoot",
            Self::Reveal => "reveal",
            Self::Steal => "steal",
            Self::Match => "match",
        }
    }
}

impl fmt::Display for Skill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Skill {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kill" => Ok(Self::Kill),
            "check" => Ok(Self::Check),
            "heal" => Ok(Self::Heal),
            "poison" => Ok(Self::Poison),
            "protect" => Ok(Self::Protect),
            "shoot" => Ok(Self::Shoot),
            "reveal" => Ok(Self::Reveal),
            "steal" => Ok(Self::Steal),
            "match" => Ok(Self::Match),
            _ => Err(UnknownName(s.to_owned())),
        }
    }
}

/// A role or skill name that did not parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown name '{0}'")]
pub struct UnknownName(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_kind_parses_aliases() {
        assert_eq!("Werewolf".parse::<RoleKind>().unwrap(), RoleKind::Wolf);
        assert_eq!("cupid".parse::<RoleKind>().unwrap(), RoleKind::Matchmaker);
        assert_eq!("healer".parse::<RoleKind>().unwrap(), RoleKind::Witch);
        assert!("dragon".parse::<RoleKind>().is_err());
    }

    #[test]
    fn test_default_teams() {
        assert_eq!(RoleKind::Wolf.default_team(), Team::Wolf);
        assert_eq!(RoleKind::Seer.default_team(), Team::Village);
        assert_eq!(RoleKind::Thief.default_team(), Team::Neutral);
        assert_eq!(RoleKind::Matchmaker.default_team(), Team::Neutral);
    }

    #[test]
    fn test_skill_round_trips_through_display() {
        for skill in [Skill::Kill, Skill::Check, Skill::Match, Skill::Steal] {
            assert_eq!(skill.to_string().parse::<Skill>().unwrap(), skill);
        }
    }
}
