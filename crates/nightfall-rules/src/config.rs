//! Match configuration: phase timing, the role deal, cooldowns, and the
//! per-role option blocks.
//!
//! A [`MatchConfig`] is parsed and validated once, before the match is
//! created, and is never mutated afterwards. Every role receives a clone of
//! its own option block when it is dealt.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use nightfall_protocol::{ParticipantId, Phase};
use serde::{Deserialize, Serialize};

use crate::{ConfigError, RoleKind, Skill};

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// Timing and narration for one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSettings {
    /// How long the engine idles after resolving the phase.
    pub duration_ms: u64,

    /// Position in the narrated cycle.
    #[serde(default)]
    pub order: u8,

    /// Human-readable name used in the phase-change narration.
    #[serde(default)]
    pub description: String,

    /// Overrides the phase machine's default timeout for this phase.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl PhaseSettings {
    pub fn new(duration: Duration, order: u8, description: impl Into<String>) -> Self {
        Self {
            duration_ms: duration.as_millis() as u64,
            order,
            description: description.into(),
            timeout_ms: None,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Settings for the three phases of the cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTable {
    pub night: PhaseSettings,
    pub day_discussion: PhaseSettings,
    pub day_vote: PhaseSettings,
}

impl PhaseTable {
    /// Same duration for every phase.
    pub fn uniform(duration: Duration) -> Self {
        Self {
            night: PhaseSettings::new(duration, 1, "night"),
            day_discussion: PhaseSettings::new(duration, 2, "day discussion"),
            day_vote: PhaseSettings::new(duration, 3, "day vote"),
        }
    }

    /// Settings for a cycle phase; `None` for `Waiting` and `GameOver`.
    pub fn get(&self, phase: Phase) -> Option<&PhaseSettings> {
        match phase {
            Phase::Night => Some(&self.night),
            Phase::DayDiscussion => Some(&self.day_discussion),
            Phase::DayVote => Some(&self.day_vote),
            Phase::Waiting | Phase::GameOver => None,
        }
    }

    fn entries(&self) -> [(Phase, &PhaseSettings); 3] {
        [
            (Phase::Night, &self.night),
            (Phase::DayDiscussion, &self.day_discussion),
            (Phase::DayVote, &self.day_vote),
        ]
    }
}

// ---------------------------------------------------------------------------
// Role option blocks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WolfOptions {
    /// Targets the pack takes per night, in plurality order. Also caps
    /// each wolf's own kills.
    pub night_kill_limit: u32,
    pub can_kill_self: bool,
}

impl Default for WolfOptions {
    fn default() -> Self {
        Self {
            night_kill_limit: 1,
            can_kill_self: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeerOptions {
    /// Lifetime limit on checks.
    pub max_checks: u32,
    pub allow_self_check: bool,
    pub night_only: bool,
    /// Template for the check result; `{target}`, `{role}` and `{team}`
    /// are substituted.
    pub result_format: String,
}

impl Default for SeerOptions {
    fn default() -> Self {
        Self {
            max_checks: 999,
            allow_self_check: false,
            night_only: true,
            result_format: "{target} => {role} ({team})".into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WitchOptions {
    pub can_save_self: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardOptions {
    /// Lifetime limit on protections.
    pub max_protects: u32,
    /// Whether the same participant may be protected two nights running.
    pub consecutive_protection: bool,
}

impl Default for GuardOptions {
    fn default() -> Self {
        Self {
            max_protects: 999,
            consecutive_protection: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HunterOptions {
    /// Whether the hunter may still shoot after dying.
    pub can_shoot_dead: bool,
}

impl Default for HunterOptions {
    fn default() -> Self {
        Self {
            can_shoot_dead: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FoolOptions {
    /// How many eliminations a reveal may cancel. A fool reveals at most
    /// once, so any value above 1 behaves like 1 and 0 disables it.
    pub reveal_immunity: u32,
}

impl Default for FoolOptions {
    fn default() -> Self {
        Self { reveal_immunity: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThiefOptions {
    pub stealable_roles: Vec<RoleKind>,
    /// Forces a random pick when the provider gives no usable answer.
    pub must_steal: bool,
    /// Upper bound on the provider call for the stolen role.
    pub choice_timeout_ms: u64,
}

impl Default for ThiefOptions {
    fn default() -> Self {
        Self {
            stealable_roles: vec![
                RoleKind::Wolf,
                RoleKind::Seer,
                RoleKind::Witch,
                RoleKind::Hunter,
            ],
            must_steal: true,
            choice_timeout_ms: 30_000,
        }
    }
}

impl ThiefOptions {
    pub fn choice_timeout(&self) -> Duration {
        Duration::from_millis(self.choice_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakerOptions {
    pub max_matches: u32,
}

impl Default for MatchmakerOptions {
    fn default() -> Self {
        Self { max_matches: 1 }
    }
}

/// Optional win rule for the neutral team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeutralVictory {
    /// Minimum number of neutral participants alive.
    pub min_players: usize,
    /// Minimum share of the living that must be neutral, in `(0, 1]`.
    pub required_survival_rate: f64,
}

impl Default for NeutralVictory {
    fn default() -> Self {
        Self {
            min_players: 2,
            required_survival_rate: 0.8,
        }
    }
}

// ---------------------------------------------------------------------------
// MatchConfig
// ---------------------------------------------------------------------------

/// Everything the engine needs to deal and run one match.
///
/// `phases` and `role_distribution` are required. Every other block falls
/// back to its defaults when omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchConfig {
    pub phases: PhaseTable,

    /// How many of each role to deal. Must sum to the roster size.
    pub role_distribution: BTreeMap<RoleKind, usize>,

    /// Cooldown reset value per role and skill. Unlisted skills reset to 0.
    #[serde(default)]
    pub cooldowns: BTreeMap<RoleKind, BTreeMap<Skill, u32>>,

    #[serde(default)]
    pub wolf: WolfOptions,
    #[serde(default)]
    pub seer: SeerOptions,
    #[serde(default)]
    pub witch: WitchOptions,
    #[serde(default)]
    pub guard: GuardOptions,
    #[serde(default)]
    pub hunter: HunterOptions,
    #[serde(default)]
    pub fool: FoolOptions,
    #[serde(default)]
    pub thief: ThiefOptions,
    #[serde(default)]
    pub matchmaker: MatchmakerOptions,

    /// Neutral victory is only possible when this block is present.
    #[serde(default)]
    pub neutral_victory: Option<NeutralVictory>,

    /// Seeds the deal shuffle and forced random picks.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl MatchConfig {
    /// The classic twelve-seat table: three wolves, five villagers, and one
    /// each of seer, witch, hunter, and guard.
    pub fn standard() -> Self {
        let role_distribution = BTreeMap::from([
            (RoleKind::Wolf, 3),
            (RoleKind::Villager, 5),
            (RoleKind::Seer, 1),
            (RoleKind::Witch, 1),
            (RoleKind::Hunter, 1),
            (RoleKind::Guard, 1),
        ]);

        let cooldowns = BTreeMap::from([
            (RoleKind::Wolf, BTreeMap::from([(Skill::Kill, 0)])),
            (RoleKind::Seer, BTreeMap::from([(Skill::Check, 1)])),
            (
                RoleKind::Witch,
                BTreeMap::from([(Skill::Heal, 3), (Skill::Poison, 0)]),
            ),
            (RoleKind::Hunter, BTreeMap::from([(Skill::Shoot, 1)])),
            (RoleKind::Guard, BTreeMap::from([(Skill::Protect, 1)])),
            (RoleKind::Fool, BTreeMap::from([(Skill::Reveal, 999)])),
            (RoleKind::Thief, BTreeMap::from([(Skill::Steal, 999)])),
            (RoleKind::Matchmaker, BTreeMap::from([(Skill::Match, 999)])),
        ]);

        Self {
            phases: PhaseTable::uniform(Duration::from_secs(5)),
            role_distribution,
            cooldowns,
            wolf: WolfOptions::default(),
            seer: SeerOptions::default(),
            witch: WitchOptions::default(),
            guard: GuardOptions::default(),
            hunter: HunterOptions::default(),
            fool: FoolOptions::default(),
            thief: ThiefOptions::default(),
            matchmaker: MatchmakerOptions::default(),
            neutral_victory: None,
            seed: None,
        }
    }

    /// Parses a configuration bundle from JSON.
    ///
    /// Only the shape is checked here; call [`validate`](Self::validate)
    /// against the roster before creating a match.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Total number of roles the distribution deals.
    pub fn role_count(&self) -> usize {
        self.role_distribution.values().sum()
    }

    /// Cooldown reset values for one role kind.
    pub fn cooldowns_for(&self, kind: RoleKind) -> BTreeMap<Skill, u32> {
        self.cooldowns.get(&kind).cloned().unwrap_or_default()
    }

    /// Checks that this configuration can run a match for `roster`.
    pub fn validate(&self, roster: &[ParticipantId]) -> Result<(), ConfigError> {
        if roster.is_empty() {
            return Err(ConfigError::EmptyRoster);
        }
        let mut seen = HashSet::with_capacity(roster.len());
        for id in roster {
            if !seen.insert(id) {
                return Err(ConfigError::DuplicateParticipant(id.clone()));
            }
        }

        let roles = self.role_count();
        if roles != roster.len() {
            return Err(ConfigError::RoleCountMismatch {
                roles,
                participants: roster.len(),
            });
        }

        for (phase, settings) in self.phases.entries() {
            if settings.duration_ms == 0 {
                return Err(ConfigError::InvalidPhase {
                    phase,
                    reason: "duration must be greater than zero".into(),
                });
            }
        }

        if self.seer.max_checks == 0 {
            return Err(ConfigError::InvalidOption(
                "seer.max_checks must be greater than zero".into(),
            ));
        }
        if self.guard.max_protects == 0 {
            return Err(ConfigError::InvalidOption(
                "guard.max_protects must be greater than zero".into(),
            ));
        }
        if self.wolf.night_kill_limit == 0 {
            return Err(ConfigError::InvalidOption(
                "wolf.night_kill_limit must be greater than zero".into(),
            ));
        }

        if self.deals(RoleKind::Thief) {
            if self.thief.stealable_roles.contains(&RoleKind::Thief) {
                return Err(ConfigError::InvalidOption(
                    "thief.stealable_roles cannot contain the thief".into(),
                ));
            }
            if self.thief.must_steal && self.thief.stealable_roles.is_empty() {
                return Err(ConfigError::InvalidOption(
                    "thief.must_steal requires at least one stealable role".into(),
                ));
            }
        }

        if let Some(neutral) = &self.neutral_victory {
            if neutral.min_players == 0 {
                return Err(ConfigError::InvalidOption(
                    "neutral_victory.min_players must be greater than zero".into(),
                ));
            }
            let rate = neutral.required_survival_rate;
            if !(rate > 0.0 && rate <= 1.0) {
                return Err(ConfigError::InvalidOption(format!(
                    "neutral_victory.required_survival_rate {rate} is outside (0, 1]"
                )));
            }
        }

        Ok(())
    }

    fn deals(&self, kind: RoleKind) -> bool {
        self.role_distribution.get(&kind).copied().unwrap_or(0) > 0
    }
}
