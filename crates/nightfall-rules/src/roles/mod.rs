//! Role capability set.
//!
//! Every role is a plain struct holding its owner's id, its cooldown
//! counters, its immutable option block, and its own use counters. The
//! [`Capability`] trait supplies the shared skill gate (alive, not
//! silenced, cooldown at zero) and per-phase decay; role-specific actions
//! are inherent methods that take an [`ActionScope`](crate::ActionScope).
//!
//! [`Role`] is the tagged variant the engine stores per participant. The
//! engine dispatches shared behavior through [`Role::capability`] and
//! matches on the variant only to reach a role-specific action.
//!
//! Action methods return `bool`. A `false` means the action was ineligible
//! (wrong phase, exhausted charge, bad target) and nothing changed; the
//! caller decides how to log it.

mod cooldown;
mod fool;
mod guard;
mod hunter;
mod matchmaker;
mod seer;
mod thief;
mod wolf;
mod witch;

pub use cooldown::Cooldowns;
pub use fool::Fool;
pub use guard::Guard;
pub use hunter::Hunter;
pub use matchmaker::Matchmaker;
pub use seer::Seer;
pub use thief::Thief;
pub use witch::Witch;
pub use wolf::Wolf;

use nightfall_protocol::{ParticipantId, Phase, Team};

use crate::{MatchConfig, RoleKind, Skill, Status};

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

/// State every role carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleBase {
    owner: ParticipantId,
    cooldowns: Cooldowns,
}

impl RoleBase {
    pub fn new(owner: ParticipantId, cooldowns: Cooldowns) -> Self {
        Self { owner, cooldowns }
    }
}

/// Behavior shared by every role.
pub trait Capability {
    fn kind(&self) -> RoleKind;

    fn base(&self) -> &RoleBase;

    fn base_mut(&mut self) -> &mut RoleBase;

    fn owner(&self) -> &ParticipantId {
        &self.base().owner
    }

    /// The team this role is dealt with.
    ///
    /// Lovers and stolen roles can move a participant to another team;
    /// [`Participant::team`](crate::Participant::team) is the one that
    /// counts for victory.
    fn team(&self) -> Team {
        self.kind().default_team()
    }

    fn cooldowns(&self) -> &Cooldowns {
        &self.base().cooldowns
    }

    fn cooldowns_mut(&mut self) -> &mut Cooldowns {
        &mut self.base_mut().cooldowns
    }

    /// `true` if the owner is alive, not silenced, and `skill` is off cooldown.
    fn can_use(&self, skill: Skill, status: &Status) -> bool {
        status.alive && !status.silenced && self.cooldowns().is_ready(skill)
    }

    /// Runs the [`can_use`](Self::can_use) gate and, on success, resets
    /// the skill's cooldown to its configured value.
    fn use_skill(&mut self, skill: Skill, status: &Status) -> bool {
        if !self.can_use(skill, status) {
            return false;
        }
        self.cooldowns_mut().trigger(skill);
        true
    }

    /// Called on every phase entry while the owner is alive.
    fn on_phase_enter(&mut self, _phase: Phase) {
        self.cooldowns_mut().decay();
    }
}

// ---------------------------------------------------------------------------
// Villager
// ---------------------------------------------------------------------------

/// A role with no ability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Villager {
    base: RoleBase,
}

impl Villager {
    pub fn new(base: RoleBase) -> Self {
        Self { base }
    }
}

impl Capability for Villager {
    fn kind(&self) -> RoleKind {
        RoleKind::Villager
    }

    fn base(&self) -> &RoleBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RoleBase {
        &mut self.base
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// A dealt role, bound to one participant.
#[derive(Debug, Clone, PartialEq)]
pub enum Role {
    Villager(Villager),
    Wolf(Wolf),
    Seer(Seer),
    Witch(Witch),
    Guard(Guard),
    Hunter(Hunter),
    Fool(Fool),
    Thief(Thief),
    Matchmaker(Matchmaker),
}

impl Role {
    /// Builds a fresh role of `kind` for `owner` from the match config.
    pub fn new(kind: RoleKind, owner: ParticipantId, config: &MatchConfig) -> Self {
        let base = RoleBase::new(owner, Cooldowns::new(config.cooldowns_for(kind)));
        match kind {
            RoleKind::Villager => Self::Villager(Villager::new(base)),
            RoleKind::Wolf => Self::Wolf(Wolf::new(base, config.wolf.clone())),
            RoleKind::Seer => Self::Seer(Seer::new(base, config.seer.clone())),
            RoleKind::Witch => Self::Witch(Witch::new(base, config.witch.clone())),
            RoleKind::Guard => Self::Guard(Guard::new(base, config.guard.clone())),
            RoleKind::Hunter => Self::Hunter(Hunter::new(base, config.hunter.clone())),
            RoleKind::Fool => Self::Fool(Fool::new(base, config.fool.clone())),
            RoleKind::Thief => Self::Thief(Thief::new(base, config.thief.clone())),
            RoleKind::Matchmaker => {
                Self::Matchmaker(Matchmaker::new(base, config.matchmaker.clone()))
            }
        }
    }

    pub fn capability(&self) -> &dyn Capability {
        match self {
            Self::Villager(r) => r,
            Self::Wolf(r) => r,
            Self::Seer(r) => r,
            Self::Witch(r) => r,
            Self::Guard(r) => r,
            Self::Hunter(r) => r,
            Self::Fool(r) => r,
            Self::Thief(r) => r,
            Self::Matchmaker(r) => r,
        }
    }

    pub fn capability_mut(&mut self) -> &mut dyn Capability {
        match self {
            Self::Villager(r) => r,
            Self::Wolf(r) => r,
            Self::Seer(r) => r,
            Self::Witch(r) => r,
            Self::Guard(r) => r,
            Self::Hunter(r) => r,
            Self::Fool(r) => r,
            Self::Thief(r) => r,
            Self::Matchmaker(r) => r,
        }
    }

    pub fn kind(&self) -> RoleKind {
        self.capability().kind()
    }

    /// Nominal team of the role kind. See [`Capability::team`].
    pub fn team(&self) -> Team {
        self.capability().team()
    }

    pub fn owner(&self) -> &ParticipantId {
        self.capability().owner()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_new_matches_kind_and_team() {
        let config = MatchConfig::standard();
        for kind in RoleKind::ALL {
            let role = Role::new(kind, "p1".into(), &config);
            assert_eq!(role.kind(), kind);
            assert_eq!(role.team(), kind.default_team());
            assert_eq!(role.owner().as_str(), "p1");
        }
    }

    #[test]
    fn test_role_team_stays_nominal_after_lovers_link() {
        let config = MatchConfig::standard();
        let mut state = test_support::table(
            &[("w", RoleKind::Wolf), ("v", RoleKind::Villager)],
            Phase::Night,
        );
        let wolf = test_support::role(RoleKind::Wolf, "w", &config);
        assert!(state.scope().link_lovers(&"w".into(), &"v".into()));

        assert_eq!(wolf.team(), Team::Wolf);
        assert_eq!(state.participant(&"w".into()).unwrap().team, Team::Lovers);
    }

    #[test]
    fn test_use_skill_starts_cooldown_when_configured() {
        let config = MatchConfig::standard();
        let mut role = Role::new(RoleKind::Seer, "p1".into(), &config);
        let status = Status::default();
        let cap = role.capability_mut();

        assert!(cap.can_use(Skill::Check, &status));
        assert!(cap.use_skill(Skill::Check, &status));
        assert!(!cap.can_use(Skill::Check, &status));

        cap.on_phase_enter(Phase::DayDiscussion);
        assert!(cap.can_use(Skill::Check, &status));
    }

    #[test]
    fn test_dead_or_silenced_owner_cannot_use_skills() {
        let config = MatchConfig::standard();
        let role = Role::new(RoleKind::Wolf, "p1".into(), &config);
        let dead = Status {
            alive: false,
            ..Status::default()
        };
        let silenced = Status {
            silenced: true,
            ..Status::default()
        };
        assert!(!role.capability().can_use(Skill::Kill, &dead));
        assert!(!role.capability().can_use(Skill::Kill, &silenced));
        assert!(role.capability().can_use(Skill::Kill, &Status::default()));
    }
}
