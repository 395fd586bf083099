use nightfall_protocol::ParticipantId;

use super::{Capability, RoleBase};
use crate::{ActionScope, DeathCause, HunterOptions, RoleKind, Skill, Status};

/// Takes one participant down with them on death.
///
/// The shot is a death reaction, so unlike other skills it does not need
/// the owner alive (when `can_shoot_dead` is set). It also ignores
/// protection; a guard's save only applies to the kill it cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunter {
    base: RoleBase,
    options: HunterOptions,
    has_shot: bool,
}

impl Hunter {
    pub fn new(base: RoleBase, options: HunterOptions) -> Self {
        Self {
            base,
            options,
            has_shot: false,
        }
    }

    pub fn has_shot(&self) -> bool {
        self.has_shot
    }

    /// Whether a shot is still possible for an owner in `status`.
    pub fn can_retaliate(&self, status: &Status) -> bool {
        !self.has_shot
            && !status.silenced
            && (status.alive || self.options.can_shoot_dead)
            && self.cooldowns().is_ready(Skill::Shoot)
    }

    /// Adds `target` to the current phase's death set.
    pub fn retaliate(&mut self, target: &ParticipantId, scope: &mut ActionScope<'_>) -> bool {
        let Some(status) = scope.status(self.owner()) else {
            return false;
        };
        if !self.can_retaliate(&status) || target == self.owner() || !scope.is_alive(target) {
            return false;
        }
        if !scope.doom(target, DeathCause::HunterShot) {
            return false;
        }

        self.cooldowns_mut().trigger(Skill::Shoot);
        self.has_shot = true;
        true
    }
}

impl Capability for Hunter {
    fn kind(&self) -> RoleKind {
        RoleKind::Hunter
    }

    fn base(&self) -> &RoleBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RoleBase {
        &mut self.base
    }
}

#[cfg(test)]
mod tests {
    use nightfall_protocol::Phase;

    use super::*;
    use crate::roles::test_support::{role, table};
    use crate::{MatchConfig, Role};

    fn hunter(config: &MatchConfig) -> Hunter {
        match role(RoleKind::Hunter, "h", config) {
            Role::Hunter(h) => h,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_dead_hunter_shoots_once() {
        let config = MatchConfig::standard();
        let mut state = table(
            &[("h", RoleKind::Hunter), ("a", RoleKind::Wolf), ("b", RoleKind::Villager)],
            Phase::DayVote,
        );
        state.mark_dead(&"h".into());
        let mut h = hunter(&config);

        assert!(!h.retaliate(&"h".into(), &mut state.scope()));
        assert!(h.retaliate(&"a".into(), &mut state.scope()));
        assert_eq!(state.day_deaths().cause_of(&"a".into()), Some(DeathCause::HunterShot));
        assert!(!h.retaliate(&"b".into(), &mut state.scope()));
        assert!(h.has_shot());
    }

    #[test]
    fn test_shot_ignores_protection() {
        let config = MatchConfig::standard();
        let mut state = table(&[("h", RoleKind::Hunter), ("a", RoleKind::Wolf)], Phase::Night);
        state.scope().set_protected(&"a".into());
        state.mark_dead(&"h".into());
        let mut h = hunter(&config);
        assert!(h.retaliate(&"a".into(), &mut state.scope()));
        assert!(state.night_deaths().contains(&"a".into()));
    }

    #[test]
    fn test_cannot_shoot_dead_when_disabled() {
        let mut config = MatchConfig::standard();
        config.hunter.can_shoot_dead = false;
        let mut state = table(&[("h", RoleKind::Hunter), ("a", RoleKind::Wolf)], Phase::Night);
        state.mark_dead(&"h".into());
        let mut h = hunter(&config);
        assert!(!h.retaliate(&"a".into(), &mut state.scope()));
    }
}
