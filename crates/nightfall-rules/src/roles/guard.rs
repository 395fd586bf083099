use nightfall_protocol::{ParticipantId, Phase};

use super::{Capability, RoleBase};
use crate::{ActionScope, GuardOptions, RoleKind, Skill};

/// Protects one participant per night.
///
/// Guards act after the wolves and the witch, so a protection also takes
/// its target back off tonight's death set, whatever put it there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guard {
    base: RoleBase,
    options: GuardOptions,
    protects_used: u32,
    /// Last target and the round it was protected in.
    last_protected: Option<(ParticipantId, u32)>,
}

impl Guard {
    pub fn new(base: RoleBase, options: GuardOptions) -> Self {
        Self {
            base,
            options,
            protects_used: 0,
            last_protected: None,
        }
    }

    pub fn protects_used(&self) -> u32 {
        self.protects_used
    }

    pub fn last_protected(&self) -> Option<&ParticipantId> {
        self.last_protected.as_ref().map(|(id, _)| id)
    }

    /// `true` if `target` was protected tonight or the night before.
    fn protected_recently(&self, target: &ParticipantId, round: u32) -> bool {
        self.last_protected
            .as_ref()
            .is_some_and(|(id, last)| id == target && round <= last + 1)
    }

    pub fn protect(&mut self, target: &ParticipantId, scope: &mut ActionScope<'_>) -> bool {
        let Some(status) = scope.status(self.owner()) else {
            return false;
        };
        if scope.phase() != Phase::Night || self.protects_used >= self.options.max_protects {
            return false;
        }
        if !self.options.consecutive_protection && self.protected_recently(target, scope.round()) {
            return false;
        }
        if !scope.is_alive(target) || !self.use_skill(Skill::Protect, &status) {
            return false;
        }

        scope.set_protected(target);
        scope.spare(target);
        self.protects_used += 1;
        self.last_protected = Some((target.clone(), scope.round()));
        true
    }
}

impl Capability for Guard {
    fn kind(&self) -> RoleKind {
        RoleKind::Guard
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
    use super::*;
    use crate::roles::test_support::{role, table};
    use crate::{DeathCause, MatchConfig, Role};

    fn guard(config: &MatchConfig) -> Guard {
        match role(RoleKind::Guard, "g", config) {
            Role::Guard(g) => g,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_protect_clears_a_pending_death() {
        let config = MatchConfig::standard();
        let mut state = table(&[("g", RoleKind::Guard), ("a", RoleKind::Villager)], Phase::Night);
        state.scope().doom(&"a".into(), DeathCause::WolfKill);
        let mut g = guard(&config);

        assert!(g.protect(&"a".into(), &mut state.scope()));
        assert!(state.night_deaths().is_empty());
        assert!(state.participant(&"a".into()).unwrap().status.protected);
        assert_eq!(g.last_protected(), Some(&"a".into()));
    }

    #[test]
    fn test_consecutive_protection_is_refused_by_default() {
        let mut config = MatchConfig::standard();
        config.cooldowns.remove(&RoleKind::Guard);
        let mut state = table(
            &[("g", RoleKind::Guard), ("a", RoleKind::Villager), ("b", RoleKind::Villager)],
            Phase::Night,
        );
        let mut g = guard(&config);

        assert!(g.protect(&"a".into(), &mut state.scope()));
        assert!(!g.protect(&"a".into(), &mut state.scope()));
        assert!(g.protect(&"b".into(), &mut state.scope()));
        assert_eq!(g.protects_used(), 2);
    }

    #[test]
    fn test_same_target_allowed_again_after_a_night_off() {
        let mut config = MatchConfig::standard();
        config.cooldowns.remove(&RoleKind::Guard);
        let mut state = table(&[("g", RoleKind::Guard), ("a", RoleKind::Villager)], Phase::Night);
        let mut g = guard(&config);

        // Round 1: protect a.
        assert!(g.protect(&"a".into(), &mut state.scope()));

        // Round 2: a is refused, so the guard protects nobody.
        for phase in [Phase::DayDiscussion, Phase::DayVote, Phase::Night] {
            state.set_phase(phase);
            g.on_phase_enter(phase);
        }
        state.advance_round();
        assert!(!g.protect(&"a".into(), &mut state.scope()));

        // Round 3: night 1 is not consecutive with night 3.
        for phase in [Phase::DayDiscussion, Phase::DayVote, Phase::Night] {
            state.set_phase(phase);
            g.on_phase_enter(phase);
        }
        state.advance_round();
        assert_eq!(state.round(), 3);
        assert!(g.protect(&"a".into(), &mut state.scope()));
        assert_eq!(g.protects_used(), 2);
    }

    #[test]
    fn test_consecutive_protection_when_allowed() {
        let mut config = MatchConfig::standard();
        config.cooldowns.remove(&RoleKind::Guard);
        config.guard.consecutive_protection = true;
        let mut state = table(&[("g", RoleKind::Guard), ("a", RoleKind::Villager)], Phase::Night);
        let mut g = guard(&config);
        assert!(g.protect(&"a".into(), &mut state.scope()));
        assert!(g.protect(&"a".into(), &mut state.scope()));
    }
}
