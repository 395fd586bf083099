use nightfall_protocol::{ParticipantId, Phase};

use super::{Capability, RoleBase};
use crate::{ActionScope, DeathCause, RoleKind, Skill, WitchOptions};

/// Holds one heal charge and one poison charge, each single-use.
///
/// Neither action looks at protection: heal edits the death set directly
/// and poison goes through it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Witch {
    base: RoleBase,
    options: WitchOptions,
    heal_available: bool,
    poison_available: bool,
}

impl Witch {
    pub fn new(base: RoleBase, options: WitchOptions) -> Self {
        Self {
            base,
            options,
            heal_available: true,
            poison_available: true,
        }
    }

    pub fn has_heal(&self) -> bool {
        self.heal_available
    }

    pub fn has_poison(&self) -> bool {
        self.poison_available
    }

    /// Takes `target` back off tonight's death set.
    pub fn heal(&mut self, target: &ParticipantId, scope: &mut ActionScope<'_>) -> bool {
        let Some(status) = scope.status(self.owner()) else {
            return false;
        };
        if !self.heal_available || scope.phase() != Phase::Night {
            return false;
        }
        if target == self.owner() && !self.options.can_save_self {
            return false;
        }
        if !scope.active_deaths().contains(target) || !self.use_skill(Skill::Heal, &status) {
            return false;
        }

        self.heal_available = false;
        scope.spare(target)
    }

    /// Adds `target` to tonight's death set.
    ///
    /// A target already doomed tonight is rejected so the charge is kept.
    pub fn poison(&mut self, target: &ParticipantId, scope: &mut ActionScope<'_>) -> bool {
        let Some(status) = scope.status(self.owner()) else {
            return false;
        };
        if !self.poison_available || scope.phase() != Phase::Night || target == self.owner() {
            return false;
        }
        if !scope.is_alive(target) || scope.active_deaths().contains(target) {
            return false;
        }
        if !self.use_skill(Skill::Poison, &status) {
            return false;
        }

        self.poison_available = false;
        scope.set_poisoned(target);
        scope.doom(target, DeathCause::Poison)
    }
}

impl Capability for Witch {
    fn kind(&self) -> RoleKind {
        RoleKind::Witch
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
    use crate::{MatchConfig, MatchState, Role};

    fn witch(config: &MatchConfig) -> Witch {
        match role(RoleKind::Witch, "h", config) {
            Role::Witch(w) => w,
            _ => unreachable!(),
        }
    }

    fn night() -> MatchState {
        table(
            &[("h", RoleKind::Witch), ("a", RoleKind::Villager), ("b", RoleKind::Villager)],
            Phase::Night,
        )
    }

    #[test]
    fn test_heal_spares_doomed_target_once() {
        let config = MatchConfig::standard();
        let mut state = night();
        state.scope().doom(&"a".into(), DeathCause::WolfKill);
        let mut w = witch(&config);

        assert!(!w.heal(&"b".into(), &mut state.scope()), "b is not dying");
        assert!(w.has_heal());
        assert!(w.heal(&"a".into(), &mut state.scope()));
        assert!(state.night_deaths().is_empty());
        assert!(!w.has_heal());

        state.scope().doom(&"a".into(), DeathCause::WolfKill);
        assert!(!w.heal(&"a".into(), &mut state.scope()));
    }

    #[test]
    fn test_self_heal_is_gated() {
        let config = MatchConfig::standard();
        let mut state = night();
        state.scope().doom(&"h".into(), DeathCause::WolfKill);
        let mut w = witch(&config);
        assert!(!w.heal(&"h".into(), &mut state.scope()));

        let mut config = MatchConfig::standard();
        config.witch.can_save_self = true;
        let mut w = witch(&config);
        assert!(w.heal(&"h".into(), &mut state.scope()));
    }

    #[test]
    fn test_poison_ignores_protection_and_marks_status() {
        let config = MatchConfig::standard();
        let mut state = night();
        state.scope().set_protected(&"b".into());
        let mut w = witch(&config);

        assert!(!w.poison(&"h".into(), &mut state.scope()));
        assert!(w.poison(&"b".into(), &mut state.scope()));
        assert_eq!(state.night_deaths().cause_of(&"b".into()), Some(DeathCause::Poison));
        assert!(state.participant(&"b".into()).unwrap().status.poisoned);
        assert!(!w.has_poison());
    }

    #[test]
    fn test_poison_keeps_charge_when_target_already_doomed() {
        let config = MatchConfig::standard();
        let mut state = night();
        state.scope().doom(&"a".into(), DeathCause::WolfKill);
        let mut w = witch(&config);
        assert!(!w.poison(&"a".into(), &mut state.scope()));
        assert!(w.has_poison());
    }
}
