use nightfall_protocol::{ParticipantId, Phase};
use tracing::debug;

use super::{Capability, RoleBase};
use crate::{ActionScope, DeathCause, RoleKind, Skill, WolfOptions};

/// Kills at night, up to a per-night limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wolf {
    base: RoleBase,
    options: WolfOptions,
    kills_tonight: u32,
}

impl Wolf {
    pub fn new(base: RoleBase, options: WolfOptions) -> Self {
        Self {
            base,
            options,
            kills_tonight: 0,
        }
    }

    pub fn kills_tonight(&self) -> u32 {
        self.kills_tonight
    }

    /// Puts `target` on the night's death set.
    ///
    /// Rejected outside the night, past the nightly limit, on self unless
    /// configured, on a dead target, and on a protected target.
    pub fn kill(&mut self, target: &ParticipantId, scope: &mut ActionScope<'_>) -> bool {
        let Some(status) = scope.status(self.owner()) else {
            return false;
        };
        if scope.phase() != Phase::Night || self.kills_tonight >= self.options.night_kill_limit {
            return false;
        }
        if target == self.owner() && !self.options.can_kill_self {
            return false;
        }
        let Some(target_status) = scope.status(target) else {
            return false;
        };
        if !target_status.alive || !self.can_use(Skill::Kill, &status) {
            return false;
        }
        if target_status.protected {
            debug!(wolf = %self.owner(), %target, "kill blocked by protection");
            return false;
        }

        self.use_skill(Skill::Kill, &status);
        self.kills_tonight += 1;
        scope.doom(target, DeathCause::WolfKill)
    }
}

impl Capability for Wolf {
    fn kind(&self) -> RoleKind {
        RoleKind::Wolf
    }

    fn base(&self) -> &RoleBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RoleBase {
        &mut self.base
    }

    fn on_phase_enter(&mut self, phase: Phase) {
        self.cooldowns_mut().decay();
        if phase == Phase::DayDiscussion {
            self.kills_tonight = 0;
        }
    }
}
