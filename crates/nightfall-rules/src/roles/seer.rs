use nightfall_protocol::{ParticipantId, Phase};

use super::{Capability, RoleBase};
use crate::{ActionScope, RoleKind, SeerOptions, Skill};

/// Learns one participant's role and team per check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seer {
    base: RoleBase,
    options: SeerOptions,
    checks_used: u32,
    last_result: Option<String>,
}

impl Seer {
    pub fn new(base: RoleBase, options: SeerOptions) -> Self {
        Self {
            base,
            options,
            checks_used: 0,
            last_result: None,
        }
    }

    pub fn checks_used(&self) -> u32 {
        self.checks_used
    }

    /// The formatted result of the most recent successful check.
    pub fn last_result(&self) -> Option<&str> {
        self.last_result.as_deref()
    }

    /// Reads `target`'s role and team into [`last_result`](Self::last_result).
    pub fn check(&mut self, target: &ParticipantId, scope: &mut ActionScope<'_>) -> bool {
        let Some(status) = scope.status(self.owner()) else {
            return false;
        };
        if !self.can_use(Skill::Check, &status) || self.checks_used >= self.options.max_checks {
            return false;
        }
        if self.options.night_only && scope.phase() != Phase::Night {
            return false;
        }
        if target == self.owner() && !self.options.allow_self_check {
            return false;
        }
        let Some(seen) = scope.participant(target).filter(|p| p.status.alive) else {
            return false;
        };

        let result = self
            .options
            .result_format
            .replace("{target}", target.as_str())
            .replace("{role}", seen.role.as_str())
            .replace("{team}", seen.team.as_str());

        self.use_skill(Skill::Check, &status);
        self.checks_used += 1;
        self.last_result = Some(result);
        true
    }
}

impl Capability for Seer {
    fn kind(&self) -> RoleKind {
        RoleKind::Seer
    }

    fn base(&self) -> &RoleBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RoleBase {
        &mut self.base
    }
}
