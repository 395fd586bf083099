use nightfall_protocol::ParticipantId;

use super::{Capability, RoleBase};
use crate::{ActionScope, MatchmakerOptions, RoleKind, Skill};

/// Bonds two participants into the lovers team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matchmaker {
    base: RoleBase,
    options: MatchmakerOptions,
    matches_made: u32,
}

impl Matchmaker {
    pub fn new(base: RoleBase, options: MatchmakerOptions) -> Self {
        Self {
            base,
            options,
            matches_made: 0,
        }
    }

    pub fn matches_made(&self) -> u32 {
        self.matches_made
    }

    /// Links `a` and `b`. Both must be distinct, alive, and not yet linked.
    pub fn link(
        &mut self,
        a: &ParticipantId,
        b: &ParticipantId,
        scope: &mut ActionScope<'_>,
    ) -> bool {
        let Some(status) = scope.status(self.owner()) else {
            return false;
        };
        if self.matches_made >= self.options.max_matches || a == b {
            return false;
        }
        if !scope.is_alive(a) || !scope.is_alive(b) || scope.is_linked(a) || scope.is_linked(b) {
            return false;
        }
        if !self.use_skill(Skill::Match, &status) {
            return false;
        }

        self.matches_made += 1;
        scope.link_lovers(a, b)
    }
}

impl Capability for Matchmaker {
    fn kind(&self) -> RoleKind {
        RoleKind::Matchmaker
    }

    fn base(&self) -> &RoleBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RoleBase {
        &mut self.base
    }
}
