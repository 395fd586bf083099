use super::{Capability, RoleBase};
use crate::{ActionScope, FoolOptions, RoleKind, Skill};

/// Survives an elimination vote by revealing, once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fool {
    base: RoleBase,
    options: FoolOptions,
    revealed: bool,
    reveals_used: u32,
}

impl Fool {
    pub fn new(base: RoleBase, options: FoolOptions) -> Self {
        Self {
            base,
            options,
            revealed: false,
            reveals_used: 0,
        }
    }

    pub fn is_revealed(&self) -> bool {
        self.revealed
    }

    /// Reveals to cancel the current elimination. Fails once revealed.
    pub fn reveal(&mut self, scope: &mut ActionScope<'_>) -> bool {
        let Some(status) = scope.status(self.owner()) else {
            return false;
        };
        if self.revealed || self.reveals_used >= self.options.reveal_immunity {
            return false;
        }
        if !self.use_skill(Skill::Reveal, &status) {
            return false;
        }
        self.revealed = true;
        self.reveals_used += 1;
        true
    }
}

impl Capability for Fool {
    fn kind(&self) -> RoleKind {
        RoleKind::Fool
    }

    fn base(&self) -> &RoleBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RoleBase {
        &mut self.base
    }
}
