use super::{Capability, RoleBase};
use crate::{ActionScope, RoleKind, Skill, ThiefOptions};

/// Trades itself for another role at the start of the match.
///
/// The thief only records the choice; the engine replaces the whole role
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thief {
    base: RoleBase,
    options: ThiefOptions,
    stolen: Option<RoleKind>,
}

impl Thief {
    pub fn new(base: RoleBase, options: ThiefOptions) -> Self {
        Self {
            base,
            options,
            stolen: None,
        }
    }

    pub fn stealable(&self) -> &[RoleKind] {
        &self.options.stealable_roles
    }

    pub fn must_steal(&self) -> bool {
        self.options.must_steal
    }

    pub fn options(&self) -> &ThiefOptions {
        &self.options
    }

    pub fn stolen(&self) -> Option<RoleKind> {
        self.stolen
    }

    /// Accepts `choice` if it is on the stealable list.
    pub fn steal(&mut self, choice: RoleKind, scope: &mut ActionScope<'_>) -> bool {
        let Some(status) = scope.status(self.owner()) else {
            return false;
        };
        if self.stolen.is_some() || choice == RoleKind::Thief || !self.stealable().contains(&choice) {
            return false;
        }
        if !self.use_skill(Skill::Steal, &status) {
            return false;
        }
        self.stolen = Some(choice);
        true
    }
}

impl Capability for Thief {
    fn kind(&self) -> RoleKind {
        RoleKind::Thief
    }

    fn base(&self) -> &RoleBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RoleBase {
        &mut self.base
    }
}
