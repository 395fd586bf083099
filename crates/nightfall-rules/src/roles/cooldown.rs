use std::collections::BTreeMap;

use crate::Skill;

/// Per-skill cooldown counters.
///
/// A counter at zero means the skill is ready. Using a skill resets its
/// counter to the configured value; every phase entry decays each counter
/// by one. Skills without a configured value reset to zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cooldowns {
    defaults: BTreeMap<Skill, u32>,
    current: BTreeMap<Skill, u32>,
}

impl Cooldowns {
    /// All counters start at zero.
    pub fn new(defaults: BTreeMap<Skill, u32>) -> Self {
        Self {
            defaults,
            current: BTreeMap::new(),
        }
    }

    pub fn is_ready(&self, skill: Skill) -> bool {
        self.remaining(skill) == 0
    }

    pub fn remaining(&self, skill: Skill) -> u32 {
        self.current.get(&skill).copied().unwrap_or(0)
    }

    /// The configured reset value for `skill`.
    pub fn default_for(&self, skill: Skill) -> u32 {
        self.defaults.get(&skill).copied().unwrap_or(0)
    }

    /// Resets `skill` to its configured value.
    pub fn trigger(&mut self, skill: Skill) {
        let reset = self.default_for(skill);
        self.current.insert(skill, reset);
    }

    /// Decrements every running counter by one.
    pub fn decay(&mut self) {
        for remaining in self.current.values_mut() {
            *remaining = remaining.saturating_sub(1);
        }
    }

    /// Overwrites a live counter. No bounds are applied.
    pub fn set(&mut self, skill: Skill, value: u32) {
        self.current.insert(skill, value);
    }
}
