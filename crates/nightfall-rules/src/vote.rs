//! Weighted plurality vote tally.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use nightfall_protocol::ParticipantId;

/// Collects one ballot per voter and resolves a strict plurality.
///
/// Weights default to 1 and survive [`reset`](Self::reset), so they can be
/// set once per match. Ballots remember the weight they were cast with;
/// re-voting withdraws the old ballot before counting the new one.
#[derive(Debug, Clone, Default)]
pub struct VoteTally {
    ballots: BTreeMap<ParticipantId, (ParticipantId, u32)>,
    abstainers: BTreeSet<ParticipantId>,
    counts: BTreeMap<ParticipantId, u32>,
    weights: HashMap<ParticipantId, u32>,
    abstentions: u32,
}

impl VoteTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears ballots, counts, and abstentions. Weights are kept.
    pub fn reset(&mut self) {
        self.ballots.clear();
        self.abstainers.clear();
        self.counts.clear();
        self.abstentions = 0;
    }

    pub fn set_weight(&mut self, voter: ParticipantId, weight: u32) {
        self.weights.insert(voter, weight);
    }

    pub fn weight_of(&self, voter: &ParticipantId) -> u32 {
        self.weights.get(voter).copied().unwrap_or(1)
    }

    /// Records `voter`'s ballot. `None` is an abstention.
    pub fn cast(&mut self, voter: ParticipantId, target: Option<ParticipantId>) {
        self.withdraw(&voter);
        match target {
            None => {
                self.abstentions += 1;
                self.abstainers.insert(voter);
            }
            Some(target) => {
                let weight = self.weight_of(&voter);
                *self.counts.entry(target.clone()).or_insert(0) += weight;
                self.ballots.insert(voter, (target, weight));
            }
        }
    }

    fn withdraw(&mut self, voter: &ParticipantId) {
        if let Some((previous, weight)) = self.ballots.remove(voter) {
            if let Some(count) = self.counts.get_mut(&previous) {
                *count = count.saturating_sub(weight);
                if *count == 0 {
                    self.counts.remove(&previous);
                }
            }
        } else if self.abstainers.remove(voter) {
            self.abstentions -= 1;
        }
    }

    /// The unique target with the most votes.
    ///
    /// `None` when nobody was voted for or when the top count is shared.
    pub fn resolve(&self) -> Option<ParticipantId> {
        let max = self.counts.values().copied().max().filter(|&m| m > 0)?;
        let mut leaders = self.counts.iter().filter(|(_, count)| **count == max);
        let (leader, _) = leaders.next()?;
        if leaders.next().is_some() {
            return None;
        }
        Some(leader.clone())
    }

    /// `(target, votes)` pairs, most votes first, then by id.
    pub fn summary(&self) -> Vec<(ParticipantId, u32)> {
        let mut summary: Vec<_> = self
            .counts
            .iter()
            .map(|(target, count)| (target.clone(), *count))
            .collect();
        summary.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        summary
    }

    pub fn top(&self, n: usize) -> Vec<(ParticipantId, u32)> {
        let mut summary = self.summary();
        summary.truncate(n);
        summary
    }

    pub fn votes_for(&self, target: &ParticipantId) -> u32 {
        self.counts.get(target).copied().unwrap_or(0)
    }

    pub fn choice_of(&self, voter: &ParticipantId) -> Option<&ParticipantId> {
        self.ballots.get(voter).map(|(target, _)| target)
    }

    pub fn abstentions(&self) -> u32 {
        self.abstentions
    }

    /// Number of non-abstaining ballots.
    pub fn ballots_cast(&self) -> usize {
        self.ballots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ParticipantId {
        ParticipantId::new(s)
    }

    fn tally(votes: &[(&str, &str)]) -> VoteTally {
        let mut t = VoteTally::new();
        for (voter, target) in votes {
            t.cast(id(voter), Some(id(target)));
        }
        t
    }

    #[test]
    fn test_unique_maximum_resolves() {
        let t = tally(&[("1", "A"), ("2", "A"), ("3", "A"), ("4", "B")]);
        assert_eq!(t.resolve(), Some(id("A")));
    }

    #[test]
    fn test_tie_resolves_to_none() {
        let t = tally(&[("1", "A"), ("2", "A"), ("3", "B"), ("4", "B")]);
        assert_eq!(t.resolve(), None);
    }

    #[test]
    fn test_empty_and_abstain_only_resolve_to_none() {
        let mut t = VoteTally::new();
        assert_eq!(t.resolve(), None);
        t.cast(id("1"), None);
        t.cast(id("2"), None);
        assert_eq!(t.resolve(), None);
        assert_eq!(t.abstentions(), 2);
    }

    #[test]
    fn test_revote_overwrites_previous_ballot() {
        let mut t = tally(&[("1", "A"), ("2", "B")]);
        t.cast(id("1"), Some(id("B")));
        assert_eq!(t.votes_for(&id("A")), 0);
        assert_eq!(t.votes_for(&id("B")), 2);
        assert_eq!(t.resolve(), Some(id("B")));

        t.cast(id("1"), None);
        assert_eq!(t.abstentions(), 1);
        t.cast(id("1"), Some(id("A")));
        assert_eq!(t.abstentions(), 0);
        assert_eq!(t.resolve(), None);
    }

    #[test]
    fn test_weights_apply_and_survive_reset() {
        let mut t = VoteTally::new();
        t.set_weight(id("mayor"), 2);
        t.cast(id("mayor"), Some(id("A")));
        t.cast(id("1"), Some(id("B")));
        assert_eq!(t.resolve(), Some(id("A")));

        t.reset();
        assert_eq!(t.ballots_cast(), 0);
        assert_eq!(t.weight_of(&id("mayor")), 2);
    }

    #[test]
    fn test_summary_orders_by_count() {
        let t = tally(&[("1", "B"), ("2", "A"), ("3", "A"), ("4", "C")]);
        assert_eq!(
            t.summary(),
            vec![(id("A"), 2), (id("B"), 1), (id("C"), 1)]
        );
        assert_eq!(t.top(1), vec![(id("A"), 2)]);
        assert_eq!(t.choice_of(&id("4")), Some(&id("C")));
    }
}
