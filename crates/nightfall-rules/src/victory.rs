//! Win-condition evaluator.

use std::collections::{BTreeSet, HashMap};

use nightfall_protocol::{ParticipantId, Team};

use crate::NeutralVictory;

/// Decides whether a team has won, from team membership and the
/// alive/dead partition.
///
/// The engine keeps it in sync with explicit calls: [`register`] when a
/// participant is seated or changes team, [`remove`] when one dies.
///
/// Rules, first match wins:
///
/// 1. **Lovers**: at least two lovers alive and nobody else alive.
/// 2. **Wolf**: at least one wolf alive and wolves ≥ village. A tie goes
///    to the wolves.
/// 3. **Village**: no wolves alive and at least one villager alive.
/// 4. **Neutral**: only with a [`NeutralVictory`] rule, when enough
///    neutrals are alive and they make up a large enough share.
///
/// [`register`]: Self::register
/// [`remove`]: Self::remove
#[derive(Debug, Clone, Default)]
pub struct VictoryEvaluator {
    teams: HashMap<ParticipantId, Team>,
    alive: BTreeSet<ParticipantId>,
    dead: BTreeSet<ParticipantId>,
    neutral: Option<NeutralVictory>,
}

impl VictoryEvaluator {
    pub fn new(neutral: Option<NeutralVictory>) -> Self {
        Self {
            neutral,
            ..Self::default()
        }
    }

    /// Records `id` as playing for `team`. A participant already known keeps
    /// its alive/dead standing.
    pub fn register(&mut self, id: ParticipantId, team: Team) {
        if !self.dead.contains(&id) {
            self.alive.insert(id.clone());
        }
        self.teams.insert(id, team);
    }

    /// Marks `id` dead. Its team is kept for the record.
    pub fn remove(&mut self, id: &ParticipantId) {
        if self.alive.remove(id) {
            self.dead.insert(id.clone());
        }
    }

    pub fn team_of(&self, id: &ParticipantId) -> Option<Team> {
        self.teams.get(id).copied()
    }

    pub fn alive_count(&self, team: Team) -> usize {
        self.alive
            .iter()
            .filter(|id| self.teams.get(*id) == Some(&team))
            .count()
    }

    pub fn total_alive(&self) -> usize {
        self.alive.len()
    }

    /// The winning team, or `None` if play continues.
    pub fn evaluate(&self) -> Option<Team> {
        let total = self.total_alive();
        let lovers = self.alive_count(Team::Lovers);
        let wolves = self.alive_count(Team::Wolf);
        let village = self.alive_count(Team::Village);

        if lovers >= 2 && total == lovers {
            return Some(Team::Lovers);
        }
        if wolves > 0 && wolves >= village {
            return Some(Team::Wolf);
        }
        if wolves == 0 && village > 0 {
            return Some(Team::Village);
        }
        if let Some(rule) = &self.neutral {
            let neutrals = self.alive_count(Team::Neutral);
            if total > 0
                && neutrals >= rule.min_players
                && neutrals as f64 / total as f64 >= rule.required_survival_rate
            {
                return Some(Team::Neutral);
            }
        }
        None
    }
}
