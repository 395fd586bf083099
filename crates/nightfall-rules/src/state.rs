//! Shared match state and the restricted view roles act through.
//!
//! [`MatchState`] is owned by the turn engine and is the only place the
//! alive and dead lists change. Roles never see it directly: their action
//! methods take an [`ActionScope`], which can read everything but can only
//! write status flags, teams, lover links, and the active death set.

use std::collections::BTreeMap;

use nightfall_protocol::{ParticipantId, Phase, Team};
use serde::{Deserialize, Serialize};

use crate::RoleKind;

// ---------------------------------------------------------------------------
// Participant
// ---------------------------------------------------------------------------

/// Transient flags on a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub alive: bool,
    pub protected: bool,
    pub poisoned: bool,
    pub silenced: bool,
}

impl Default for Status {
    fn default() -> Self {
        Self {
            alive: true,
            protected: false,
            poisoned: false,
            silenced: false,
        }
    }
}

/// One seat at the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub role: RoleKind,
    pub team: Team,
    pub status: Status,
    pub vote_weight: u32,
}

impl Participant {
    pub fn new(id: ParticipantId, role: RoleKind) -> Self {
        Self {
            id,
            role,
            team: role.default_team(),
            status: Status::default(),
            vote_weight: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Deaths
// ---------------------------------------------------------------------------

/// Why a participant is on a death list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathCause {
    WolfKill,
    Poison,
    Execution,
    HunterShot,
    Heartbreak,
}

impl DeathCause {
    /// Narration fragment that follows the participant's id.
    pub fn narration(&self) -> &'static str {
        match self {
            Self::WolfKill => "was killed during the night",
            Self::Poison => "was poisoned",
            Self::Execution => "was executed by the village",
            Self::HunterShot => "was shot by the hunter",
            Self::Heartbreak => "died of a broken heart",
        }
    }
}

/// Ordered set of participants doomed in the current phase.
///
/// Insertion order is the order deaths are applied in, so cascades land
/// after the death that caused them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeathSet {
    entries: Vec<(ParticipantId, DeathCause)>,
}

impl DeathSet {
    /// Adds `id` unless it is already present. Returns `true` if added.
    pub fn insert(&mut self, id: ParticipantId, cause: DeathCause) -> bool {
        if self.contains(&id) {
            return false;
        }
        self.entries.push((id, cause));
        true
    }

    /// Removes `id`. Returns `true` if it was present.
    pub fn remove(&mut self, id: &ParticipantId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| entry != id);
        self.entries.len() != before
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.entries.iter().any(|(entry, _)| entry == id)
    }

    pub fn cause_of(&self, id: &ParticipantId) -> Option<DeathCause> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == id)
            .map(|(_, cause)| *cause)
    }

    /// Entry at `index` in insertion order.
    pub fn get(&self, index: usize) -> Option<&(ParticipantId, DeathCause)> {
        self.entries.get(index)
    }

    pub fn ids(&self) -> impl Iterator<Item = &ParticipantId> {
        self.entries.iter().map(|(id, _)| id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// A line spoken during day discussion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Speech {
    pub speaker: ParticipantId,
    pub role: RoleKind,
    pub content: String,
    pub round: u32,
}

// ---------------------------------------------------------------------------
// MatchState
// ---------------------------------------------------------------------------

/// The full mutable state of one match.
#[derive(Debug, Clone)]
pub struct MatchState {
    participants: BTreeMap<ParticipantId, Participant>,
    alive: Vec<ParticipantId>,
    dead: Vec<ParticipantId>,
    phase: Phase,
    round: u32,
    night_deaths: DeathSet,
    day_deaths: DeathSet,
    speeches: Vec<Speech>,
    role_changes: BTreeMap<ParticipantId, RoleKind>,
    lovers: Vec<(ParticipantId, ParticipantId)>,
}

impl Default for MatchState {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchState {
    /// An empty table in `Waiting`, round 1.
    pub fn new() -> Self {
        Self {
            participants: BTreeMap::new(),
            alive: Vec::new(),
            dead: Vec::new(),
            phase: Phase::Waiting,
            round: 1,
            night_deaths: DeathSet::default(),
            day_deaths: DeathSet::default(),
            speeches: Vec::new(),
            role_changes: BTreeMap::new(),
            lovers: Vec::new(),
        }
    }

    /// Seats a living participant. Returns `false` if the id is taken.
    pub fn seat(&mut self, id: ParticipantId, role: RoleKind) -> bool {
        if self.participants.contains_key(&id) {
            return false;
        }
        self.alive.push(id.clone());
        self.participants
            .insert(id.clone(), Participant::new(id, role));
        true
    }

    // -- queries ------------------------------------------------------------

    pub fn participant(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.get(id)
    }

    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    /// Living participants in seating order.
    pub fn alive(&self) -> &[ParticipantId] {
        &self.alive
    }

    /// Dead participants in order of death.
    pub fn dead(&self) -> &[ParticipantId] {
        &self.dead
    }

    pub fn is_alive(&self, id: &ParticipantId) -> bool {
        self.participants
            .get(id)
            .is_some_and(|p| p.status.alive)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn night_deaths(&self) -> &DeathSet {
        &self.night_deaths
    }

    pub fn day_deaths(&self) -> &DeathSet {
        &self.day_deaths
    }

    /// The death set deaths in the current phase land in.
    pub fn active_deaths(&self) -> &DeathSet {
        if self.phase == Phase::Night {
            &self.night_deaths
        } else {
            &self.day_deaths
        }
    }

    pub fn speeches(&self) -> &[Speech] {
        &self.speeches
    }

    pub fn role_changes(&self) -> &BTreeMap<ParticipantId, RoleKind> {
        &self.role_changes
    }

    pub fn lovers(&self) -> &[(ParticipantId, ParticipantId)] {
        &self.lovers
    }

    /// The participant `id` is bonded to, if any.
    pub fn partner_of(&self, id: &ParticipantId) -> Option<&ParticipantId> {
        self.lovers.iter().find_map(|(a, b)| {
            if a == id {
                Some(b)
            } else if b == id {
                Some(a)
            } else {
                None
            }
        })
    }

    /// Resolves a free-form id against the roster, ignoring case and
    /// surrounding whitespace.
    pub fn find(&self, raw: &str) -> Option<&ParticipantId> {
        let raw = raw.trim();
        self.participants
            .keys()
            .find(|id| id.as_str().eq_ignore_ascii_case(raw))
    }

    /// Living participants of `role`, in seating order.
    pub fn alive_with_role(&self, role: RoleKind) -> Vec<ParticipantId> {
        self.alive
            .iter()
            .filter(|id| self.participants.get(*id).is_some_and(|p| p.role == role))
            .cloned()
            .collect()
    }

    // -- engine-only mutation ----------------------------------------------

    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub fn advance_round(&mut self) -> u32 {
        self.round += 1;
        self.round
    }

    pub fn active_deaths_mut(&mut self) -> &mut DeathSet {
        if self.phase == Phase::Night {
            &mut self.night_deaths
        } else {
            &mut self.day_deaths
        }
    }

    pub fn clear_night_deaths(&mut self) {
        self.night_deaths.clear();
    }

    pub fn clear_day_deaths(&mut self) {
        self.day_deaths.clear();
    }

    pub fn clear_speeches(&mut self) {
        self.speeches.clear();
    }

    pub fn record_speech(&mut self, speech: Speech) {
        self.speeches.push(speech);
    }

    /// Drops every protection flag.
    pub fn clear_protection(&mut self) {
        for participant in self.participants.values_mut() {
            participant.status.protected = false;
        }
    }

    pub fn set_silenced(&mut self, id: &ParticipantId, silenced: bool) -> bool {
        match self.participants.get_mut(id) {
            Some(p) => {
                p.status.silenced = silenced;
                true
            }
            None => false,
        }
    }

    pub fn set_vote_weight(&mut self, id: &ParticipantId, weight: u32) -> bool {
        match self.participants.get_mut(id) {
            Some(p) => {
                p.vote_weight = weight;
                true
            }
            None => false,
        }
    }

    /// Records that `id` now holds `role` and plays for `team`.
    pub fn reassign(&mut self, id: &ParticipantId, role: RoleKind, team: Team) -> bool {
        let Some(participant) = self.participants.get_mut(id) else {
            return false;
        };
        participant.role = role;
        participant.team = team;
        self.role_changes.insert(id.clone(), role);
        true
    }

    /// Moves `id` from the alive list to the dead list.
    ///
    /// Returns `false` if `id` is unknown or already dead.
    pub fn mark_dead(&mut self, id: &ParticipantId) -> bool {
        let Some(participant) = self.participants.get_mut(id) else {
            return false;
        };
        if !participant.status.alive {
            return false;
        }
        participant.status.alive = false;
        participant.status.protected = false;
        self.alive.retain(|a| a != id);
        self.dead.push(id.clone());
        true
    }

    /// Opens a restricted view for a role action.
    pub fn scope(&mut self) -> ActionScope<'_> {
        ActionScope { state: self }
    }
}

// ---------------------------------------------------------------------------
// ActionScope
// ---------------------------------------------------------------------------

/// The slice of [`MatchState`] a role may touch while acting.
///
/// Reads are unrestricted. Writes are limited to status flags, teams, lover
/// links, and the current phase's death set; membership of the alive and
/// dead lists is not reachable from here.
pub struct ActionScope<'a> {
    state: &'a mut MatchState,
}

impl ActionScope<'_> {
    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn round(&self) -> u32 {
        self.state.round
    }

    pub fn participant(&self, id: &ParticipantId) -> Option<&Participant> {
        self.state.participants.get(id)
    }

    pub fn status(&self, id: &ParticipantId) -> Option<Status> {
        self.state.participants.get(id).map(|p| p.status)
    }

    pub fn is_alive(&self, id: &ParticipantId) -> bool {
        self.state.is_alive(id)
    }

    pub fn active_deaths(&self) -> &DeathSet {
        self.state.active_deaths()
    }

    /// Adds `id` to the current phase's death set.
    pub fn doom(&mut self, id: &ParticipantId, cause: DeathCause) -> bool {
        self.state.active_deaths_mut().insert(id.clone(), cause)
    }

    /// Takes `id` off the current phase's death set.
    pub fn spare(&mut self, id: &ParticipantId) -> bool {
        self.state.active_deaths_mut().remove(id)
    }

    pub fn set_protected(&mut self, id: &ParticipantId) -> bool {
        self.with_status(id, |s| s.protected = true)
    }

    pub fn set_poisoned(&mut self, id: &ParticipantId) -> bool {
        self.with_status(id, |s| s.poisoned = true)
    }

    pub fn is_linked(&self, id: &ParticipantId) -> bool {
        self.state.partner_of(id).is_some()
    }

    /// Bonds `a` and `b` and moves both to the lovers team.
    pub fn link_lovers(&mut self, a: &ParticipantId, b: &ParticipantId) -> bool {
        if !self.state.participants.contains_key(a) || !self.state.participants.contains_key(b) {
            return false;
        }
        for id in [a, b] {
            if let Some(p) = self.state.participants.get_mut(id) {
                p.team = Team::Lovers;
            }
        }
        self.state.lovers.push((a.clone(), b.clone()));
        true
    }

    fn with_status(&mut self, id: &ParticipantId, f: impl FnOnce(&mut Status)) -> bool {
        match self.state.participants.get_mut(id) {
            Some(p) => {
                f(&mut p.status);
                true
            }
            None => false,
        }
    }
}
