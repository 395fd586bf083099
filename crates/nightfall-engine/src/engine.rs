//! The turn engine.
//!
//! [`MatchEngine`] owns everything about one match: the state, the dealt
//! roles, the phase machine, and the decision provider. It runs on a
//! single task; all phase resolution is sequential and the only suspension
//! points are provider calls and the phase-duration wait.
//!
//! Night resolution order is fixed:
//!
//! ```text
//! wolves (plurality target) → witch heal → witch poison → guard → seer → deaths
//! ```
//!
//! The guard acts after the wolves and the witch, so a protection clears
//! whatever put its target on tonight's death set.

use std::collections::BTreeMap;
use std::iter;
use std::sync::Arc;

use nightfall_clock::{PhaseClock, RunControl, WaitOutcome};
use nightfall_protocol::{EventChannel, EventMetadata, ParticipantId, Phase, Team};
use nightfall_rules::{
    Capability, DeathCause, MatchConfig, MatchState, Role, RoleKind, Skill, Speech,
    VictoryEvaluator, VoteTally,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};
use tokio::sync::mpsc;
use tokio::time;
use tracing::{debug, info, warn};

use crate::{
    AdminCommand, DecisionProvider, EngineError, EventBus, MatchProgress, MatchSnapshot,
    PhaseMachine,
};

/// One match, from the deal to `GameOver`.
pub struct MatchEngine<P: DecisionProvider> {
    config: MatchConfig,
    roster: Vec<ParticipantId>,
    state: MatchState,
    roles: BTreeMap<ParticipantId, Role>,
    machine: PhaseMachine,
    bus: Arc<EventBus>,
    provider: P,
    rng: StdRng,
    tally: VoteTally,
    commands_tx: mpsc::UnboundedSender<AdminCommand>,
    commands_rx: mpsc::UnboundedReceiver<AdminCommand>,
    initialized: bool,
    resolved: bool,
    ended: bool,
}

impl<P: DecisionProvider> std::fmt::Debug for MatchEngine<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchEngine")
            .field("phase", &self.machine.phase())
            .field("round", &self.state.round())
            .field("alive", &self.state.alive().len())
            .field("winner", &self.machine.winner())
            .finish_non_exhaustive()
    }
}

impl<P: DecisionProvider> MatchEngine<P> {
    /// Validates `config` against `roster` and builds an engine in
    /// `Waiting`. No roles are dealt until [`initialize`](Self::initialize).
    pub fn new(
        config: MatchConfig,
        roster: Vec<ParticipantId>,
        provider: P,
    ) -> Result<Self, EngineError> {
        config.validate(&roster)?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let machine = PhaseMachine::new(VictoryEvaluator::new(config.neutral_victory.clone()))
            .with_phase_table(&config.phases);
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        Ok(Self {
            config,
            roster,
            state: MatchState::new(),
            roles: BTreeMap::new(),
            machine,
            bus: Arc::new(EventBus::new()),
            provider,
            rng,
            tally: VoteTally::new(),
            commands_tx,
            commands_rx,
            initialized: false,
            resolved: false,
            ended: false,
        })
    }

    /// Publishes onto `bus` instead of a private one.
    pub fn with_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = bus;
        self
    }

    // -- accessors ----------------------------------------------------------

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn roster(&self) -> &[ParticipantId] {
        &self.roster
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn role(&self, id: &ParticipantId) -> Option<&Role> {
        self.roles.get(id)
    }

    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.values()
    }

    pub fn machine(&self) -> &PhaseMachine {
        &self.machine
    }

    /// For registering phase handlers and change callbacks.
    pub fn machine_mut(&mut self) -> &mut PhaseMachine {
        &mut self.machine
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn tally(&self) -> &VoteTally {
        &self.tally
    }

    pub fn phase(&self) -> Phase {
        self.machine.phase()
    }

    pub fn winner(&self) -> Option<Team> {
        self.machine.winner()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Sender for commands applied at the next phase boundary.
    pub fn command_sender(&self) -> mpsc::UnboundedSender<AdminCommand> {
        self.commands_tx.clone()
    }

    // -- administration -----------------------------------------------------

    /// Applies `command` now.
    pub fn apply_command(&mut self, command: AdminCommand) -> Result<(), EngineError> {
        match command {
            AdminCommand::SetCooldown {
                participant,
                skill,
                value,
            } => {
                let role = self.roles.get_mut(&participant).ok_or_else(|| {
                    EngineError::InvalidCommand(format!("unknown participant '{participant}'"))
                })?;
                role.capability_mut().cooldowns_mut().set(skill, value);
                info!(%participant, %skill, value, "cooldown overridden");
                Ok(())
            }
        }
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands_rx.try_recv() {
            if let Err(e) = self.apply_command(command) {
                warn!(error = %e, "queued admin command rejected");
            }
        }
    }

    // -- initialization -----------------------------------------------------

    /// Deals the roles, then runs the matchmaker and thief choices.
    ///
    /// Does nothing on a second call.
    pub async fn initialize(&mut self) {
        if self.initialized {
            return;
        }

        let mut deck: Vec<RoleKind> = self
            .config
            .role_distribution
            .iter()
            .flat_map(|(kind, count)| iter::repeat_n(*kind, *count))
            .collect();
        deck.shuffle(&mut self.rng);

        for (id, kind) in self.roster.iter().zip(deck) {
            self.state.seat(id.clone(), kind);
            self.roles
                .insert(id.clone(), Role::new(kind, id.clone(), &self.config));
            self.machine
                .evaluator_mut()
                .register(id.clone(), kind.default_team());
        }

        self.run_matchmakers().await;
        self.run_thieves().await;

        for participant in self.state.participants() {
            self.tally
                .set_weight(participant.id.clone(), participant.vote_weight);
        }

        let reveal = self
            .state
            .alive()
            .iter()
            .filter_map(|id| self.state.participant(id))
            .map(|p| format!("{}={}", p.id, p.role))
            .collect::<Vec<_>>()
            .join(", ");
        self.bus
            .publish(EventChannel::System, format!("Roles: {reveal}"), None, None);

        info!(participants = self.roster.len(), "match initialized");
        self.initialized = true;
    }

    async fn run_matchmakers(&mut self) {
        for id in self.state.alive_with_role(RoleKind::Matchmaker) {
            let snapshot = MatchSnapshot::capture(&self.state, Some(Skill::Match));
            let choice = match self.provider.choose_lovers(&id, &snapshot).await {
                Ok(choice) => choice,
                Err(e) => {
                    warn!(participant = %id, error = %e, "lover choice failed");
                    None
                }
            };
            let Some((a, b)) = choice else {
                debug!(participant = %id, "matchmaker made no match");
                continue;
            };
            let (Some(a), Some(b)) = (
                self.state.find(&a).cloned(),
                self.state.find(&b).cloned(),
            ) else {
                warn!(participant = %id, %a, %b, "matchmaker named an unknown participant");
                continue;
            };

            let Some(Role::Matchmaker(matchmaker)) = self.roles.get_mut(&id) else {
                continue;
            };
            if !matchmaker.link(&a, &b, &mut self.state.scope()) {
                warn!(participant = %id, %a, %b, "match rejected");
                continue;
            }

            for lover in [&a, &b] {
                self.machine
                    .evaluator_mut()
                    .register(lover.clone(), Team::Lovers);
            }
            info!(matchmaker = %id, %a, %b, "lovers linked");
            self.bus.send_team(
                format!("{a} and {b} are bound together"),
                Team::Lovers,
                vec![a.clone(), b.clone()],
            );
        }
    }

    async fn run_thieves(&mut self) {
        for id in self.state.alive_with_role(RoleKind::Thief) {
            let Some(Role::Thief(thief)) = self.roles.get(&id) else {
                continue;
            };
            let stealable = thief.stealable().to_vec();
            let must_steal = thief.must_steal();
            let limit = thief.options().choice_timeout();

            let snapshot = MatchSnapshot::capture(&self.state, Some(Skill::Steal));
            let asked = self.provider.choose_role(&id, &stealable, &snapshot);
            let requested = match time::timeout(limit, asked).await {
                Ok(Ok(Some(name))) => match name.parse::<RoleKind>() {
                    Ok(kind) => Some(kind),
                    Err(e) => {
                        warn!(participant = %id, error = %e, "thief chose an unknown role");
                        None
                    }
                },
                Ok(Ok(None)) => None,
                Ok(Err(e)) => {
                    warn!(participant = %id, error = %e, "role choice failed");
                    None
                }
                Err(_) => {
                    warn!(participant = %id, timeout_ms = limit.as_millis() as u64, "role choice timed out");
                    None
                }
            };

            let mut choice = requested.filter(|kind| stealable.contains(kind));
            if choice.is_none() && must_steal {
                choice = stealable.choose(&mut self.rng).copied();
                debug!(participant = %id, choice = ?choice, "thief role picked at random");
            }
            let Some(kind) = choice else {
                debug!(participant = %id, "thief keeps its role");
                continue;
            };

            let Some(Role::Thief(thief)) = self.roles.get_mut(&id) else {
                continue;
            };
            if !thief.steal(kind, &mut self.state.scope()) {
                warn!(participant = %id, role = %kind, "steal rejected");
                continue;
            }
            self.reassign(&id, kind);
        }
    }

    fn reassign(&mut self, id: &ParticipantId, kind: RoleKind) {
        let team = if self.state.partner_of(id).is_some() {
            Team::Lovers
        } else {
            kind.default_team()
        };
        self.machine.evaluator_mut().register(id.clone(), team);
        self.state.reassign(id, kind, team);
        self.roles
            .insert(id.clone(), Role::new(kind, id.clone(), &self.config));

        info!(participant = %id, role = %kind, %team, "role reassigned");
        self.bus.publish(
            EventChannel::System,
            format!("{id} is now a {kind}"),
            Some(vec![id.clone()]),
            None,
        );
    }

    // -- main loop ----------------------------------------------------------

    /// Runs phases until `GameOver` or a stop request.
    ///
    /// Each iteration resolves the current phase, checks for a winner,
    /// waits out the phase duration on `clock`, and moves to the next
    /// phase. A run that was stopped mid-wait resumes at that wait on the
    /// next call; a resolved phase is never resolved twice.
    pub async fn run(&mut self, control: &RunControl<MatchProgress>, clock: &mut PhaseClock) {
        self.initialize().await;
        if self.machine.phase() == Phase::Waiting {
            if let Err(e) = self.machine.start() {
                warn!(error = %e, "phase machine refused to start");
                return;
            }
            self.bus.publish(
                EventChannel::System,
                format!("The match begins with {} participants", self.roster.len()),
                None,
                None,
            );
        }

        loop {
            if control.is_stop_requested() || !clock.hold_while_paused(control).await {
                break;
            }
            self.drain_commands();

            let phase = self.machine.phase();
            if phase.is_terminal() {
                self.announce_end();
                break;
            }

            if !self.resolved {
                self.enter_phase(phase);
                match phase {
                    Phase::Night => self.resolve_night().await,
                    Phase::DayDiscussion => self.run_discussion().await,
                    Phase::DayVote => self.resolve_vote().await,
                    Phase::Waiting | Phase::GameOver => {}
                }
                self.resolved = true;
                let ended = self.check_end();
                self.publish_progress(control);
                if ended {
                    break;
                }
            }
            if control.is_stop_requested() {
                break;
            }

            let duration = self
                .config
                .phases
                .get(phase)
                .map(|s| s.duration())
                .unwrap_or_default();
            if clock.wait(duration, control).await == WaitOutcome::Stopped {
                break;
            }

            let Some(next) = phase.next() else {
                break;
            };
            if next == Phase::Night {
                let round = self.state.advance_round();
                debug!(round, "round advanced");
            }
            self.resolved = false;
            self.machine.transition_to(next);
            self.publish_progress(control);
        }
    }

    fn enter_phase(&mut self, phase: Phase) {
        self.state.set_phase(phase);
        for (id, role) in self.roles.iter_mut() {
            if self.state.is_alive(id) {
                role.capability_mut().on_phase_enter(phase);
            }
        }
        if phase == Phase::DayDiscussion {
            self.state.clear_protection();
        }

        let round = self.state.round();
        let (description, duration) = match self.config.phases.get(phase) {
            Some(s) if !s.description.is_empty() => (s.description.clone(), s.duration()),
            Some(s) => (phase.to_string(), s.duration()),
            None => (phase.to_string(), Default::default()),
        };
        info!(%phase, round, "phase entered");
        self.bus.publish(
            EventChannel::PhaseChange,
            format!("Entering {description}, lasting {}s", duration.as_secs_f64()),
            None,
            Some(EventMetadata::phase_change(
                phase,
                round,
                duration.as_millis() as u64,
            )),
        );
    }

    fn publish_progress(&self, control: &RunControl<MatchProgress>) {
        let progress = MatchProgress {
            phase: self.machine.phase(),
            round: self.state.round(),
            winner: self.machine.winner(),
            alive: self.state.alive().len(),
        };
        control.update_progress(|p| *p = progress);
    }

    /// Returns `true` once the match is over.
    fn check_end(&mut self) -> bool {
        if self.machine.check_victory() {
            self.announce_end();
            return true;
        }
        if self.state.alive().is_empty() {
            self.machine.transition_to(Phase::GameOver);
        }
        if self.machine.phase().is_terminal() {
            self.announce_end();
            return true;
        }
        false
    }

    fn announce_end(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;
        self.state.set_phase(Phase::GameOver);

        let message = match self.machine.winner() {
            Some(team) => format!(
                "The {team} team wins. Survivors: {}",
                join_ids(self.state.alive())
            ),
            None if self.state.alive().is_empty() => "The match ends with no survivors".to_owned(),
            None => "The match ends without a winner".to_owned(),
        };
        info!(
            winner = ?self.machine.winner(),
            round = self.state.round(),
            alive = self.state.alive().len(),
            "match over"
        );
        self.bus.publish(EventChannel::System, message, None, None);
    }

    // -- provider -----------------------------------------------------------

    /// Asks `id` for a target. Failures and unusable answers are `None`.
    async fn ask(&self, id: &ParticipantId, skill: Option<Skill>) -> Option<ParticipantId> {
        let role = self.state.participant(id)?.role;
        let mut snapshot = MatchSnapshot::capture(&self.state, skill);
        if skill == Some(Skill::Heal) {
            snapshot = snapshot.with_pending_deaths(&self.state);
        }

        let phase = self.state.phase();
        match self.provider.get_action(id, role, &snapshot, phase).await {
            Ok(decision) => {
                let target = decision.resolve(&self.state);
                debug!(participant = %id, skill = ?skill, target = ?target, "decision received");
                target
            }
            Err(e) => {
                warn!(participant = %id, skill = ?skill, error = %e, "provider failed, no decision");
                None
            }
        }
    }

    // -- night --------------------------------------------------------------

    async fn resolve_night(&mut self) {
        self.state.clear_night_deaths();
        self.wolves_hunt().await;
        self.witches_act().await;
        self.guards_protect().await;
        self.seers_check().await;
        self.apply_deaths().await;
    }

    async fn wolves_hunt(&mut self) {
        let wolves = self.state.alive_with_role(RoleKind::Wolf);
        if wolves.is_empty() {
            return;
        }

        // Insertion order decides ties.
        let mut picks: Vec<(ParticipantId, usize)> = Vec::new();
        for wolf in &wolves {
            let Some(target) = self.ask(wolf, Some(Skill::Kill)).await else {
                continue;
            };
            match picks.iter_mut().find(|(t, _)| *t == target) {
                Some((_, count)) => *count += 1,
                None => picks.push((target, 1)),
            }
        }

        // Stable sort keeps first-pick order among equal counts.
        picks.sort_by(|a, b| b.1.cmp(&a.1));
        if picks.is_empty() {
            debug!("wolves chose no target");
            return;
        }

        let limit = self.config.wolf.night_kill_limit as usize;
        for (target, votes) in picks.into_iter().take(limit) {
            let mut landed = false;
            for wolf in &wolves {
                let Some(Role::Wolf(role)) = self.roles.get_mut(wolf) else {
                    continue;
                };
                if role.kill(&target, &mut self.state.scope()) {
                    debug!(%wolf, %target, votes, "wolf kill queued");
                    landed = true;
                    break;
                }
            }
            if !landed {
                warn!(%target, "wolf kill rejected");
            }
        }
    }

    async fn witches_act(&mut self) {
        for witch in self.state.alive_with_role(RoleKind::Witch) {
            let Some(Role::Witch(role)) = self.roles.get(&witch) else {
                continue;
            };
            let (has_heal, has_poison) = (role.has_heal(), role.has_poison());

            if has_heal && !self.state.night_deaths().is_empty() {
                if let Some(target) = self.ask(&witch, Some(Skill::Heal)).await {
                    if let Some(Role::Witch(role)) = self.roles.get_mut(&witch) {
                        if role.heal(&target, &mut self.state.scope()) {
                            info!(%witch, %target, "witch saved a participant");
                        } else {
                            warn!(%witch, %target, "heal rejected");
                        }
                    }
                }
            }

            if has_poison {
                if let Some(target) = self.ask(&witch, Some(Skill::Poison)).await {
                    if let Some(Role::Witch(role)) = self.roles.get_mut(&witch) {
                        if role.poison(&target, &mut self.state.scope()) {
                            debug!(%witch, %target, "poison queued");
                        } else {
                            warn!(%witch, %target, "poison rejected");
                        }
                    }
                }
            }
        }
    }

    async fn guards_protect(&mut self) {
        for guard in self.state.alive_with_role(RoleKind::Guard) {
            let Some(target) = self.ask(&guard, Some(Skill::Protect)).await else {
                continue;
            };
            let doomed = self.state.night_deaths().contains(&target);
            let Some(Role::Guard(role)) = self.roles.get_mut(&guard) else {
                continue;
            };
            if !role.protect(&target, &mut self.state.scope()) {
                warn!(%guard, %target, "protection rejected");
            } else if doomed {
                info!(%guard, %target, "guard saved a participant");
            } else {
                debug!(%guard, %target, "participant protected");
            }
        }
    }

    async fn seers_check(&mut self) {
        for seer in self.state.alive_with_role(RoleKind::Seer) {
            let Some(target) = self.ask(&seer, Some(Skill::Check)).await else {
                continue;
            };
            let Some(Role::Seer(role)) = self.roles.get_mut(&seer) else {
                continue;
            };
            if !role.check(&target, &mut self.state.scope()) {
                warn!(%seer, %target, "check rejected");
                continue;
            }
            if let Some(result) = role.last_result() {
                debug!(%seer, %target, "check delivered");
                self.bus.send_private(result, &seer);
            }
        }
    }

    // -- deaths -------------------------------------------------------------

    /// Kills everyone on the current phase's death set, in order.
    ///
    /// Death reactions append to the same set, so the cursor walks over
    /// them too: a hunter's shot or a broken heart dies in the same pass.
    async fn apply_deaths(&mut self) {
        let mut cursor = 0;
        while let Some((id, cause)) = self.state.active_deaths().get(cursor).cloned() {
            cursor += 1;
            if !self.state.mark_dead(&id) {
                continue;
            }
            self.machine.evaluator_mut().remove(&id);
            info!(participant = %id, cause = ?cause, round = self.state.round(), "participant died");
            self.bus.publish(
                EventChannel::System,
                format!("{id} {}", cause.narration()),
                None,
                None,
            );

            match self.roles.get(&id).map(Role::kind) {
                Some(RoleKind::Hunter) => self.hunter_retaliates(&id).await,
                Some(RoleKind::Wolf) => {
                    let pack = self.state.alive_with_role(RoleKind::Wolf);
                    if !pack.is_empty() {
                        self.bus
                            .send_team(format!("{id} of the pack has fallen"), Team::Wolf, pack);
                    }
                }
                _ => {}
            }

            if let Some(partner) = self.state.partner_of(&id).cloned() {
                if self.state.is_alive(&partner)
                    && self
                        .state
                        .active_deaths_mut()
                        .insert(partner.clone(), DeathCause::Heartbreak)
                {
                    debug!(participant = %id, %partner, "lover bond cascades");
                }
            }
        }
    }

    async fn hunter_retaliates(&mut self, hunter: &ParticipantId) {
        let ready = match (self.roles.get(hunter), self.state.participant(hunter)) {
            (Some(Role::Hunter(role)), Some(p)) => role.can_retaliate(&p.status),
            _ => false,
        };
        if !ready {
            return;
        }
        let Some(target) = self.ask(hunter, Some(Skill::Shoot)).await else {
            debug!(%hunter, "hunter holds fire");
            return;
        };
        let Some(Role::Hunter(role)) = self.roles.get_mut(hunter) else {
            return;
        };
        if role.retaliate(&target, &mut self.state.scope()) {
            info!(%hunter, %target, "hunter fired");
        } else {
            warn!(%hunter, %target, "shot rejected");
        }
    }

    // -- day ----------------------------------------------------------------

    async fn run_discussion(&mut self) {
        self.state.clear_speeches();
        let round = self.state.round();

        for id in self.state.alive().to_vec() {
            let Some(participant) = self.state.participant(&id) else {
                continue;
            };
            if participant.status.silenced {
                continue;
            }
            let role = participant.role;

            let snapshot = MatchSnapshot::capture(&self.state, None);
            match self.provider.get_speech(&id, role, &snapshot).await {
                Ok(Some(content)) if !content.trim().is_empty() => {
                    debug!(participant = %id, len = content.len(), "speech recorded");
                    self.state.record_speech(Speech {
                        speaker: id,
                        role,
                        content,
                        round,
                    });
                }
                Ok(_) => debug!(participant = %id, "no speech"),
                Err(e) => warn!(participant = %id, error = %e, "speech request failed"),
            }
        }
    }

    async fn resolve_vote(&mut self) {
        self.tally.reset();
        self.state.clear_day_deaths();
        let round = self.state.round();

        for voter in self.state.alive().to_vec() {
            let Some(participant) = self.state.participant(&voter) else {
                continue;
            };
            if participant.status.silenced {
                debug!(%voter, "silenced, skipping vote");
                continue;
            }
            self.tally
                .set_weight(voter.clone(), participant.vote_weight);

            let target = self
                .ask(&voter, None)
                .await
                .filter(|t| *t != voter && self.state.is_alive(t));
            self.tally.cast(voter.clone(), target.clone());

            let message = match &target {
                Some(t) => format!("{voter} votes to exile {t}"),
                None => format!("{voter} abstains"),
            };
            self.bus.publish(
                EventChannel::Vote,
                message,
                None,
                Some(EventMetadata::vote(voter, target, round, Phase::DayVote)),
            );
        }

        let Some(target) = self.tally.resolve() else {
            info!(round, summary = ?self.tally.top(3), "vote inconclusive");
            self.bus
                .publish(EventChannel::System, "Nobody is exiled today", None, None);
            return;
        };

        if let Some(Role::Fool(fool)) = self.roles.get_mut(&target) {
            if fool.reveal(&mut self.state.scope()) {
                info!(%target, "fool revealed, exile cancelled");
                self.bus.publish(
                    EventChannel::System,
                    format!("{target} reveals as the fool and is spared"),
                    None,
                    None,
                );
                return;
            }
        }

        let votes = self.tally.votes_for(&target);
        self.state
            .scope()
            .doom(&target, DeathCause::Execution);
        self.bus.publish(
            EventChannel::Exile,
            format!("{target} is exiled with {votes} votes"),
            None,
            Some(EventMetadata::exile(target, round, Phase::DayVote)),
        );
        self.apply_deaths().await;
    }
}

fn join_ids(ids: &[ParticipantId]) -> String {
    if ids.is_empty() {
        return "none".to_owned();
    }
    ids.iter()
        .map(ParticipantId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
