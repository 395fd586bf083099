//! Integration tests for full matches driven by scripted providers.
//!
//! Phase waits run on virtual time (`start_paused = true`), so a match of
//! several rounds completes instantly.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use nightfall_clock::{ClockConfig, PhaseClock, RunControl, RunStatus};
use nightfall_engine::{
    Decision, DecisionProvider, EventBus, MatchEngine, MatchProgress, MatchSnapshot,
    ObserverError, ProviderError,
};
use nightfall_protocol::{EventChannel, ParticipantId, Phase, Team};
use nightfall_rules::{MatchConfig, PhaseTable, RoleKind, Skill};

// =========================================================================
// Helpers
// =========================================================================

/// Wolves eat the first living non-wolf; everyone else hunts wolves.
///
/// The wolf list is filled in after the deal.
#[derive(Default)]
struct PackHunt {
    wolves: Mutex<BTreeSet<ParticipantId>>,
}

impl PackHunt {
    fn first_alive(&self, snapshot: &MatchSnapshot, wolf: bool) -> Decision {
        let wolves = self.wolves.lock().unwrap();
        snapshot
            .alive
            .iter()
            .find(|id| wolves.contains(*id) == wolf)
            .map(|id| Decision::target(id.as_str()))
            .unwrap_or_default()
    }
}

impl DecisionProvider for PackHunt {
    async fn get_action(
        &self,
        _participant: &ParticipantId,
        _role: RoleKind,
        snapshot: &MatchSnapshot,
        _phase: Phase,
    ) -> Result<Decision, ProviderError> {
        Ok(match snapshot.skill {
            Some(Skill::Kill) => self.first_alive(snapshot, false),
            Some(Skill::Shoot) | None => self.first_alive(snapshot, true),
            Some(_) => Decision::none(),
        })
    }

    async fn get_speech(
        &self,
        participant: &ParticipantId,
        _role: RoleKind,
        snapshot: &MatchSnapshot,
    ) -> Result<Option<String>, ProviderError> {
        Ok(Some(format!("{participant} speaks in round {}", snapshot.round)))
    }
}

fn roster() -> Vec<ParticipantId> {
    (1..=12).map(|i| ParticipantId::new(format!("p{i:02}"))).collect()
}

fn config(seed: u64) -> MatchConfig {
    let mut config = MatchConfig::standard();
    config.phases = PhaseTable::uniform(Duration::from_secs(2));
    config.seed = Some(seed);
    config
}

async fn hunt(seed: u64) -> MatchEngine<PackHunt> {
    let mut engine = MatchEngine::new(config(seed), roster(), PackHunt::default()).unwrap();
    engine.initialize().await;
    let wolves = engine.state().alive_with_role(RoleKind::Wolf);
    engine.provider().wolves.lock().unwrap().extend(wolves);
    engine
}

async fn run_to_end(engine: &mut MatchEngine<PackHunt>) -> RunControl<MatchProgress> {
    let control = RunControl::new();
    control.begin().unwrap();
    let mut clock = PhaseClock::new(ClockConfig::default());
    engine.run(&control, &mut clock).await;
    assert_eq!(control.finish(), RunStatus::Finished);
    control
}

// =========================================================================
// Full matches
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_standard_match_ends_with_village_win() {
    for seed in [1, 7, 42, 1234] {
        let mut engine = hunt(seed).await;
        let control = run_to_end(&mut engine).await;

        assert_eq!(engine.phase(), Phase::GameOver, "seed {seed}");
        assert_eq!(engine.winner(), Some(Team::Village), "seed {seed}");
        assert!(engine.state().alive_with_role(RoleKind::Wolf).is_empty());

        let state = engine.state();
        let mut seen: Vec<&ParticipantId> = state.alive().iter().chain(state.dead()).collect();
        seen.sort();
        let expected = roster();
        assert_eq!(seen, expected.iter().collect::<Vec<_>>(), "seed {seed}");

        let progress = control.progress();
        assert_eq!(progress.phase, Phase::GameOver);
        assert_eq!(progress.winner, Some(Team::Village));
        assert_eq!(progress.alive, state.alive().len());
    }
}

#[tokio::test(start_paused = true)]
async fn test_match_publishes_lifecycle_events() {
    let mut engine = hunt(3).await;
    run_to_end(&mut engine).await;
    let bus = engine.bus();

    let system = bus.history(Some(EventChannel::System), None, 1000);
    assert!(system[0].message.starts_with("Roles: "));
    assert!(system[1].message.starts_with("The match begins"));
    assert!(system.last().unwrap().message.starts_with("The village team wins"));

    let phases = bus.history(Some(EventChannel::PhaseChange), None, 1000);
    assert_eq!(phases[0].metadata.as_ref().unwrap().phase, Some(Phase::Night));
    assert_eq!(phases[0].metadata.as_ref().unwrap().duration_ms, Some(2000));

    let exiles = bus.history(Some(EventChannel::Exile), None, 1000);
    assert!(!exiles.is_empty());
    for exile in &exiles {
        let target = exile.metadata.as_ref().unwrap().target.clone().unwrap();
        assert!(engine.provider().wolves.lock().unwrap().contains(&target));
    }

    let votes = bus.history(Some(EventChannel::Vote), None, 1000);
    assert!(votes.iter().all(|v| v.metadata.as_ref().unwrap().from.is_some()));

    let seqs: Vec<u64> = bus.history(None, None, 1000).iter().map(|e| e.seq).collect();
    assert!(seqs.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test(start_paused = true)]
async fn test_rounds_advance_once_per_cycle() {
    let mut engine = hunt(11).await;
    run_to_end(&mut engine).await;

    let nights: Vec<u32> = engine
        .bus()
        .history(Some(EventChannel::PhaseChange), None, 1000)
        .iter()
        .filter_map(|e| e.metadata.as_ref())
        .filter(|m| m.phase == Some(Phase::Night))
        .filter_map(|m| m.round)
        .collect();
    let expected: Vec<u32> = (1..=nights.len() as u32).collect();
    assert_eq!(nights, expected);
}

#[tokio::test(start_paused = true)]
async fn test_speeches_are_recorded_each_discussion() {
    let mut engine = hunt(5).await;
    run_to_end(&mut engine).await;

    // The last discussion ran with the survivors of that round's night.
    let speeches = engine.state().speeches();
    assert!(!speeches.is_empty());
    let round = speeches[0].round;
    assert!(speeches.iter().all(|s| s.round == round));
}

// =========================================================================
// Observers
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_failing_observers_never_stop_the_match() {
    let bus = Arc::new(EventBus::new());
    bus.on(EventChannel::System, |_| Err(ObserverError("sink offline".into())));
    bus.on(EventChannel::Vote, |_| panic!("observer bug"));

    let mut engine = MatchEngine::new(config(9), roster(), PackHunt::default())
        .unwrap()
        .with_bus(Arc::clone(&bus));
    engine.initialize().await;
    let wolves = engine.state().alive_with_role(RoleKind::Wolf);
    engine.provider().wolves.lock().unwrap().extend(wolves);

    run_to_end(&mut engine).await;
    assert_eq!(engine.winner(), Some(Team::Village));
    assert!(bus.history_len() > 0);
}

#[tokio::test(start_paused = true)]
async fn test_stream_receives_published_events() {
    let mut engine = hunt(2).await;
    let mut stream = engine.bus().stream();
    run_to_end(&mut engine).await;

    let first = stream.recv().await.unwrap();
    assert_eq!(first.channel, EventChannel::System);
    assert!(first.message.starts_with("The match begins"));
}

// =========================================================================
// Phase handlers
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_failing_phase_handler_forces_game_over() {
    let mut engine = hunt(4).await;
    let entered = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&entered);
    engine.machine_mut().on_phase_change(Box::new(move |_, to| {
        seen.lock().unwrap().push(to);
    }));
    engine.machine_mut().register_handler(
        Phase::DayVote,
        0,
        Box::new(|_| Err(nightfall_engine::HandlerError("vote service down".into()))),
    );

    run_to_end(&mut engine).await;

    assert_eq!(engine.phase(), Phase::GameOver);
    assert_eq!(engine.winner(), None);
    assert_eq!(
        *entered.lock().unwrap(),
        [Phase::Night, Phase::DayDiscussion, Phase::GameOver]
    );
}
