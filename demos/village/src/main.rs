//! A twelve-seat match played by participants who choose at random.
//!
//! Every event is printed to stdout as one JSON line. Logs go to stderr;
//! set `RUST_LOG=debug` to see each decision.
//!
//! ```text
//! cargo run -p village -- [seed]
//! ```

use std::sync::Mutex;
use std::time::Duration;

use nightfall::prelude::*;
use nightfall::rules::PhaseTable;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

const DEFAULT_SEED: u64 = 2024;
const PHASE_DURATION: Duration = Duration::from_millis(250);

const LINES: [&str; 6] = [
    "I slept soundly, nothing to report.",
    "Someone was awfully quiet yesterday.",
    "I trust nobody at this table.",
    "Let's not rush the vote.",
    "I have a bad feeling about the last speaker.",
    "We should follow the votes, not the speeches.",
];

/// Picks targets, speeches, and initial choices uniformly at random.
struct Dice {
    rng: Mutex<StdRng>,
}

impl Dice {
    fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut rng)
    }
}

impl DecisionProvider for Dice {
    async fn get_action(
        &self,
        participant: &ParticipantId,
        _role: RoleKind,
        snapshot: &MatchSnapshot,
        _phase: Phase,
    ) -> Result<Decision, ProviderError> {
        let pool: Vec<&ParticipantId> = match snapshot.skill {
            Some(Skill::Heal) => snapshot.pending_deaths.iter().collect(),
            _ => snapshot.alive.iter().filter(|id| *id != participant).collect(),
        };
        Ok(self.with_rng(|rng| {
            if rng.random_bool(0.2) {
                return Decision::none();
            }
            pool.choose(rng)
                .map(|id| Decision::target(id.as_str()))
                .unwrap_or_default()
        }))
    }

    async fn get_speech(
        &self,
        _participant: &ParticipantId,
        _role: RoleKind,
        _snapshot: &MatchSnapshot,
    ) -> Result<Option<String>, ProviderError> {
        Ok(self.with_rng(|rng| LINES.choose(rng).map(|line| line.to_string())))
    }

    async fn choose_role(
        &self,
        _participant: &ParticipantId,
        stealable: &[RoleKind],
        _snapshot: &MatchSnapshot,
    ) -> Result<Option<String>, ProviderError> {
        Ok(self.with_rng(|rng| stealable.choose(rng).map(RoleKind::to_string)))
    }

    async fn choose_lovers(
        &self,
        _participant: &ParticipantId,
        snapshot: &MatchSnapshot,
    ) -> Result<Option<(String, String)>, ProviderError> {
        Ok(self.with_rng(|rng| {
            let pair: Vec<&ParticipantId> = snapshot.alive.choose_multiple(rng, 2).collect();
            match pair.as_slice() {
                [a, b] => Some((a.to_string(), b.to_string())),
                _ => None,
            }
        }))
    }
}

fn print(codec: &JsonCodec, event: &GameEvent) -> Result<(), NightfallError> {
    let line = codec.encode(event)?;
    println!("{}", String::from_utf8_lossy(&line));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), NightfallError> {
    nightfall::init_tracing("info");

    let seed = match std::env::args().nth(1) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(%raw, "seed is not a number, using the default");
            DEFAULT_SEED
        }),
        None => DEFAULT_SEED,
    };

    let mut config = MatchConfig::standard();
    config.phases = PhaseTable::uniform(PHASE_DURATION);
    config.seed = Some(seed);
    let roster: Vec<ParticipantId> = (1..=12).map(|i| format!("p{i:02}").into()).collect();

    let engine = MatchEngine::new(config, roster, Dice::new(seed))?;
    let runner = MatchRunner::new(engine).with_clock(ClockConfig {
        slice: Duration::from_millis(50),
        pause_poll: Duration::from_millis(25),
    });

    let codec = JsonCodec;
    let mut events = runner.bus().stream();
    info!(seed, "starting match");
    runner.start_async()?;

    let done = runner.wait_for_completion(None);
    tokio::pin!(done);
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => print(&codec, &event)?,
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event printer fell behind"),
                Err(RecvError::Closed) => break,
            },
            _ = &mut done => break,
        }
    }
    while let Ok(event) = events.try_recv() {
        print(&codec, &event)?;
    }

    let progress = runner.progress();
    info!(
        status = %runner.status(),
        winner = ?progress.winner,
        round = progress.round,
        alive = progress.alive,
        "match finished"
    );
    Ok(())
}
