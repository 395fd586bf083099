//! Phase state machine.
//!
//! Owns the current phase, its timeout baseline, the per-phase handler
//! lists, and the victory evaluator. The engine drives it; handlers and
//! callbacks let other code react to transitions without touching the
//! engine's loop.

use std::collections::{HashMap, HashSet};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use nightfall_protocol::{Phase, Team};
use nightfall_rules::{PhaseTable, VictoryEvaluator};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::{EngineError, HandlerError};

/// Runs when its phase is entered. An `Err` forces `GameOver`.
pub type PhaseHandler = Box<dyn FnMut(Phase) -> Result<(), HandlerError> + Send + Sync>;

/// Runs after every transition with `(old, new)`.
pub type PhaseCallback = Box<dyn FnMut(Phase, Phase) + Send + Sync>;

struct Registered {
    priority: i32,
    handler: PhaseHandler,
}

/// The match's phase, its handlers, and its win check.
///
/// Handlers for a phase run in ascending priority order, registration
/// order breaking ties. The list is re-sorted lazily: registering marks
/// the phase dirty, and the next transition into it sorts once.
pub struct PhaseMachine {
    phase: Phase,
    entered_at: Instant,
    timeout: Duration,
    timeouts: HashMap<Phase, Duration>,
    handlers: HashMap<Phase, Vec<Registered>>,
    dirty: HashSet<Phase>,
    callbacks: Vec<PhaseCallback>,
    evaluator: VictoryEvaluator,
    winner: Option<Team>,
    sorts: u64,
}

impl std::fmt::Debug for PhaseMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseMachine")
            .field("phase", &self.phase)
            .field("timeout", &self.timeout)
            .field("winner", &self.winner)
            .finish_non_exhaustive()
    }
}

impl PhaseMachine {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

    pub fn new(evaluator: VictoryEvaluator) -> Self {
        let timeouts = HashMap::from([
            (Phase::Night, Duration::from_secs(450)),
            (Phase::DayDiscussion, Duration::from_secs(600)),
            (Phase::DayVote, Duration::from_secs(300)),
            (Phase::GameOver, Duration::ZERO),
        ]);
        Self {
            phase: Phase::Waiting,
            entered_at: Instant::now(),
            timeout: Self::DEFAULT_TIMEOUT,
            timeouts,
            handlers: HashMap::new(),
            dirty: HashSet::new(),
            callbacks: Vec::new(),
            evaluator,
            winner: None,
            sorts: 0,
        }
    }

    /// Applies any `timeout_ms` overrides from the phase table.
    pub fn with_phase_table(mut self, table: &PhaseTable) -> Self {
        for phase in [Phase::Night, Phase::DayDiscussion, Phase::DayVote] {
            if let Some(timeout) = table.get(phase).and_then(|s| s.timeout()) {
                self.timeouts.insert(phase, timeout);
            }
        }
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn winner(&self) -> Option<Team> {
        self.winner
    }

    pub fn timeout_for(&self, phase: Phase) -> Duration {
        self.timeouts
            .get(&phase)
            .copied()
            .unwrap_or(Self::DEFAULT_TIMEOUT)
    }

    pub fn evaluator(&self) -> &VictoryEvaluator {
        &self.evaluator
    }

    pub fn evaluator_mut(&mut self) -> &mut VictoryEvaluator {
        &mut self.evaluator
    }

    pub fn register_handler(&mut self, phase: Phase, priority: i32, handler: PhaseHandler) {
        self.handlers
            .entry(phase)
            .or_default()
            .push(Registered { priority, handler });
        self.dirty.insert(phase);
    }

    pub fn on_phase_change(&mut self, callback: PhaseCallback) {
        self.callbacks.push(callback);
    }

    /// `Waiting → Night`.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.phase != Phase::Waiting {
            return Err(EngineError::AlreadyStarted(self.phase));
        }
        self.transition_to(Phase::Night);
        Ok(())
    }

    /// Moves to `target` and runs its handlers, then the change callbacks.
    ///
    /// Returns `false` without changing anything if the transition is not
    /// part of the cycle. A failing handler stops the remaining handlers
    /// and forces `GameOver`.
    pub fn transition_to(&mut self, target: Phase) -> bool {
        if !self.phase.can_transition_to(target) {
            warn!(from = %self.phase, to = %target, "invalid phase transition");
            return false;
        }

        let old = self.phase;
        self.enter(target);
        debug!(from = %old, to = %target, "phase transition");

        if let Err(e) = self.run_handlers(target) {
            error!(phase = %target, error = %e, "phase handler failed, ending match");
            if target != Phase::GameOver {
                self.enter(Phase::GameOver);
            }
            self.notify(old, Phase::GameOver);
            return true;
        }

        self.notify(old, target);
        true
    }

    /// Time left before the current phase's timeout. Zero once over.
    pub fn remaining_time(&self) -> Duration {
        if self.phase.is_terminal() {
            return Duration::ZERO;
        }
        self.timeout.saturating_sub(self.entered_at.elapsed())
    }

    /// Asks the evaluator for a winner; on one, records it and moves to
    /// `GameOver`.
    pub fn check_victory(&mut self) -> bool {
        let Some(team) = self.evaluator.evaluate() else {
            return false;
        };
        self.winner = Some(team);
        info!(winner = %team, "victory condition met");
        if !self.phase.is_terminal() {
            self.transition_to(Phase::GameOver);
        }
        true
    }

    fn enter(&mut self, phase: Phase) {
        self.phase = phase;
        self.entered_at = Instant::now();
        self.timeout = self.timeout_for(phase);
    }

    fn run_handlers(&mut self, phase: Phase) -> Result<(), HandlerError> {
        let Some(mut handlers) = self.handlers.remove(&phase) else {
            return Ok(());
        };
        if self.dirty.remove(&phase) {
            // Stable sort keeps registration order within a priority.
            handlers.sort_by_key(|r| r.priority);
            self.sorts += 1;
        }

        let result = handlers.iter_mut().try_for_each(|r| {
            catch_unwind(AssertUnwindSafe(|| (r.handler)(phase)))
                .unwrap_or_else(|_| Err(HandlerError("handler panicked".into())))
        });
        self.handlers.insert(phase, handlers);
        result
    }

    fn notify(&mut self, old: Phase, new: Phase) {
        for callback in &mut self.callbacks {
            callback(old, new);
        }
    }
}
