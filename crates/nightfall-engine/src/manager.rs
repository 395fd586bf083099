//! Match manager: creates, tracks, and controls matches.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use nightfall_clock::{ClockConfig, RunStatus};
use nightfall_protocol::{MatchId, ParticipantId, Phase, Team};
use nightfall_rules::MatchConfig;

use crate::{DecisionProvider, EngineError, MatchEngine, MatchRunner};

/// Counter for generating unique match IDs.
static NEXT_MATCH_ID: AtomicU64 = AtomicU64::new(1);

/// How long [`MatchManager::stop`] waits for a run to wind down by default.
const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// A point-in-time view of one match, built from its run control only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchStatusReport {
    pub match_id: MatchId,
    pub status: RunStatus,
    pub is_running: bool,
    pub is_paused: bool,
    pub phase: Phase,
    pub round: u32,
    pub winner: Option<Team>,
    pub alive: usize,
    /// The most recent control error for this match, if any.
    pub last_error: Option<String>,
}

/// Owns every match's runner, keyed by [`MatchId`].
///
/// This is the entry point for higher layers that host several matches
/// side by side.
pub struct MatchManager<P: DecisionProvider> {
    runners: HashMap<MatchId, MatchRunner<P>>,
    last_errors: HashMap<MatchId, String>,
    clock: ClockConfig,
    stop_timeout: Duration,
}

impl<P: DecisionProvider> MatchManager<P> {
    pub fn new() -> Self {
        Self {
            runners: HashMap::new(),
            last_errors: HashMap::new(),
            clock: ClockConfig::default(),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    /// Clock settings for matches created from now on.
    pub fn with_clock(mut self, clock: ClockConfig) -> Self {
        self.clock = clock.validated();
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Validates and registers a new match without starting it.
    pub fn create(
        &mut self,
        config: MatchConfig,
        roster: Vec<ParticipantId>,
        provider: P,
    ) -> Result<MatchId, EngineError> {
        let engine = MatchEngine::new(config, roster, provider)?;
        let match_id = MatchId(NEXT_MATCH_ID.fetch_add(1, Ordering::Relaxed));
        let participants = engine.roster().len();
        let runner = MatchRunner::new(engine).with_clock(self.clock.clone());
        self.runners.insert(match_id, runner);
        tracing::info!(%match_id, participants, "match created");
        Ok(match_id)
    }

    pub fn start(&mut self, match_id: MatchId) -> Result<(), EngineError> {
        let runner = self
            .runners
            .get(&match_id)
            .ok_or(EngineError::NotFound(match_id))?;
        let result = runner.start_async();
        self.record(match_id, &result);
        if result.is_ok() {
            tracing::info!(%match_id, "match started");
        }
        result
    }

    pub fn pause(&mut self, match_id: MatchId) -> Result<bool, EngineError> {
        let runner = self
            .runners
            .get(&match_id)
            .ok_or(EngineError::NotFound(match_id))?;
        Ok(runner.pause())
    }

    pub fn resume(&mut self, match_id: MatchId) -> Result<bool, EngineError> {
        let runner = self
            .runners
            .get(&match_id)
            .ok_or(EngineError::NotFound(match_id))?;
        Ok(runner.resume())
    }

    /// Requests a stop and waits up to the stop timeout for the run to end.
    ///
    /// Stopping a match that is not running is a no-op.
    pub async fn stop(&mut self, match_id: MatchId) -> Result<(), EngineError> {
        let runner = self
            .runners
            .get(&match_id)
            .ok_or(EngineError::NotFound(match_id))?;
        if !runner.stop() {
            return Ok(());
        }
        let result = if runner.wait_for_completion(Some(self.stop_timeout)).await {
            tracing::info!(%match_id, "match stopped");
            Ok(())
        } else {
            tracing::warn!(
                %match_id,
                timeout_ms = self.stop_timeout.as_millis() as u64,
                "match did not stop in time"
            );
            Err(EngineError::StopTimeout(match_id))
        };
        self.record(match_id, &result);
        result
    }

    /// Returns the status report for one match.
    pub fn status(&self, match_id: MatchId) -> Result<MatchStatusReport, EngineError> {
        let runner = self
            .runners
            .get(&match_id)
            .ok_or(EngineError::NotFound(match_id))?;
        let progress = runner.progress();
        Ok(MatchStatusReport {
            match_id,
            status: runner.status(),
            is_running: runner.is_running(),
            is_paused: runner.is_paused(),
            phase: progress.phase,
            round: progress.round,
            winner: progress.winner,
            alive: progress.alive,
            last_error: self.last_errors.get(&match_id).cloned(),
        })
    }

    /// Drops a match. A running match is asked to stop first.
    pub fn remove(&mut self, match_id: MatchId) -> Result<(), EngineError> {
        let runner = self
            .runners
            .remove(&match_id)
            .ok_or(EngineError::NotFound(match_id))?;
        runner.stop();
        self.last_errors.remove(&match_id);
        tracing::info!(%match_id, "match removed");
        Ok(())
    }

    pub fn runner(&self, match_id: MatchId) -> Option<&MatchRunner<P>> {
        self.runners.get(&match_id)
    }

    /// Returns the number of tracked matches.
    pub fn len(&self) -> usize {
        self.runners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runners.is_empty()
    }

    /// Lists all tracked match IDs.
    pub fn ids(&self) -> Vec<MatchId> {
        self.runners.keys().copied().collect()
    }

    fn record(&mut self, match_id: MatchId, result: &Result<(), EngineError>) {
        if let Err(e) = result {
            self.last_errors.insert(match_id, e.to_string());
        }
    }
}

impl<P: DecisionProvider> Default for MatchManager<P> {
    fn default() -> Self {
        Self::new()
    }
}
