//! Background execution of one match.

use std::sync::Arc;
use std::time::Duration;

use nightfall_clock::{ClockConfig, PhaseClock, RunControl, RunStatus};
use nightfall_protocol::{ParticipantId, Phase, Team};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard, mpsc};
use tracing::{debug, info};

use crate::{AdminCommand, DecisionProvider, EngineError, EventBus, MatchEngine};

/// Called once when a run ends, with the final status and progress.
pub type CompletionCallback = Arc<dyn Fn(RunStatus, &MatchProgress) + Send + Sync>;

/// What the run loop reports at every phase boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchProgress {
    pub phase: Phase,
    pub round: u32,
    pub winner: Option<Team>,
    pub alive: usize,
}

impl Default for MatchProgress {
    fn default() -> Self {
        Self {
            phase: Phase::Waiting,
            round: 1,
            winner: None,
            alive: 0,
        }
    }
}

/// Drives a [`MatchEngine`] on a background task.
///
/// Control calls (`pause`, `resume`, `stop`, status queries) only touch the
/// [`RunControl`] lock, so they stay responsive while the engine is waiting
/// on a slow provider.
pub struct MatchRunner<P: DecisionProvider> {
    engine: Arc<Mutex<MatchEngine<P>>>,
    control: RunControl<MatchProgress>,
    clock: ClockConfig,
    commands: mpsc::UnboundedSender<AdminCommand>,
    roster: Vec<ParticipantId>,
    bus: Arc<EventBus>,
    on_finish: Option<CompletionCallback>,
}

impl<P: DecisionProvider> MatchRunner<P> {
    pub fn new(engine: MatchEngine<P>) -> Self {
        let commands = engine.command_sender();
        let roster = engine.roster().to_vec();
        let bus = Arc::clone(engine.bus());
        Self {
            engine: Arc::new(Mutex::new(engine)),
            control: RunControl::new(),
            clock: ClockConfig::default(),
            commands,
            roster,
            bus,
            on_finish: None,
        }
    }

    pub fn with_clock(mut self, clock: ClockConfig) -> Self {
        self.clock = clock.validated();
        self
    }

    /// Registers a callback for the end of every run.
    pub fn on_finish<F>(mut self, callback: F) -> Self
    where
        F: Fn(RunStatus, &MatchProgress) + Send + Sync + 'static,
    {
        self.on_finish = Some(Arc::new(callback));
        self
    }

    /// Spawns the run loop and returns immediately.
    ///
    /// Fails with [`EngineError::Control`] while a run is already active.
    pub fn start_async(&self) -> Result<(), EngineError> {
        self.control.begin()?;

        let engine = Arc::clone(&self.engine);
        let control = self.control.clone();
        let mut clock = PhaseClock::new(self.clock.clone());
        let on_finish = self.on_finish.clone();

        tokio::spawn(async move {
            let mut guard = engine.lock().await;
            guard.run(&control, &mut clock).await;
            drop(guard);

            let status = control.finish();
            let progress = control.progress();
            info!(
                %status,
                phase = %progress.phase,
                round = progress.round,
                waited_ms = clock.metrics().time_waited.as_millis() as u64,
                "match run ended"
            );
            if let Some(callback) = on_finish {
                callback(status, &progress);
            }
        });
        Ok(())
    }

    /// Returns `false` unless the run was running.
    pub fn pause(&self) -> bool {
        self.control.pause()
    }

    /// Returns `false` unless the run was paused.
    pub fn resume(&self) -> bool {
        self.control.resume()
    }

    /// Requests a stop. The loop exits at its next checkpoint.
    pub fn stop(&self) -> bool {
        self.control.stop()
    }

    pub fn status(&self) -> RunStatus {
        self.control.status()
    }

    pub fn progress(&self) -> MatchProgress {
        self.control.progress()
    }

    pub fn is_running(&self) -> bool {
        self.control.is_running()
    }

    pub fn is_paused(&self) -> bool {
        self.control.is_paused()
    }

    /// Waits for the current run to end. Returns `false` on timeout.
    pub async fn wait_for_completion(&self, timeout: Option<Duration>) -> bool {
        self.control.wait_until_ended(timeout).await
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn roster(&self) -> &[ParticipantId] {
        &self.roster
    }

    /// Locks the engine. Waits for the run loop to release it if a run is
    /// active.
    pub async fn engine(&self) -> MutexGuard<'_, MatchEngine<P>> {
        self.engine.lock().await
    }

    /// Parses and applies a `SET_COOLDOWN` line.
    ///
    /// While a run is active the command is queued for the next phase
    /// boundary; otherwise it is applied right away.
    pub async fn admin_override(&self, line: &str) -> Result<(), EngineError> {
        let command: AdminCommand = line.parse()?;
        if !self.roster.contains(command.participant()) {
            return Err(EngineError::InvalidCommand(format!(
                "unknown participant '{}'",
                command.participant()
            )));
        }

        if self.control.status().is_active() {
            debug!(%command, "admin command queued");
            self.commands
                .send(command)
                .map_err(|e| EngineError::InvalidCommand(format!("match loop gone: {}", e.0)))
        } else {
            self.engine.lock().await.apply_command(command)
        }
    }
}

impl<P: DecisionProvider> Drop for MatchRunner<P> {
    fn drop(&mut self) {
        if self.control.stop() {
            debug!("runner dropped, stopping match");
        }
    }
}
