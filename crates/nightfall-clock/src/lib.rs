//! Run control and interruptible phase timing for Nightfall.
//!
//! A match runs as one Tokio task that idles for a fixed duration after
//! resolving each phase. Operators on other tasks need to pause, resume, or
//! stop it without waiting out that duration. This crate provides the two
//! halves of that:
//!
//! - [`RunControl`]: the shared control surface. Run status, the stop
//!   request, and a caller-defined progress payload all live behind one
//!   `std::sync::Mutex` that is only held for flag reads and writes.
//! - [`PhaseClock`]: waits out a phase in bounded slices, re-checking the
//!   control flags between slices. A stop takes effect within one slice.
//!
//! # Integration
//!
//! ```ignore
//! let control = RunControl::<()>::new();
//! control.begin()?;
//! let mut clock = PhaseClock::new(ClockConfig::default());
//! loop {
//!     if !clock.hold_while_paused(&control).await { break; }
//!     resolve_phase();
//!     if clock.wait(phase_duration, &control).await == WaitOutcome::Stopped {
//!         break;
//!     }
//! }
//! control.finish();
//! ```

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// RunStatus
// ---------------------------------------------------------------------------

/// Lifecycle of one background run.
///
/// ```text
/// Idle → Running ⇄ Paused
///           │        │
///           └────────┴──→ Finished | Stopped
/// ```
///
/// `Finished` and `Stopped` are terminal for that run; [`RunControl::begin`]
/// may start a fresh run from either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStatus {
    Idle,
    Running,
    Paused,
    /// The run ended on its own.
    Finished,
    /// The run ended because a stop was requested.
    Stopped,
}

impl RunStatus {
    /// `true` while a run is in progress, paused or not.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }

    /// `true` once a run has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Stopped)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Finished => "finished",
            Self::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected control operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    /// `begin` while a run is already in progress.
    #[error("a run is already active ({0})")]
    AlreadyActive(RunStatus),
}

// ---------------------------------------------------------------------------
// RunControl
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ControlState<P> {
    status: RunStatus,
    stop_requested: bool,
    progress: P,
}

/// Shared control flags for one background run.
///
/// Cheap to clone; every clone refers to the same flags. `P` is a progress
/// payload the run publishes for status queries (for example the current
/// phase), stored under the same lock as the flags.
#[derive(Debug)]
pub struct RunControl<P = ()> {
    state: Arc<Mutex<ControlState<P>>>,
    status_tx: Arc<watch::Sender<RunStatus>>,
}

impl<P> Clone for RunControl<P> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            status_tx: Arc::clone(&self.status_tx),
        }
    }
}

impl<P: Default> Default for RunControl<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Default> RunControl<P> {
    pub fn new() -> Self {
        let (status_tx, _) = watch::channel(RunStatus::Idle);
        Self {
            state: Arc::new(Mutex::new(ControlState {
                status: RunStatus::Idle,
                stop_requested: false,
                progress: P::default(),
            })),
            status_tx: Arc::new(status_tx),
        }
    }
}

impl<P> RunControl<P> {
    fn lock(&self) -> MutexGuard<'_, ControlState<P>> {
        // A poisoned lock only means a panic elsewhere while flipping a
        // flag; the flags themselves are still coherent.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_status(&self, state: &mut ControlState<P>, status: RunStatus) {
        state.status = status;
        self.status_tx.send_replace(status);
    }

    pub fn status(&self) -> RunStatus {
        self.lock().status
    }

    /// Starts a new run. Fails if one is already running or paused.
    pub fn begin(&self) -> Result<(), ControlError> {
        let mut state = self.lock();
        if state.status.is_active() {
            return Err(ControlError::AlreadyActive(state.status));
        }
        state.stop_requested = false;
        self.set_status(&mut state, RunStatus::Running);
        debug!("run started");
        Ok(())
    }

    /// `Running → Paused`. Returns `false` in any other status or once a
    /// stop has been requested.
    pub fn pause(&self) -> bool {
        let mut state = self.lock();
        if state.status != RunStatus::Running || state.stop_requested {
            return false;
        }
        self.set_status(&mut state, RunStatus::Paused);
        debug!("run paused");
        true
    }

    /// `Paused → Running`. Returns `false` if not paused.
    pub fn resume(&self) -> bool {
        let mut state = self.lock();
        if state.status != RunStatus::Paused {
            return false;
        }
        self.set_status(&mut state, RunStatus::Running);
        debug!("run resumed");
        true
    }

    /// Requests cooperative termination. Returns `false` if no run is active
    /// or a stop was already requested.
    ///
    /// The run keeps its current status until it reaches a checkpoint and
    /// calls [`finish`](Self::finish).
    pub fn stop(&self) -> bool {
        let mut state = self.lock();
        if !state.status.is_active() || state.stop_requested {
            return false;
        }
        state.stop_requested = true;
        debug!(status = %state.status, "stop requested");
        true
    }

    pub fn is_stop_requested(&self) -> bool {
        self.lock().stop_requested
    }

    pub fn is_paused(&self) -> bool {
        self.lock().status == RunStatus::Paused
    }

    pub fn is_running(&self) -> bool {
        self.lock().status.is_active()
    }

    /// Ends the active run as `Stopped` if a stop was requested, otherwise
    /// as `Finished`. Returns the final status.
    pub fn finish(&self) -> RunStatus {
        let mut state = self.lock();
        if !state.status.is_active() {
            return state.status;
        }
        let status = if state.stop_requested {
            RunStatus::Stopped
        } else {
            RunStatus::Finished
        };
        state.stop_requested = false;
        self.set_status(&mut state, status);
        debug!(%status, "run ended");
        status
    }

    /// Updates the progress payload under the control lock.
    pub fn update_progress(&self, f: impl FnOnce(&mut P)) {
        f(&mut self.lock().progress);
    }

    /// Waits until the current run has ended, or `timeout` elapses.
    ///
    /// Returns `true` if no run is active when the wait ends. A control that
    /// was never started counts as ended.
    pub async fn wait_until_ended(&self, timeout: Option<Duration>) -> bool {
        let mut rx = self.status_tx.subscribe();
        let ended = rx.wait_for(|status| !status.is_active());
        match timeout {
            Some(limit) => matches!(time::timeout(limit, ended).await, Ok(Ok(_))),
            None => ended.await.is_ok(),
        }
    }
}

impl<P: Clone> RunControl<P> {
    /// A copy of the progress payload.
    pub fn progress(&self) -> P {
        self.lock().progress.clone()
    }
}

// ---------------------------------------------------------------------------
// Clock configuration
// ---------------------------------------------------------------------------

/// Slice lengths for [`PhaseClock`].
#[derive(Debug, Clone)]
pub struct ClockConfig {
    /// Longest uninterrupted sleep while running. Bounds stop latency.
    pub slice: Duration,
    /// Re-check interval while paused.
    pub pause_poll: Duration,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            slice: Duration::from_millis(500),
            pause_poll: Duration::from_millis(100),
        }
    }
}

impl ClockConfig {
    /// Shortest slice accepted; anything below spins.
    pub const MIN_SLICE: Duration = Duration::from_millis(1);
    /// Longest slice accepted; anything above makes stop sluggish.
    pub const MAX_SLICE: Duration = Duration::from_secs(5);

    /// Clamps both intervals into `MIN_SLICE..=MAX_SLICE`.
    ///
    /// Called automatically by [`PhaseClock::new`].
    pub fn validated(mut self) -> Self {
        for (name, value) in [("slice", &mut self.slice), ("pause_poll", &mut self.pause_poll)] {
            let clamped = (*value).clamp(Self::MIN_SLICE, Self::MAX_SLICE);
            if clamped != *value {
                warn!(
                    interval = name,
                    requested_ms = value.as_secs_f64() * 1000.0,
                    clamped_ms = clamped.as_secs_f64() * 1000.0,
                    "clock interval out of range, clamping"
                );
                *value = clamped;
            }
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Counters kept by a [`PhaseClock`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClockMetrics {
    /// Calls to [`PhaseClock::wait`].
    pub waits: u64,
    /// Waits that ended early because of a stop request.
    pub interrupted: u64,
    /// Time spent in running slices.
    pub time_waited: Duration,
    /// Time spent polling while paused.
    pub time_paused: Duration,
}

// ---------------------------------------------------------------------------
// PhaseClock
// ---------------------------------------------------------------------------

/// How a [`PhaseClock::wait`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The full duration elapsed.
    Completed,
    /// A stop was requested before the duration elapsed.
    Stopped,
}

/// Cooperative, interruptible phase timer.
///
/// Paused time does not count toward the duration: a 5 s wait that is
/// paused for a minute still sleeps 5 s of running time.
#[derive(Debug)]
pub struct PhaseClock {
    config: ClockConfig,
    metrics: ClockMetrics,
}

impl PhaseClock {
    pub fn new(config: ClockConfig) -> Self {
        Self {
            config: config.validated(),
            metrics: ClockMetrics::default(),
        }
    }

    pub fn config(&self) -> &ClockConfig {
        &self.config
    }

    pub fn metrics(&self) -> &ClockMetrics {
        &self.metrics
    }

    /// Sleeps for `duration` of running time in slices, checking `control`
    /// before each slice.
    pub async fn wait<P>(&mut self, duration: Duration, control: &RunControl<P>) -> WaitOutcome {
        self.metrics.waits += 1;
        let mut remaining = duration;

        while !remaining.is_zero() {
            if control.is_stop_requested() {
                self.metrics.interrupted += 1;
                debug!(
                    remaining_ms = remaining.as_secs_f64() * 1000.0,
                    "phase wait interrupted"
                );
                return WaitOutcome::Stopped;
            }
            if control.is_paused() {
                time::sleep(self.config.pause_poll).await;
                self.metrics.time_paused += self.config.pause_poll;
                continue;
            }

            let slice = remaining.min(self.config.slice);
            time::sleep(slice).await;
            remaining -= slice;
            self.metrics.time_waited += slice;
            trace!(remaining_ms = remaining.as_secs_f64() * 1000.0, "phase slice elapsed");
        }

        if control.is_stop_requested() {
            self.metrics.interrupted += 1;
            return WaitOutcome::Stopped;
        }
        WaitOutcome::Completed
    }

    /// Blocks at a phase boundary while paused.
    ///
    /// Returns `false` if a stop is requested, `true` once running.
    pub async fn hold_while_paused<P>(&mut self, control: &RunControl<P>) -> bool {
        loop {
            if control.is_stop_requested() {
                return false;
            }
            if !control.is_paused() {
                return true;
            }
            time::sleep(self.config.pause_poll).await;
            self.metrics.time_paused += self.config.pause_poll;
        }
    }
}
