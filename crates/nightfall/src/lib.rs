//! # Nightfall
//!
//! Turn-based social-deduction match engine.
//!
//! A match cycles through night, discussion, and vote phases until one team
//! wins. Every participant choice comes from a [`DecisionProvider`] you
//! implement; the engine resolves abilities in a fixed order, applies
//! deaths, and narrates everything on an [`EventBus`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nightfall::prelude::*;
//!
//! # async fn run<P: DecisionProvider>(provider: P) -> Result<(), NightfallError> {
//! let roster: Vec<ParticipantId> = (1..=12).map(|i| format!("p{i}").into()).collect();
//! let engine = MatchEngine::new(MatchConfig::standard(), roster, provider)?;
//! let runner = MatchRunner::new(engine);
//! runner.start_async()?;
//! runner.wait_for_completion(None).await;
//! # Ok(())
//! # }
//! ```

mod error;

pub use error::NightfallError;

pub use nightfall_clock as clock;
pub use nightfall_engine as engine;
pub use nightfall_protocol as protocol;
pub use nightfall_rules as rules;

pub use nightfall_engine::{
    AdminCommand, Decision, DecisionProvider, EventBus, MatchEngine, MatchManager, MatchProgress,
    MatchRunner, MatchSnapshot, MatchStatusReport,
};
pub use nightfall_rules::{MatchConfig, RoleKind, Skill};

/// Installs a global `fmt` subscriber filtered by `RUST_LOG`, falling back
/// to `default_directive`.
///
/// Meant for binaries. Returns `false` if a subscriber was already set.
pub fn init_tracing(default_directive: &str) -> bool {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}

/// Commonly used types, for glob import.
pub mod prelude {
    pub use crate::NightfallError;
    pub use nightfall_clock::{ClockConfig, RunStatus};
    pub use nightfall_engine::{
        AdminCommand, Decision, DecisionProvider, EngineError, EventBus, MatchEngine,
        MatchManager, MatchProgress, MatchRunner, MatchSnapshot, ProviderError,
    };
    pub use nightfall_protocol::{
        Codec, EventChannel, GameEvent, JsonCodec, MatchId, ParticipantId, Phase, Team,
    };
    pub use nightfall_rules::{MatchConfig, RoleKind, Skill};
}
