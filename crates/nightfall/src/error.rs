//! Unified error type for Nightfall.

use nightfall_clock::ControlError;
use nightfall_engine::EngineError;
use nightfall_protocol::ProtocolError;
use nightfall_rules::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum NightfallError {
    /// Encoding or decoding an event failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The match configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A start, pause, resume, or stop was rejected.
    #[error(transparent)]
    Control(#[from] ControlError),

    /// An engine operation failed.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[cfg(test)]
mod tests {
    use nightfall_protocol::{MatchId, ParticipantId};

    use super::*;

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let nightfall_err: NightfallError = err.into();
        assert!(matches!(nightfall_err, NightfallError::Protocol(_)));
        assert!(nightfall_err.to_string().contains("bad"));
    }

    #[test]
    fn test_from_config_error() {
        let err = ConfigError::DuplicateParticipant(ParticipantId::from("p1"));
        let nightfall_err: NightfallError = err.into();
        assert!(matches!(nightfall_err, NightfallError::Config(_)));
        assert!(nightfall_err.to_string().contains("p1"));
    }

    #[test]
    fn test_from_control_error() {
        let nightfall_err: NightfallError = ControlError::AlreadyActive(nightfall_clock::RunStatus::Running).into();
        assert!(matches!(nightfall_err, NightfallError::Control(_)));
    }

    #[test]
    fn test_from_engine_error() {
        let err = EngineError::NotFound(MatchId(7));
        let nightfall_err: NightfallError = err.into();
        assert!(matches!(nightfall_err, NightfallError::Engine(_)));
        assert!(nightfall_err.to_string().contains("M-7"));
    }

    #[test]
    fn test_config_parse_error_surfaces_through_question_mark() {
        fn load(json: &str) -> Result<nightfall_rules::MatchConfig, NightfallError> {
            Ok(nightfall_rules::MatchConfig::from_json(json)?)
        }
        let err = load(&serde_json::json!({ "phases": {} }).to_string()).unwrap_err();
        assert!(matches!(err, NightfallError::Config(_)));
    }
}
