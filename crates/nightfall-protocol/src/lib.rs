//! Shared vocabulary for Nightfall.
//!
//! - **Types** ([`ParticipantId`], [`Team`], [`Phase`], [`GameEvent`], ...):
//!   the values every other crate passes around.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how events leave the process.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! protocol → rules → engine → observers (via Codec)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{EventChannel, EventMetadata, GameEvent, MatchId, ParticipantId, Phase, Team};
