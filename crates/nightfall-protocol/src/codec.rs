//! Codec trait and implementations for encoding events and snapshots.
//!
//! Observers that ship events out of process (a recorder, a spectator feed)
//! go through a [`Codec`] rather than calling a serializer directly, so the
//! byte format can be swapped without touching the engine.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes values to bytes and decodes them back.
///
/// `Send + Sync + 'static` because codecs live inside event-bus handlers,
/// which run on whatever worker thread the match task is scheduled on.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value cannot be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` for malformed or truncated input.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`. One event encodes to one JSON line.
///
/// Behind the `json` feature (on by default).
///
/// ```rust
/// use nightfall_protocol::{Codec, EventChannel, GameEvent, JsonCodec};
///
/// let codec = JsonCodec;
/// let event = GameEvent {
///     seq: 1,
///     channel: EventChannel::System,
///     message: "the match begins".into(),
///     recipients: vec!["p1".into()],
///     metadata: None,
/// };
///
/// let bytes = codec.encode(&event).unwrap();
/// let decoded: GameEvent = codec.decode(&bytes).unwrap();
/// assert_eq!(event, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
