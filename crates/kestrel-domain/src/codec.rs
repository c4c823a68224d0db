//! The serialization seam for distributed exploration.
//!
//! Independent engine instances exchange `(state, precision)` pairs as
//! analysis-defined JSON payloads; this trait is the only point where
//! the engine's internal objects cross a process boundary. The payload
//! layout is owned entirely by the analysis — the engine treats it as
//! opaque.

use serde_json::Value;
use thiserror::Error;

use crate::traits::Analysis;

/// Payload conversion failures.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("payload serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode and decode one analysis's states for the message channel.
///
/// `decode(encode(s, p))` must reproduce a pair structurally equal to
/// `(s, p)`.
pub trait StateCodec: Analysis {
    fn encode(
        &self,
        state: &Self::State,
        precision: &Self::Precision,
    ) -> Result<Value, CodecError>;

    fn decode(&self, payload: &Value) -> Result<(Self::State, Self::Precision), CodecError>;
}
