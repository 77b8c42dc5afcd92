//! Error types for packet ingestion

use thiserror::Error;

/// A packet document lacks the frame metadata every packet must carry
///
/// Unlike an absent protocol layer (most captured packets are irrelevant and
/// are dropped silently), a shape error means the input is not what tshark
/// produces. Ingestion stops and the error is surfaced to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShapeError {
    /// Required protocol layer not found
    #[error("packet has no `{0}` layer")]
    MissingProto(String),

    /// Required field not found in a layer
    #[error("`{proto}` layer has no `{field}` field")]
    MissingField { proto: String, field: String },

    /// Frame number is not an unsigned integer
    #[error("invalid frame number: {0:?}")]
    InvalidFrameNumber(String),
}
