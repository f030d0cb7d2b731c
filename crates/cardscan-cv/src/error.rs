//! Error taxonomy of the detection service

use crate::SessionId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CardScanError {
    #[error("input `{name}` is {size} bytes, above the {limit} byte limit")]
    InputTooLarge {
        name: String,
        size: usize,
        limit: usize,
    },

    #[error("failed to decode image `{name}`")]
    ImageDecode {
        name: String,
        #[source]
        source: image::ImageError,
    },

    #[error("detection for `{name}` exceeded {timeout_ms}ms")]
    DetectionTimeout { name: String, timeout_ms: u64 },

    #[error("detection for `{name}` failed")]
    Detection {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to extract region {index}: {reason}")]
    Extraction { index: usize, reason: String },

    #[error("{collaborator} unavailable: {reason}")]
    CollaboratorUnavailable {
        collaborator: String,
        reason: String,
    },

    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    #[error("session {0} is already finished")]
    SessionFinished(SessionId),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CardScanError {
    /// Input validation failures are reported before any session exists.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            CardScanError::InputTooLarge { .. } | CardScanError::ImageDecode { .. }
        )
    }
}
