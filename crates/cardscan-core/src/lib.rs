//! Data model shared by the card detection pipeline.
//!
//! Nothing here touches pixels: the types describe rectangles, detected cards
//! and upload sessions so that the vision crate and its callers agree on one
//! vocabulary.

pub mod card;
pub mod geometry;
pub mod session;
pub mod source;

pub use card::{AutoExtractedData, CardStatus, DetectedCard, Guess};
pub use geometry::{FaceBox, Region, TARGET_ASPECT_RATIO};
pub use session::{
    DetectionStats, ProcessingResult, ProcessingStatus, SessionId, SessionStatus, UploadSession,
};
pub use source::SourceFile;
