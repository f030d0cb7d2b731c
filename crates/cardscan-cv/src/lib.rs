//! Trading card region detection
//!
//! A multi-strategy pipeline that searches photographs for card-shaped
//! rectangles, scores them with independent heuristics, suppresses
//! duplicates and cuts the survivors out as normalized JPEGs.

pub mod bbox;
pub mod detection;
pub mod error;
pub mod extraction;
pub mod sampler;
pub mod scoring;
pub mod service;
pub mod utils;

// Re-export commonly used types
pub use bbox::{CandidateCollection, CandidateRegion, StrategyKind};
pub use detection::{
    CancellationFlag, CardDetector, DetectionConfig, DetectionInput, DetectionOutcome,
};
pub use error::CardScanError;
pub use extraction::{CardExtractor, PlaceholderEnricher};
pub use sampler::{EdgeMap, PixelSampler};
pub use scoring::{RegionConfidenceScorer, RegionScore};
pub use service::{CardDetectionService, ServiceConfig, SessionStore};
pub use utils::{ImageUtils, OverlapResolver};

pub use cardscan_core::{
    AutoExtractedData, CardStatus, DetectedCard, DetectionStats, FaceBox, Guess,
    ProcessingResult, ProcessingStatus, Region, SessionId, SessionStatus, SourceFile,
    UploadSession, TARGET_ASPECT_RATIO,
};

// Error handling
pub type Result<T> = anyhow::Result<T>;

/// Result type of the public service surface.
pub type ScanResult<T> = std::result::Result<T, CardScanError>;

/// Seams where external capabilities plug into the pipeline
pub mod traits {
    use super::*;
    use crate::detection::{DetectionContext, StrategyOutput};
    use image::RgbaImage;

    /// Finds faces in an image. Returning an empty list is not an error.
    pub trait FaceDetector: Send + Sync {
        fn name(&self) -> &str {
            "face-detector"
        }

        fn detect(&self, image: &RgbaImage) -> Result<Vec<FaceBox>>;
    }

    /// Suppresses the background of an image through its alpha channel.
    ///
    /// `Ok(None)` means the remover does not apply to this image.
    pub trait BackgroundRemover: Send + Sync {
        fn name(&self) -> &str {
            "background-remover"
        }

        fn remove_background(&self, image: &RgbaImage) -> Result<Option<RgbaImage>>;
    }

    /// Reads structured metadata off an extracted card.
    ///
    /// Implementations never fail: unreadable content yields empty or
    /// partial data.
    pub trait MetadataEnricher: Send + Sync {
        fn enrich(&self, card: &DetectedCard) -> AutoExtractedData;
    }

    /// One way of proposing candidate card regions.
    pub trait CandidateStrategy: Send + Sync {
        fn kind(&self) -> StrategyKind;

        fn generate(&self, ctx: &DetectionContext<'_>) -> StrategyOutput;
    }

    /// Face detector for hosts without one.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct NoFaceDetector;

    impl FaceDetector for NoFaceDetector {
        fn name(&self) -> &str {
            "none"
        }

        fn detect(&self, _image: &RgbaImage) -> Result<Vec<FaceBox>> {
            Ok(Vec::new())
        }
    }
}
