//! Candidate generation, scoring and resolution

pub mod config;
pub mod detector;
pub mod strategies;
pub mod sweep;

pub use config::{
    ContourConfig, DetectionConfig, EdgeConfig, ExtractionConfig, FaceAnchoredConfig,
    GeometricConfig, ScoringConfig,
};
pub use detector::{CardDetector, DetectionInput, DetectionOutcome};
pub use sweep::RectSweep;

use crate::bbox::{CandidateRegion, StrategyKind};
use crate::sampler::{EdgeMap, PixelSampler};
use crate::scoring::{RegionConfidenceScorer, RegionScore};
use crate::{FaceBox, Region};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared stop signal for work that may outlive its caller.
///
/// Raised when a pipeline run times out; strategies poll it between
/// evaluations and return early.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Everything a strategy may read while generating candidates.
///
/// All coordinates, faces included, are in detection-raster space.
pub struct DetectionContext<'a> {
    pub sampler: &'a PixelSampler,
    pub edges: Option<&'a EdgeMap>,
    pub faces: &'a [FaceBox],
    pub background_removed: bool,
    pub scorer: &'a RegionConfidenceScorer,
    pub config: &'a DetectionConfig,
    pub sweep: &'a RectSweep,
    pub cancel: &'a CancellationFlag,
}

impl DetectionContext<'_> {
    /// True when some face lies entirely inside `region`.
    pub fn contains_face(&self, region: &Region) -> bool {
        self.faces.iter().any(|face| region.contains(&face.region()))
    }

    pub fn score(&self, region: &Region, contains_face: bool) -> RegionScore {
        self.scorer
            .score_region(self.sampler, region, contains_face, self.background_removed)
    }

    pub fn candidate(
        &self,
        region: Region,
        score: RegionScore,
        contains_face: bool,
        strategy: StrategyKind,
    ) -> CandidateRegion {
        CandidateRegion::new(region, score.confidence, strategy)
            .with_fit(score.fit)
            .with_face(contains_face)
            .with_background_removed(self.background_removed)
    }
}

/// What one strategy produced and how much of its budget it used.
#[derive(Debug, Clone)]
pub struct StrategyOutput {
    pub strategy: StrategyKind,
    pub candidates: Vec<CandidateRegion>,
    pub evaluated: usize,
    /// Budget ran out before the search space did
    pub exhausted: bool,
    pub cancelled: bool,
}

impl StrategyOutput {
    pub fn empty(strategy: StrategyKind) -> Self {
        Self {
            strategy,
            candidates: Vec::new(),
            evaluated: 0,
            exhausted: false,
            cancelled: false,
        }
    }
}
