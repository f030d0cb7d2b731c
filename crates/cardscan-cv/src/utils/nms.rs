//! Overlap resolution between candidate lists

use crate::bbox::{CandidateCollection, CandidateRegion};
use crate::detection::DetectionConfig;
use tracing::debug;

/// Merges candidates from every strategy and keeps a non-overlapping subset.
#[derive(Debug, Clone, Copy)]
pub struct OverlapResolver {
    threshold: f64,
    max_regions: usize,
}

impl OverlapResolver {
    pub fn new(threshold: f64, max_regions: usize) -> Self {
        Self {
            threshold,
            max_regions,
        }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(config.overlap_threshold, config.max_regions)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn resolve(&self, candidates: CandidateCollection) -> Vec<CandidateRegion> {
        let proposed = candidates.len();
        let accepted = candidates.apply_nms(self.threshold, self.max_regions);
        debug!(
            proposed,
            accepted = accepted.len(),
            threshold = self.threshold,
            "resolved overlapping candidates"
        );
        accepted.into_vec()
    }

    /// Merge several strategy outputs, then resolve.
    pub fn resolve_all<I>(&self, lists: I) -> Vec<CandidateRegion>
    where
        I: IntoIterator<Item = Vec<CandidateRegion>>,
    {
        let merged: CandidateCollection = lists.into_iter().flatten().collect();
        self.resolve(merged)
    }
}
