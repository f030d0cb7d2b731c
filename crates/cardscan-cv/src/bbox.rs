//! Candidate regions and greedy overlap suppression
//!
//! Core abstraction for representing and ranking card proposals before they
//! are accepted.

use crate::Region;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Which strategy proposed a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Geometric,
    FaceAnchored,
    EdgeGuided,
    ContourGuided,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Geometric => "geometric",
            StrategyKind::FaceAnchored => "face_anchored",
            StrategyKind::EdgeGuided => "edge_guided",
            StrategyKind::ContourGuided => "contour_guided",
        }
    }

    /// Face-anchored rectangles derive their height from the width, so they
    /// are exempt from the sweep's aspect tolerance.
    pub fn is_aspect_constrained(&self) -> bool {
        !matches!(self, StrategyKind::FaceAnchored)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposed card rectangle with its frozen confidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRegion {
    pub region: Region,
    pub confidence: f64,
    /// Uncapped score; separates candidates whose confidence saturates
    #[serde(default)]
    pub fit: f64,
    pub contains_face: bool,
    pub background_removed: bool,
    pub strategy: StrategyKind,
}

impl CandidateRegion {
    pub fn new(region: Region, confidence: f64, strategy: StrategyKind) -> Self {
        Self {
            region,
            confidence: confidence.clamp(0.0, 1.0),
            fit: confidence,
            contains_face: false,
            background_removed: false,
            strategy,
        }
    }

    pub fn with_fit(mut self, fit: f64) -> Self {
        self.fit = fit;
        self
    }

    pub fn with_face(mut self, contains_face: bool) -> Self {
        self.contains_face = contains_face;
        self
    }

    pub fn with_background_removed(mut self, background_removed: bool) -> Self {
        self.background_removed = background_removed;
        self
    }

    pub fn area(&self) -> u64 {
        self.region.area()
    }

    pub fn overlap_ratio(&self, other: &CandidateRegion) -> f64 {
        self.region.overlap_ratio(&other.region)
    }

    /// Ranking used by suppression: background-removed first, then face
    /// containment, then confidence, then fit. Position breaks remaining
    /// ties so the order is total.
    pub fn priority_cmp(&self, other: &CandidateRegion) -> Ordering {
        other
            .background_removed
            .cmp(&self.background_removed)
            .then_with(|| other.contains_face.cmp(&self.contains_face))
            .then_with(|| other.confidence.total_cmp(&self.confidence))
            .then_with(|| other.fit.total_cmp(&self.fit))
            .then_with(|| {
                (self.region.y, self.region.x, self.region.width, self.region.height).cmp(&(
                    other.region.y,
                    other.region.x,
                    other.region.width,
                    other.region.height,
                ))
            })
    }
}

/// Collection of candidates with batch operations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateCollection {
    candidates: Vec<CandidateRegion>,
}

impl CandidateCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(candidates: Vec<CandidateRegion>) -> Self {
        Self { candidates }
    }

    pub fn push(&mut self, candidate: CandidateRegion) {
        self.candidates.push(candidate);
    }

    pub fn extend(&mut self, other: CandidateCollection) {
        self.candidates.extend(other.candidates);
    }

    pub fn as_slice(&self) -> &[CandidateRegion] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn sort_by_priority(&mut self) {
        self.candidates.sort_by(|a, b| a.priority_cmp(b));
    }

    pub fn filter_by_confidence(mut self, threshold: f64) -> Self {
        self.candidates.retain(|c| c.confidence >= threshold);
        self
    }

    pub fn filter_by_strategy(mut self, strategy: StrategyKind) -> Self {
        self.candidates.retain(|c| c.strategy == strategy);
        self
    }

    /// Greedy suppression: walk candidates in priority order and accept one
    /// only if its overlap with every accepted candidate, measured over the
    /// smaller area, stays at or below `threshold`. Stops after `max_keep`.
    pub fn apply_nms(mut self, threshold: f64, max_keep: usize) -> Self {
        if self.candidates.is_empty() || max_keep == 0 {
            return Self::new();
        }

        self.sort_by_priority();

        let mut keep: Vec<CandidateRegion> = Vec::new();
        for candidate in self.candidates {
            if keep.len() >= max_keep {
                break;
            }
            let clear = keep
                .iter()
                .all(|accepted| accepted.overlap_ratio(&candidate) <= threshold);
            if clear {
                keep.push(candidate);
            }
        }

        Self::from_vec(keep)
    }

    pub fn count_by_strategy(&self) -> BTreeMap<StrategyKind, usize> {
        let mut counts = BTreeMap::new();
        for candidate in &self.candidates {
            *counts.entry(candidate.strategy).or_insert(0) += 1;
        }
        counts
    }

    pub fn stats(&self) -> CandidateStats {
        let mut max_confidence: f64 = 0.0;
        let mut min_confidence = f64::INFINITY;
        let mut total = 0.0;

        for candidate in &self.candidates {
            total += candidate.confidence;
            max_confidence = max_confidence.max(candidate.confidence);
            min_confidence = min_confidence.min(candidate.confidence);
        }

        CandidateStats {
            total: self.candidates.len(),
            avg_confidence: if self.candidates.is_empty() {
                0.0
            } else {
                total / self.candidates.len() as f64
            },
            max_confidence,
            min_confidence: if min_confidence == f64::INFINITY {
                0.0
            } else {
                min_confidence
            },
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CandidateRegion> {
        self.candidates.iter()
    }

    pub fn into_vec(self) -> Vec<CandidateRegion> {
        self.candidates
    }
}

impl IntoIterator for CandidateCollection {
    type Item = CandidateRegion;
    type IntoIter = std::vec::IntoIter<CandidateRegion>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.into_iter()
    }
}

impl FromIterator<CandidateRegion> for CandidateCollection {
    fn from_iter<T: IntoIterator<Item = CandidateRegion>>(iter: T) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

/// Confidence summary over a collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateStats {
    pub total: usize,
    pub avg_confidence: f64,
    pub max_confidence: f64,
    pub min_confidence: f64,
}
