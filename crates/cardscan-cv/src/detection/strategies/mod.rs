//! Candidate generation strategies
//!
//! The sweep-based strategies share one loop and differ only in the cheap
//! gate they apply before scoring and in their acceptance threshold.

pub mod contour;
pub mod edge;
pub mod face;
pub mod geometric;

pub use contour::ContourStrategy;
pub use edge::EdgeStrategy;
pub use face::FaceAnchoredStrategy;
pub use geometric::GeometricStrategy;

use super::{DetectionContext, StrategyOutput};
use crate::bbox::StrategyKind;
use crate::Region;
use tracing::debug;

/// How often the sweep polls the cancellation flag.
const CANCEL_POLL_INTERVAL: usize = 512;

/// Counts evaluations against a fixed ceiling.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Budget {
    limit: usize,
    used: usize,
}

impl Budget {
    pub(crate) fn new(limit: usize) -> Self {
        Self { limit, used: 0 }
    }

    /// Take one evaluation; false once the ceiling is reached.
    pub(crate) fn spend(&mut self) -> bool {
        if self.used >= self.limit {
            return false;
        }
        self.used += 1;
        true
    }

    pub(crate) fn used(&self) -> usize {
        self.used
    }
}

/// Walk the context's sweep, gate each rectangle, score the survivors and
/// keep those at or above `threshold`.
pub(crate) fn sweep_candidates<G>(
    ctx: &DetectionContext<'_>,
    strategy: StrategyKind,
    max_evaluations: usize,
    threshold: f64,
    gate: G,
) -> StrategyOutput
where
    G: Fn(&Region) -> bool,
{
    let mut output = StrategyOutput::empty(strategy);
    let mut budget = Budget::new(max_evaluations);

    for region in ctx.sweep.regions() {
        if !budget.spend() {
            output.exhausted = true;
            break;
        }
        if budget.used() % CANCEL_POLL_INTERVAL == 0 && ctx.cancel.is_cancelled() {
            output.cancelled = true;
            break;
        }
        if !gate(&region) {
            continue;
        }

        let contains_face = ctx.contains_face(&region);
        let score = ctx.score(&region, contains_face);
        if score.confidence >= threshold {
            output
                .candidates
                .push(ctx.candidate(region, score, contains_face, strategy));
        }
    }

    output.evaluated = budget.used();
    if output.exhausted {
        debug!(
            strategy = %strategy,
            evaluated = output.evaluated,
            "evaluation budget exhausted, returning partial candidates"
        );
    }
    output
}
