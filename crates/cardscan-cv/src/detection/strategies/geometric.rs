//! Plain grid sweep scored on image evidence alone

use crate::bbox::StrategyKind;
use crate::detection::{DetectionContext, StrategyOutput};
use crate::traits::CandidateStrategy;

#[derive(Debug, Clone, Copy, Default)]
pub struct GeometricStrategy;

impl CandidateStrategy for GeometricStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Geometric
    }

    fn generate(&self, ctx: &DetectionContext<'_>) -> StrategyOutput {
        let cfg = &ctx.config.geometric;
        super::sweep_candidates(ctx, self.kind(), cfg.max_evaluations, cfg.threshold, |_| true)
    }
}
