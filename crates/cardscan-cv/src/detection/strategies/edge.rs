//! Sweep gated on Sobel edge strength along every side of the outline

use crate::bbox::StrategyKind;
use crate::detection::{DetectionContext, StrategyOutput};
use crate::sampler::weakest_side;
use crate::traits::CandidateStrategy;

#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeStrategy;

impl CandidateStrategy for EdgeStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::EdgeGuided
    }

    fn generate(&self, ctx: &DetectionContext<'_>) -> StrategyOutput {
        let Some(edges) = ctx.edges else {
            return StrategyOutput::empty(self.kind());
        };
        let cfg = &ctx.config.edge;
        let per_edge = ctx.config.scoring.samples_per_edge;
        let min_strength = cfg.min_edge_strength as f32;

        super::sweep_candidates(ctx, self.kind(), cfg.max_evaluations, cfg.threshold, |region| {
            weakest_side(edges.side_strengths(region, per_edge)) >= min_strength
        })
    }
}
