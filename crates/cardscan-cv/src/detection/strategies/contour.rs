//! Sweep gated on a flat interior framed by a well-defined border

use crate::bbox::StrategyKind;
use crate::detection::{DetectionContext, StrategyOutput};
use crate::sampler::weakest_side;
use crate::traits::CandidateStrategy;

/// Interior colour deviation at which flatness reaches zero.
const COLOR_STD_ZERO: f32 = 64.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct ContourStrategy;

impl CandidateStrategy for ContourStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ContourGuided
    }

    fn generate(&self, ctx: &DetectionContext<'_>) -> StrategyOutput {
        let Some(edges) = ctx.edges else {
            return StrategyOutput::empty(self.kind());
        };
        let cfg = &ctx.config.contour;
        let per_edge = ctx.config.scoring.samples_per_edge;
        let grid = ctx.config.scoring.uniformity_grid;

        super::sweep_candidates(ctx, self.kind(), cfg.max_evaluations, cfg.threshold, |region| {
            // border first, it is the cheaper of the two checks
            let threshold = cfg.edge_pixel_threshold as f32;
            let density = weakest_side(edges.side_densities(region, per_edge, threshold));
            if (density as f64) < cfg.min_border_density {
                return false;
            }
            let stats = ctx.sampler.interior_stats(region, grid, 0.1);
            let uniformity = (1.0 - stats.color_std / COLOR_STD_ZERO).max(0.0);
            uniformity as f64 >= cfg.min_uniformity
        })
    }
}
