//! Card placement anchored on detected faces
//!
//! A portrait card is roughly `width_multiplier` face widths across with the
//! face in its upper part. Height follows width exactly, so these candidates
//! always have the target aspect ratio.

use crate::bbox::StrategyKind;
use crate::detection::{DetectionContext, StrategyOutput};
use crate::traits::CandidateStrategy;
use crate::{FaceBox, Region, TARGET_ASPECT_RATIO};

use super::Budget;

#[derive(Debug, Clone, Copy, Default)]
pub struct FaceAnchoredStrategy;

impl FaceAnchoredStrategy {
    /// Card rectangles around one face, shifted inside the image where
    /// needed. Placements larger than the image are skipped.
    pub fn placements(
        face: &FaceBox,
        width_multiplier: f64,
        horizontal_offsets: &[f64],
        headroom: f64,
        image_width: u32,
        image_height: u32,
    ) -> Vec<Region> {
        let card_w = (face.width as f64 * width_multiplier).round();
        let card_h = (card_w / TARGET_ASPECT_RATIO).round();
        if card_w < 1.0 || card_w > image_width as f64 || card_h > image_height as f64 {
            return Vec::new();
        }

        let face_cx = face.x as f64 + face.width as f64 / 2.0;
        let top = face.y as f64 - card_h * headroom;

        let mut regions: Vec<Region> = Vec::new();
        for offset in horizontal_offsets {
            let cx = face_cx + offset * face.width as f64;
            let x = (cx - card_w / 2.0).clamp(0.0, image_width as f64 - card_w);
            let y = top.clamp(0.0, image_height as f64 - card_h);
            let region = Region::new(
                x.round() as u32,
                y.round() as u32,
                card_w as u32,
                card_h as u32,
            );
            if region.fits_within(image_width, image_height) && !regions.contains(&region) {
                regions.push(region);
            }
        }
        regions
    }
}

impl CandidateStrategy for FaceAnchoredStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::FaceAnchored
    }

    fn generate(&self, ctx: &DetectionContext<'_>) -> StrategyOutput {
        let mut output = StrategyOutput::empty(self.kind());
        if ctx.faces.is_empty() {
            return output;
        }

        let cfg = &ctx.config.face;
        let mut budget = Budget::new(cfg.max_evaluations);

        'faces: for face in ctx.faces {
            if ctx.cancel.is_cancelled() {
                output.cancelled = true;
                break;
            }
            let placements = Self::placements(
                face,
                cfg.width_multiplier,
                &cfg.horizontal_offsets,
                cfg.headroom,
                ctx.sampler.width(),
                ctx.sampler.height(),
            );
            for region in placements {
                if !budget.spend() {
                    output.exhausted = true;
                    break 'faces;
                }
                let contains_face = region.contains(&face.region()) || ctx.contains_face(&region);
                let score = ctx.score(&region, contains_face);
                if score.confidence >= cfg.threshold {
                    output
                        .candidates
                        .push(ctx.candidate(region, score, contains_face, self.kind()));
                }
            }
        }

        output.evaluated = budget.used();
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placements_have_exact_aspect() {
        let face = FaceBox::new(200, 150, 70, 80, 0.9);
        let regions =
            FaceAnchoredStrategy::placements(&face, 1.8, &[0.0, -0.2, 0.2], 0.15, 800, 800);
        assert_eq!(regions.len(), 3);
        for region in regions {
            assert_eq!(region.width, 126);
            assert_eq!(region.height, 176);
            assert!(region.aspect_deviation() < 0.01);
            assert!(region.contains(&face.region()));
        }
    }

    #[test]
    fn test_oversized_placement_is_skipped() {
        let face = FaceBox::new(0, 0, 300, 300, 0.9);
        assert!(FaceAnchoredStrategy::placements(&face, 1.8, &[0.0], 0.15, 400, 400).is_empty());
    }

    #[test]
    fn test_placements_are_shifted_inside() {
        let face = FaceBox::new(0, 0, 40, 40, 0.9);
        for region in FaceAnchoredStrategy::placements(&face, 1.8, &[0.0, -0.2], 0.15, 300, 300) {
            assert!(region.fits_within(300, 300));
            assert_eq!(region.x, 0);
            assert_eq!(region.y, 0);
        }
    }
}
