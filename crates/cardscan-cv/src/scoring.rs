//! Confidence scoring of candidate rectangles
//!
//! An additive point system capped at 1.0. Every term reads the raster
//! through [`PixelSampler`] at fixed positions, so the score is a pure
//! function of the pixels and the rectangle. Clean cards saturate the cap
//! for many nested rectangles; the uncapped [`RegionScore::fit`] tells them
//! apart.

use crate::detection::config::ScoringConfig;
use crate::sampler::{weakest_side, PixelSampler};
use crate::{Region, TARGET_ASPECT_RATIO};

/// Aspect deviation bands and the share of `aspect_weight` each earns.
const ASPECT_BANDS: [(f64, f64); 5] = [
    (0.01, 1.0),
    (0.02, 0.8),
    (0.05, 0.6),
    (0.10, 0.4),
    (0.15, 0.2),
];

/// Area ratios outside this band earn no size bonus.
const ACCEPTABLE_AREA: (f64, f64) = (0.03, 0.30);

/// Mean boundary brightness delta that saturates the edge term.
const EDGE_CONTRAST_FULL: f32 = 100.0;

/// Mean corner gradient that saturates the corner term.
const CORNER_GRADIENT_FULL: f32 = 80.0;

/// Interior luma deviation at which the uniformity term reaches zero.
const UNIFORMITY_STD_ZERO: f32 = 64.0;

/// Confidence of one rectangle plus the uncapped evidence behind it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionScore {
    /// Additive score clamped to [0, 1]
    pub confidence: f64,
    /// Uncapped sum plus outline tightness; only meaningful for ranking
    pub fit: f64,
}

#[derive(Debug, Clone, Default)]
pub struct RegionConfidenceScorer {
    config: ScoringConfig,
}

impl RegionConfidenceScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Confidence in [0, 1] that `region` outlines a card.
    pub fn score(
        &self,
        sampler: &PixelSampler,
        region: &Region,
        contains_face: bool,
        background_removed: bool,
    ) -> f64 {
        self.score_region(sampler, region, contains_face, background_removed)
            .confidence
    }

    pub fn score_region(
        &self,
        sampler: &PixelSampler,
        region: &Region,
        contains_face: bool,
        background_removed: bool,
    ) -> RegionScore {
        if region.width == 0 || region.height == 0 {
            return RegionScore {
                confidence: 0.0,
                fit: 0.0,
            };
        }

        let mut score = 0.0;

        if contains_face {
            score += if background_removed {
                self.config.face_bonus_background_removed
            } else {
                self.config.face_bonus
            };
        }

        score += self.aspect_score(region.aspect_ratio());
        score += self.size_score(region, sampler.width(), sampler.height());
        score += self.edge_score(sampler, region);
        score += self.corner_score(sampler, region);
        score += self.uniformity_score(sampler, region);
        score += self.margin_score(region, sampler.width(), sampler.height());

        RegionScore {
            confidence: score.clamp(0.0, 1.0),
            fit: score + self.tightness_score(sampler, region),
        }
    }

    pub fn aspect_score(&self, aspect_ratio: f64) -> f64 {
        let deviation = (aspect_ratio - TARGET_ASPECT_RATIO).abs();
        ASPECT_BANDS
            .iter()
            .find(|(limit, _)| deviation <= *limit)
            .map(|(_, share)| share * self.config.aspect_weight)
            .unwrap_or(0.0)
    }

    pub fn size_score(&self, region: &Region, image_width: u32, image_height: u32) -> f64 {
        let image_area = image_width as f64 * image_height as f64;
        if image_area == 0.0 {
            return 0.0;
        }
        let ratio = region.area() as f64 / image_area;
        let distance = (ratio - self.config.optimal_area_ratio).abs();

        let share = if distance <= 0.04 {
            1.0
        } else if distance <= 0.08 {
            0.7
        } else if (ACCEPTABLE_AREA.0..=ACCEPTABLE_AREA.1).contains(&ratio) {
            0.3
        } else {
            0.0
        };
        share * self.config.size_weight
    }

    fn sample_offset(&self, region: &Region) -> u32 {
        let shorter = region.width.min(region.height) as f64;
        ((shorter * self.config.edge_offset_fraction).round() as u32).max(3)
    }

    /// Boundary contrast of the weakest side, so a rectangle that merely
    /// shares one side with a card earns nothing here.
    pub fn edge_score(&self, sampler: &PixelSampler, region: &Region) -> f64 {
        let sides = sampler.side_contrasts(
            region,
            self.config.samples_per_edge,
            self.sample_offset(region),
        );
        (weakest_side(sides) / EDGE_CONTRAST_FULL).min(1.0) as f64 * self.config.edge_weight
    }

    /// Boundary contrast sampled a quarter of the usual offset from each
    /// side. Only rectangles lying close to a real outline keep it.
    pub fn tightness_score(&self, sampler: &PixelSampler, region: &Region) -> f64 {
        let offset = (self.sample_offset(region) / 4).max(2);
        let contrast = sampler.side_contrasts(region, self.config.samples_per_edge, offset);
        let tightness = contrast
            .iter()
            .map(|c| (c / EDGE_CONTRAST_FULL).min(1.0))
            .sum::<f32>()
            / 4.0;
        tightness as f64 * self.config.edge_weight
    }

    /// High mean gradient that is consistent across all four corners.
    pub fn corner_score(&self, sampler: &PixelSampler, region: &Region) -> f64 {
        let gradients = sampler.corner_gradients(region, self.sample_offset(region));
        let mean = gradients.iter().sum::<f32>() / 4.0;
        if mean <= f32::EPSILON {
            return 0.0;
        }
        let variance = gradients.iter().map(|g| (g - mean).powi(2)).sum::<f32>() / 4.0;
        let consistency = (1.0 - variance.sqrt() / mean).clamp(0.0, 1.0);
        let strength = (mean / CORNER_GRADIENT_FULL).min(1.0);
        (strength * consistency) as f64 * self.config.corner_weight
    }

    pub fn uniformity_score(&self, sampler: &PixelSampler, region: &Region) -> f64 {
        let stats = sampler.interior_stats(region, self.config.uniformity_grid, 0.1);
        let flatness = (1.0 - stats.luma_std / UNIFORMITY_STD_ZERO).max(0.0);
        flatness as f64 * self.config.uniformity_weight
    }

    /// Flat bonus when the rectangle keeps clear of the image border.
    pub fn margin_score(&self, region: &Region, image_width: u32, image_height: u32) -> f64 {
        let margin = (region.width.max(region.height) as f64 * 0.05).round() as u32;
        let clear = region.x >= margin
            && region.y >= margin
            && region.right() + margin <= image_width
            && region.bottom() + margin <= image_height;
        if clear { self.config.margin_bonus } else { 0.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn scene(card: Region) -> PixelSampler {
        let mut img = RgbaImage::from_pixel(400, 400, Rgba([215, 215, 210, 255]));
        for y in card.y..card.bottom() {
            for x in card.x..card.right() {
                img.put_pixel(x, y, Rgba([25, 35, 80, 255]));
            }
        }
        PixelSampler::new(&img)
    }

    #[test]
    fn test_aspect_bands_decrease() {
        let scorer = RegionConfidenceScorer::default();
        let mut last = f64::INFINITY;
        for deviation in [0.0, 0.015, 0.04, 0.08, 0.12, 0.3] {
            let s = scorer.aspect_score(TARGET_ASPECT_RATIO + deviation);
            assert!(s <= last);
            last = s;
        }
        assert_eq!(scorer.aspect_score(TARGET_ASPECT_RATIO + 0.3), 0.0);
    }

    #[test]
    fn test_exact_card_scores_high() {
        let card = Region::new(150, 130, 100, 140);
        let sampler = scene(card);
        let scorer = RegionConfidenceScorer::default();
        let score = scorer.score(&sampler, &card, false, false);
        assert!(score >= 0.8, "score was {score}");
    }

    #[test]
    fn test_blank_area_stays_below_geometric_threshold() {
        let sampler = scene(Region::new(0, 0, 10, 14));
        let scorer = RegionConfidenceScorer::default();
        let score = scorer.score(&sampler, &Region::new(150, 130, 100, 140), false, false);
        assert!(score < 0.6, "score was {score}");
    }

    #[test]
    fn test_face_bonus_tiers() {
        let sampler = scene(Region::new(0, 0, 10, 14));
        let scorer = RegionConfidenceScorer::default();
        let region = Region::new(150, 130, 100, 140);
        let plain = scorer.score(&sampler, &region, false, false);
        let face = scorer.score(&sampler, &region, true, false);
        assert!(face > plain);
        assert!(face <= 1.0);
    }

    #[test]
    fn test_rectangle_beside_card_stays_below_geometric_threshold() {
        let sampler = scene(Region::new(150, 130, 100, 140));
        let scorer = RegionConfidenceScorer::default();
        // right side runs along the card's left edge
        let beside = Region::new(40, 130, 110, 154);

        assert!(scorer.edge_score(&sampler, &beside) < 1e-9);
        assert!(scorer.score(&sampler, &beside, false, false) < 0.6);
    }

    #[test]
    fn test_exact_outline_outranks_saturated_inset() {
        let card = Region::new(200, 280, 600, 840);
        let mut img = RgbaImage::from_pixel(1000, 1400, Rgba([215, 215, 210, 255]));
        for y in card.y..card.bottom() {
            for x in card.x..card.right() {
                img.put_pixel(x, y, Rgba([25, 35, 80, 255]));
            }
        }
        let sampler = PixelSampler::new(&img);
        let scorer = RegionConfidenceScorer::default();
        let inset = Region::new(204, 292, 558, 793);

        let exact = scorer.score_region(&sampler, &card, false, false);
        let cropped = scorer.score_region(&sampler, &inset, false, false);
        assert_eq!(exact.confidence, 1.0);
        assert_eq!(cropped.confidence, 1.0);
        assert!(exact.fit > cropped.fit);
    }

    #[test]
    fn test_background_removed_face_bonus_is_higher() {
        let sampler = scene(Region::new(0, 0, 10, 14));
        let scorer = RegionConfidenceScorer::default();
        let region = Region::new(150, 130, 100, 140);

        let face = scorer.score_region(&sampler, &region, true, false);
        let removed = scorer.score_region(&sampler, &region, true, true);
        assert_eq!(face.confidence, 1.0);
        assert_eq!(removed.confidence, 1.0);
        let tiers = scorer.config().face_bonus_background_removed - scorer.config().face_bonus;
        assert!((removed.fit - face.fit - tiers).abs() < 1e-9);
    }

    #[test]
    fn test_score_is_deterministic_and_bounded() {
        let sampler = scene(Region::new(150, 130, 100, 140));
        let scorer = RegionConfidenceScorer::default();
        for region in [
            Region::new(0, 0, 400, 400),
            Region::new(399, 399, 1, 1),
            Region::new(0, 0, 0, 10),
            Region::new(140, 120, 120, 168),
        ] {
            let a = scorer.score(&sampler, &region, true, true);
            let b = scorer.score(&sampler, &region, true, true);
            assert_eq!(a, b);
            assert!((0.0..=1.0).contains(&a));
        }
    }
}
