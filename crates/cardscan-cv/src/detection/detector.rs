//! Multi-strategy card detector

use super::config::DetectionConfig;
use super::strategies::{ContourStrategy, EdgeStrategy, FaceAnchoredStrategy, GeometricStrategy};
use super::{CancellationFlag, DetectionContext, RectSweep, StrategyOutput};
use crate::bbox::CandidateRegion;
use crate::sampler::{EdgeMap, PixelSampler};
use crate::scoring::RegionConfidenceScorer;
use crate::traits::CandidateStrategy;
use crate::utils::{ImageUtils, OverlapResolver};
use crate::{DetectionStats, FaceBox, Result, ScanResult};
use anyhow::bail;
use image::RgbaImage;
use std::time::Instant;
use tracing::{debug, warn};

/// Rasters and collaborator output for one detection pass.
#[derive(Debug, Clone, Copy)]
pub struct DetectionInput<'a> {
    /// Decoded source image; accepted regions are expressed in its coordinates
    pub image: &'a RgbaImage,
    /// Background-suppressed copy of `image`, searched instead when present
    pub background_removed: Option<&'a RgbaImage>,
    /// Faces in source coordinates
    pub faces: &'a [FaceBox],
}

impl<'a> DetectionInput<'a> {
    pub fn new(image: &'a RgbaImage) -> Self {
        Self {
            image,
            background_removed: None,
            faces: &[],
        }
    }

    pub fn with_faces(mut self, faces: &'a [FaceBox]) -> Self {
        self.faces = faces;
        self
    }

    pub fn with_background_removed(mut self, image: Option<&'a RgbaImage>) -> Self {
        self.background_removed = image;
        self
    }
}

/// Accepted regions in source coordinates plus pass statistics.
#[derive(Debug, Clone)]
pub struct DetectionOutcome {
    pub regions: Vec<CandidateRegion>,
    pub stats: DetectionStats,
}

/// Runs the configured strategies over one image and resolves overlaps
pub struct CardDetector {
    config: DetectionConfig,
    scorer: RegionConfidenceScorer,
    resolver: OverlapResolver,
    strategies: Vec<Box<dyn CandidateStrategy>>,
}

impl CardDetector {
    pub fn new(config: DetectionConfig) -> ScanResult<Self> {
        config.validate()?;

        let mut strategies: Vec<Box<dyn CandidateStrategy>> = Vec::new();
        if config.geometric.enabled {
            strategies.push(Box::new(GeometricStrategy));
        }
        if config.face.enabled {
            strategies.push(Box::new(FaceAnchoredStrategy));
        }
        if config.edge.enabled {
            strategies.push(Box::new(EdgeStrategy));
        }
        if config.contour.enabled {
            strategies.push(Box::new(ContourStrategy));
        }

        Ok(Self {
            scorer: RegionConfidenceScorer::new(config.scoring.clone()),
            resolver: OverlapResolver::from_config(&config),
            strategies,
            config,
        })
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn scorer(&self) -> &RegionConfidenceScorer {
        &self.scorer
    }

    /// Detect card regions. Fails only when `cancel` is raised mid-pass.
    pub fn detect(
        &self,
        input: DetectionInput<'_>,
        cancel: &CancellationFlag,
    ) -> Result<DetectionOutcome> {
        let start_time = Instant::now();
        let (width, height) = input.image.dimensions();

        let (surface, background_removed) = match input.background_removed {
            Some(removed) if removed.dimensions() == input.image.dimensions() => (removed, true),
            Some(removed) => {
                warn!(
                    expected = ?input.image.dimensions(),
                    got = ?removed.dimensions(),
                    "background-removed image has different dimensions, searching original"
                );
                (input.image, false)
            }
            None => (input.image, false),
        };

        let (raster, scale) =
            ImageUtils::detection_raster(surface, self.config.max_detection_dimension);
        let sampler = PixelSampler::new(&raster);
        let sweep = RectSweep::new(sampler.width(), sampler.height(), &self.config);
        let edges = self
            .config
            .needs_edge_map()
            .then(|| EdgeMap::from_sampler(&sampler).dilated(sweep.step() / 2));
        let faces: Vec<FaceBox> = input.faces.iter().map(|f| f.scaled(scale)).collect();

        debug!(
            width,
            height,
            scale,
            sizes = sweep.sizes().len(),
            positions = sweep.len(),
            faces = faces.len(),
            background_removed,
            "searching for card regions"
        );

        let ctx = DetectionContext {
            sampler: &sampler,
            edges: edges.as_ref(),
            faces: &faces,
            background_removed,
            scorer: &self.scorer,
            config: &self.config,
            sweep: &sweep,
            cancel,
        };

        let outputs = self.run_strategies(&ctx);
        if cancel.is_cancelled() {
            bail!("detection cancelled after {}ms", start_time.elapsed().as_millis());
        }

        let mut stats = DetectionStats {
            faces: faces.len(),
            background_removed,
            ..Default::default()
        };

        let inverse = 1.0 / scale;
        let mut lists = Vec::with_capacity(outputs.len());
        for output in outputs {
            stats
                .candidates_per_strategy
                .insert(output.strategy.as_str().to_string(), output.candidates.len());
            if output.exhausted {
                stats.exhausted_budgets.push(output.strategy.as_str().to_string());
            }

            let mapped: Vec<CandidateRegion> = output
                .candidates
                .into_iter()
                .filter_map(|candidate| self.to_source_space(candidate, inverse, width, height))
                .collect();
            lists.push(mapped);
        }

        let regions = self.resolver.resolve_all(lists);
        stats.accepted = regions.len();
        stats.elapsed_ms = start_time.elapsed().as_millis() as u64;

        debug!(
            accepted = stats.accepted,
            candidates = ?stats.candidates_per_strategy,
            elapsed_ms = stats.elapsed_ms,
            "detection pass finished"
        );

        Ok(DetectionOutcome { regions, stats })
    }

    /// Map a raster-space candidate back to source space, dropping it when
    /// rounding pushed a sweep rectangle out of the aspect tolerance.
    fn to_source_space(
        &self,
        mut candidate: CandidateRegion,
        inverse: f64,
        width: u32,
        height: u32,
    ) -> Option<CandidateRegion> {
        if inverse != 1.0 {
            candidate.region = candidate.region.scaled(inverse, width, height);
        }
        if candidate.region.area() == 0 {
            return None;
        }
        if candidate.strategy.is_aspect_constrained()
            && candidate.region.aspect_deviation() > self.config.aspect_tolerance
        {
            return None;
        }
        Some(candidate)
    }

    fn run_strategies(&self, ctx: &DetectionContext<'_>) -> Vec<StrategyOutput> {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            self.strategies
                .par_iter()
                .map(|strategy| strategy.generate(ctx))
                .collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            self.strategies
                .iter()
                .map(|strategy| strategy.generate(ctx))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn scene(cards: &[(u32, u32, u32, u32)]) -> RgbaImage {
        let mut img = RgbaImage::from_pixel(480, 360, Rgba([225, 222, 215, 255]));
        for &(x0, y0, w, h) in cards {
            for y in y0..y0 + h {
                for x in x0..x0 + w {
                    img.put_pixel(x, y, Rgba([30, 45, 110, 255]));
                }
            }
        }
        img
    }

    #[test]
    fn test_detector_creation() -> ScanResult<()> {
        let _detector = CardDetector::new(DetectionConfig::default())?;
        let _basic = CardDetector::new(DetectionConfig::basic())?;
        Ok(())
    }

    #[test]
    fn test_two_separate_cards() -> Result<()> {
        let img = scene(&[(60, 80, 100, 140), (300, 100, 100, 140)]);
        let detector = CardDetector::new(DetectionConfig::default())?;
        let outcome = detector.detect(DetectionInput::new(&img), &CancellationFlag::new())?;

        assert!(outcome.regions.len() >= 2);
        let near = |cx: f64, cy: f64| {
            outcome.regions.iter().any(|c| {
                let (x, y) = c.region.center();
                (x - cx).abs() < 20.0 && (y - cy).abs() < 20.0
            })
        };
        assert!(near(110.0, 150.0));
        assert!(near(350.0, 170.0));
        Ok(())
    }

    #[test]
    fn test_blank_image_with_geometric_only() -> Result<()> {
        let img = scene(&[]);
        let detector = CardDetector::new(DetectionConfig::basic())?;
        let outcome = detector.detect(DetectionInput::new(&img), &CancellationFlag::new())?;
        assert!(outcome.regions.is_empty());
        Ok(())
    }

    #[test]
    fn test_cancelled_pass_fails() {
        let img = scene(&[(60, 80, 100, 140)]);
        let detector = CardDetector::new(DetectionConfig::basic()).unwrap();
        let cancel = CancellationFlag::new();
        cancel.cancel();
        assert!(detector.detect(DetectionInput::new(&img), &cancel).is_err());
    }

    #[test]
    fn test_downscaled_regions_map_back() -> Result<()> {
        let img = scene(&[(60, 80, 100, 140)]);
        let config = DetectionConfig {
            max_detection_dimension: 240,
            ..DetectionConfig::basic()
        };
        let detector = CardDetector::new(config.clone())?;
        let outcome = detector.detect(DetectionInput::new(&img), &CancellationFlag::new())?;

        assert!(!outcome.regions.is_empty());
        for candidate in &outcome.regions {
            assert!(candidate.region.fits_within(480, 360));
            assert!(candidate.region.aspect_deviation() <= config.aspect_tolerance);
        }
        let best = &outcome.regions[0];
        let (x, y) = best.region.center();
        assert!((x - 110.0).abs() < 20.0 && (y - 150.0).abs() < 20.0);
        Ok(())
    }
}
