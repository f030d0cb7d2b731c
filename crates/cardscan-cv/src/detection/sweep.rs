//! Aspect-constrained rectangle enumeration

use super::DetectionConfig;
use crate::{Region, TARGET_ASPECT_RATIO};

/// Grid of card-shaped rectangles over an image.
///
/// Sizes are enumerated smallest first and pre-filtered by aspect ratio, so
/// strategies never spend their budget on rectangles of the wrong shape.
#[derive(Debug, Clone)]
pub struct RectSweep {
    width: u32,
    height: u32,
    step: u32,
    sizes: Vec<(u32, u32)>,
}

impl RectSweep {
    pub fn new(width: u32, height: u32, config: &DetectionConfig) -> Self {
        let shorter = width.min(height);
        let min_w =
            ((shorter as f64 * config.min_card_fraction).round() as u32).max(config.min_card_px);
        let max_w = ((width as f64 * config.max_card_fraction).round() as u32).min(width);
        let step = (min_w / config.grid_divisions.max(1)).max(4);
        let tolerance = config.aspect_tolerance;
        let min_h = ((min_w as f64 / (TARGET_ASPECT_RATIO + tolerance)).floor() as u32).max(1);

        let mut sizes = Vec::new();
        if min_w <= max_w {
            for w in (min_w..=max_w).step_by(step as usize) {
                for h in (min_h..=height).step_by(step as usize) {
                    let ratio = w as f64 / h as f64;
                    if (ratio - TARGET_ASPECT_RATIO).abs() <= tolerance {
                        sizes.push((w, h));
                    }
                }
            }
        }

        Self {
            width,
            height,
            step,
            sizes,
        }
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    pub fn sizes(&self) -> &[(u32, u32)] {
        &self.sizes
    }

    /// Every rectangle of every size at every grid position.
    pub fn regions(&self) -> impl Iterator<Item = Region> + '_ {
        let step = self.step as usize;
        self.sizes.iter().flat_map(move |&(w, h)| {
            (0..=self.height - h).step_by(step).flat_map(move |y| {
                (0..=self.width - w)
                    .step_by(step)
                    .map(move |x| Region::new(x, y, w, h))
            })
        })
    }

    pub fn len(&self) -> usize {
        let step = self.step as usize;
        self.sizes
            .iter()
            .map(|&(w, h)| {
                ((self.width - w) as usize / step + 1) * ((self.height - h) as usize / step + 1)
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_region_respects_tolerance_and_bounds() {
        let config = DetectionConfig::default();
        let sweep = RectSweep::new(300, 420, &config);
        assert!(!sweep.is_empty());

        let mut count = 0;
        for region in sweep.regions() {
            assert!(region.aspect_deviation() <= config.aspect_tolerance);
            assert!(region.fits_within(300, 420));
            count += 1;
        }
        assert_eq!(count, sweep.len());
    }

    #[test]
    fn test_tiny_image_yields_nothing() {
        let sweep = RectSweep::new(20, 20, &DetectionConfig::default());
        assert!(sweep.is_empty());
        assert_eq!(sweep.regions().count(), 0);
    }
}
