//! Axis-aligned rectangles in pixel coordinates.

use serde::{Deserialize, Serialize};

/// Width over height of a standard 2.5" x 3.5" trading card.
pub const TARGET_ASPECT_RATIO: f64 = 2.5 / 3.5;

/// Integer rectangle anchored at its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Width over height; zero for degenerate rectangles.
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }

    /// Absolute deviation from the trading-card aspect ratio.
    pub fn aspect_deviation(&self) -> f64 {
        (self.aspect_ratio() - TARGET_ASPECT_RATIO).abs()
    }

    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }

    pub fn intersection_area(&self, other: &Region) -> u64 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());

        if x2 <= x1 || y2 <= y1 {
            return 0;
        }

        (x2 - x1) as u64 * (y2 - y1) as u64
    }

    /// Intersection divided by the smaller of the two areas.
    ///
    /// Unlike IoU this reports 1.0 when one rectangle sits entirely inside
    /// the other, which is what duplicate suppression needs.
    pub fn overlap_ratio(&self, other: &Region) -> f64 {
        let smaller = self.area().min(other.area());
        if smaller == 0 {
            return 0.0;
        }
        self.intersection_area(other) as f64 / smaller as f64
    }

    pub fn contains(&self, other: &Region) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.right() <= width && self.bottom() <= height
    }

    /// Grow by `padding` on every side, clamped to `width` x `height`.
    pub fn padded(&self, padding: u32, width: u32, height: u32) -> Region {
        let x = self.x.saturating_sub(padding);
        let y = self.y.saturating_sub(padding);
        let right = self.right().saturating_add(padding).min(width);
        let bottom = self.bottom().saturating_add(padding).min(height);
        Region::new(
            x.min(right),
            y.min(bottom),
            right.saturating_sub(x),
            bottom.saturating_sub(y),
        )
    }

    /// Map into another coordinate space by a uniform factor, clamped to the
    /// target bounds. Height follows the scaled width so the aspect ratio
    /// survives rounding as closely as integers allow.
    pub fn scaled(&self, factor: f64, width: u32, height: u32) -> Region {
        let x = ((self.x as f64 * factor).round() as u32).min(width);
        let y = ((self.y as f64 * factor).round() as u32).min(height);
        let w = ((self.width as f64 * factor).round() as u32).min(width - x);
        let h_exact = w as f64 / self.aspect_ratio().max(f64::EPSILON);
        let h = (h_exact.round() as u32).min(height - y);
        Region::new(x, y, w, h)
    }
}

/// Face bounding box reported by a face detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub confidence: f64,
}

impl FaceBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32, confidence: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            confidence,
        }
    }

    pub fn region(&self) -> Region {
        Region::new(self.x, self.y, self.width, self.height)
    }

    /// Scale into detection-raster coordinates.
    pub fn scaled(&self, factor: f64) -> FaceBox {
        FaceBox {
            x: (self.x as f64 * factor).round() as u32,
            y: (self.y as f64 * factor).round() as u32,
            width: (self.width as f64 * factor).round() as u32,
            height: (self.height as f64 * factor).round() as u32,
            confidence: self.confidence,
        }
    }
}
