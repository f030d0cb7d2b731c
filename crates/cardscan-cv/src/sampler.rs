//! Pixel-level sampling primitives shared by every scoring routine

use crate::utils::ImageUtils;
use crate::Region;
use image::RgbaImage;

type Kernel3 = [[f32; 3]; 3];

const SOBEL_KERNEL_X: Kernel3 = [[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]];
const SOBEL_KERNEL_Y: Kernel3 = [[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]];

/// Largest Sobel response for a full black-to-white step.
const SOBEL_MAX: f32 = 4.0 * 255.0;

/// Brightness and colour statistics over a stratified interior grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InteriorStats {
    pub mean_luma: f32,
    pub luma_std: f32,
    /// Mean of the per-channel standard deviations
    pub color_std: f32,
}

/// Read-only view of a raster as luma and premultiplied RGB planes.
#[derive(Debug, Clone)]
pub struct PixelSampler {
    width: u32,
    height: u32,
    luma: Vec<f32>,
    rgb: Vec<[f32; 3]>,
}

impl PixelSampler {
    pub fn new(image: &RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        let mut luma = Vec::with_capacity((width * height) as usize);
        let mut rgb = Vec::with_capacity((width * height) as usize);

        for pixel in image.pixels() {
            let alpha = pixel[3] as f32 / 255.0;
            luma.push(ImageUtils::luma(pixel));
            rgb.push([
                pixel[0] as f32 * alpha,
                pixel[1] as f32 * alpha,
                pixel[2] as f32 * alpha,
            ]);
        }

        Self {
            width,
            height,
            luma,
            rgb,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bounds(&self) -> Region {
        Region::new(0, 0, self.width, self.height)
    }

    #[inline]
    fn index(&self, x: i64, y: i64) -> usize {
        let cx = x.clamp(0, self.width as i64 - 1) as usize;
        let cy = y.clamp(0, self.height as i64 - 1) as usize;
        cy * self.width as usize + cx
    }

    /// Luma in [0, 255]; coordinates outside the raster clamp to the border.
    #[inline]
    pub fn brightness(&self, x: i64, y: i64) -> f32 {
        if self.luma.is_empty() {
            return 0.0;
        }
        self.luma[self.index(x, y)]
    }

    #[inline]
    pub fn color(&self, x: i64, y: i64) -> [f32; 3] {
        if self.rgb.is_empty() {
            return [0.0; 3];
        }
        self.rgb[self.index(x, y)]
    }

    /// Mean absolute brightness difference between points `offset` pixels
    /// inside and outside each side of `region`, `per_edge` samples per
    /// side, ordered top, bottom, left, right.
    pub fn side_contrasts(&self, region: &Region, per_edge: u32, offset: u32) -> [f32; 4] {
        let per_edge = per_edge.max(1);
        let offset = offset as i64;
        let (x0, y0) = (region.x as i64, region.y as i64);
        let (x1, y1) = (region.right() as i64 - 1, region.bottom() as i64 - 1);

        let mut sides = [0.0f32; 4];
        for i in 0..per_edge {
            let t = (i as f64 + 0.5) / per_edge as f64;
            let sx = x0 + (t * region.width as f64) as i64;
            let sy = y0 + (t * region.height as f64) as i64;

            sides[0] += (self.brightness(sx, y0 + offset) - self.brightness(sx, y0 - offset)).abs();
            sides[1] += (self.brightness(sx, y1 - offset) - self.brightness(sx, y1 + offset)).abs();
            sides[2] += (self.brightness(x0 + offset, sy) - self.brightness(x0 - offset, sy)).abs();
            sides[3] += (self.brightness(x1 - offset, sy) - self.brightness(x1 + offset, sy)).abs();
        }

        sides.map(|total| total / per_edge as f32)
    }

    /// Mean absolute brightness change from each corner towards the four
    /// diagonal neighbours `distance` pixels away, one value per corner
    /// (top-left, top-right, bottom-left, bottom-right).
    pub fn corner_gradients(&self, region: &Region, distance: u32) -> [f32; 4] {
        let d = distance.max(1) as i64;
        let corners = [
            (region.x as i64, region.y as i64),
            (region.right() as i64 - 1, region.y as i64),
            (region.x as i64, region.bottom() as i64 - 1),
            (region.right() as i64 - 1, region.bottom() as i64 - 1),
        ];

        corners.map(|(cx, cy)| {
            let center = self.brightness(cx, cy);
            let diagonals = [(-d, -d), (d, -d), (-d, d), (d, d)];
            diagonals
                .iter()
                .map(|(dx, dy)| (self.brightness(cx + dx, cy + dy) - center).abs())
                .sum::<f32>()
                / 4.0
        })
    }

    /// Statistics over a `grid` x `grid` lattice of points inside `region`,
    /// leaving an `inset` fraction of the size free on each side.
    pub fn interior_stats(&self, region: &Region, grid: u32, inset: f64) -> InteriorStats {
        let grid = grid.max(2);
        let inset = inset.clamp(0.0, 0.45);
        let span_w = region.width as f64 * (1.0 - 2.0 * inset);
        let span_h = region.height as f64 * (1.0 - 2.0 * inset);
        let start_x = region.x as f64 + region.width as f64 * inset;
        let start_y = region.y as f64 + region.height as f64 * inset;

        let n = (grid * grid) as f32;
        let mut luma_sum = 0.0;
        let mut luma_sq = 0.0;
        let mut rgb_sum = [0.0f32; 3];
        let mut rgb_sq = [0.0f32; 3];

        for gy in 0..grid {
            for gx in 0..grid {
                let px = start_x + span_w * (gx as f64 + 0.5) / grid as f64;
                let py = start_y + span_h * (gy as f64 + 0.5) / grid as f64;
                let (px, py) = (px as i64, py as i64);

                let l = self.brightness(px, py);
                luma_sum += l;
                luma_sq += l * l;

                let c = self.color(px, py);
                for ch in 0..3 {
                    rgb_sum[ch] += c[ch];
                    rgb_sq[ch] += c[ch] * c[ch];
                }
            }
        }

        let std = |sum: f32, sq: f32| ((sq / n) - (sum / n).powi(2)).max(0.0).sqrt();
        let color_std = (0..3).map(|ch| std(rgb_sum[ch], rgb_sq[ch])).sum::<f32>() / 3.0;

        InteriorStats {
            mean_luma: luma_sum / n,
            luma_std: std(luma_sum, luma_sq),
            color_std,
        }
    }
}

/// Per-pixel Sobel gradient magnitude normalized to [0, 1].
#[derive(Debug, Clone)]
pub struct EdgeMap {
    width: u32,
    height: u32,
    magnitude: Vec<f32>,
}

impl EdgeMap {
    pub fn from_sampler(sampler: &PixelSampler) -> Self {
        let (w, h) = (sampler.width() as i64, sampler.height() as i64);
        let mut magnitude = Vec::with_capacity((w * h) as usize);

        for y in 0..h {
            for x in 0..w {
                let mut sum_x = 0.0;
                let mut sum_y = 0.0;
                for (ky, dy) in (-1..=1).enumerate() {
                    for (kx, dx) in (-1..=1).enumerate() {
                        let sample = sampler.brightness(x + dx, y + dy);
                        sum_x += sample * SOBEL_KERNEL_X[ky][kx];
                        sum_y += sample * SOBEL_KERNEL_Y[ky][kx];
                    }
                }
                let mag = (sum_x * sum_x + sum_y * sum_y).sqrt() / SOBEL_MAX;
                magnitude.push(mag.min(1.0));
            }
        }

        Self {
            width: sampler.width(),
            height: sampler.height(),
            magnitude,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn get(&self, x: i64, y: i64) -> f32 {
        if self.magnitude.is_empty() {
            return 0.0;
        }
        let cx = x.clamp(0, self.width as i64 - 1) as usize;
        let cy = y.clamp(0, self.height as i64 - 1) as usize;
        self.magnitude[cy * self.width as usize + cx]
    }

    /// Grey-level dilation with a square window of the given radius, so a
    /// rectangle within `radius` pixels of an edge still lands on it.
    pub fn dilated(&self, radius: u32) -> EdgeMap {
        if radius == 0 || self.magnitude.is_empty() {
            return self.clone();
        }
        let (w, h) = (self.width as usize, self.height as usize);
        let r = radius as usize;

        let mut horizontal = vec![0.0f32; w * h];
        for y in 0..h {
            let row = &self.magnitude[y * w..(y + 1) * w];
            for x in 0..w {
                let lo = x.saturating_sub(r);
                let hi = (x + r).min(w - 1);
                horizontal[y * w + x] = row[lo..=hi].iter().copied().fold(0.0, f32::max);
            }
        }

        let mut magnitude = vec![0.0f32; w * h];
        for x in 0..w {
            for y in 0..h {
                let lo = y.saturating_sub(r);
                let hi = (y + r).min(h - 1);
                magnitude[y * w + x] = (lo..=hi)
                    .map(|yy| horizontal[yy * w + x])
                    .fold(0.0, f32::max);
            }
        }

        EdgeMap {
            width: self.width,
            height: self.height,
            magnitude,
        }
    }

    /// `per_edge` samples along each side of the outline, ordered top,
    /// bottom, left, right.
    fn side_samples(&self, region: &Region, per_edge: u32) -> [Vec<f32>; 4] {
        let per_edge = per_edge.max(1);
        let (x0, y0) = (region.x as i64, region.y as i64);
        let (x1, y1) = (region.right() as i64 - 1, region.bottom() as i64 - 1);

        let mut sides: [Vec<f32>; 4] = Default::default();
        for i in 0..per_edge {
            let t = (i as f64 + 0.5) / per_edge as f64;
            let sx = x0 + (t * region.width as f64) as i64;
            let sy = y0 + (t * region.height as f64) as i64;
            sides[0].push(self.get(sx, y0));
            sides[1].push(self.get(sx, y1));
            sides[2].push(self.get(x0, sy));
            sides[3].push(self.get(x1, sy));
        }
        sides
    }

    /// Mean edge magnitude along each side of the outline.
    pub fn side_strengths(&self, region: &Region, per_edge: u32) -> [f32; 4] {
        self.side_samples(region, per_edge)
            .map(|side| side.iter().sum::<f32>() / side.len() as f32)
    }

    /// Fraction of samples on each side whose magnitude reaches
    /// `pixel_threshold`.
    pub fn side_densities(&self, region: &Region, per_edge: u32, pixel_threshold: f32) -> [f32; 4] {
        self.side_samples(region, per_edge).map(|side| {
            let hits = side.iter().filter(|&&v| v >= pixel_threshold).count();
            hits as f32 / side.len() as f32
        })
    }
}

/// Smallest of four per-side measurements.
pub fn weakest_side(sides: [f32; 4]) -> f32 {
    sides.into_iter().fold(f32::INFINITY, f32::min)
}
