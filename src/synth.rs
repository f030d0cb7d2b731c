//! Synthetic table-top photos with known card positions

use cardscan_core::{Region, TARGET_ASPECT_RATIO};
use image::{Rgba, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const PLACEMENT_ATTEMPTS: usize = 200;
const CARD_GAP: u32 = 24;

pub struct Scene {
    pub image: RgbaImage,
    pub cards: Vec<Region>,
}

/// Lays out non-overlapping dark cards on a light, noisy background.
pub struct SceneBuilder {
    width: u32,
    height: u32,
    cards: usize,
    noise: i16,
    rng: StdRng,
}

impl SceneBuilder {
    pub fn new(width: u32, height: u32, seed: u64) -> Self {
        Self {
            width,
            height,
            cards: 1,
            noise: 6,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn with_cards(mut self, cards: usize) -> Self {
        self.cards = cards;
        self
    }

    pub fn with_noise(mut self, amplitude: i16) -> Self {
        self.noise = amplitude.max(0);
        self
    }

    pub fn build(mut self) -> Scene {
        let base: u8 = self.rng.gen_range(205..=235);
        let mut image = RgbaImage::new(self.width, self.height);
        for pixel in image.pixels_mut() {
            let v = self.jitter(base);
            *pixel = Rgba([v, v, v.saturating_sub(6), 255]);
        }

        let mut cards: Vec<Region> = Vec::with_capacity(self.cards);
        for _ in 0..PLACEMENT_ATTEMPTS {
            if cards.len() == self.cards {
                break;
            }
            let Some(region) = self.random_card() else {
                break;
            };
            let padded = region.padded(CARD_GAP, self.width, self.height);
            if cards.iter().any(|c| c.intersection_area(&padded) > 0) {
                continue;
            }

            let fill = [
                self.rng.gen_range(20..=110),
                self.rng.gen_range(20..=110),
                self.rng.gen_range(40..=150),
            ];
            for y in region.y..region.bottom() {
                for x in region.x..region.right() {
                    let color = fill.map(|c| self.jitter(c));
                    image.put_pixel(x, y, Rgba([color[0], color[1], color[2], 255]));
                }
            }
            cards.push(region);
        }

        Scene { image, cards }
    }

    fn random_card(&mut self) -> Option<Region> {
        let shorter = self.width.min(self.height) as f64;
        let width = (shorter * self.rng.gen_range(0.18..0.28)).round() as u32;
        let height = (width as f64 / TARGET_ASPECT_RATIO).round() as u32;
        if width == 0 || width >= self.width || height >= self.height {
            return None;
        }
        let x = self.rng.gen_range(0..=self.width - width);
        let y = self.rng.gen_range(0..=self.height - height);
        Some(Region::new(x, y, width, height))
    }

    fn jitter(&mut self, value: u8) -> u8 {
        if self.noise == 0 {
            return value;
        }
        let offset = self.rng.gen_range(-self.noise..=self.noise);
        (value as i16 + offset).clamp(0, 255) as u8
    }
}
