//! Raster decoding and conversion helpers

use crate::error::CardScanError;
use crate::{ScanResult, SourceFile};
use image::{imageops::FilterType, RgbImage, RgbaImage};
use std::borrow::Cow;

/// Image utility functions
pub struct ImageUtils;

impl ImageUtils {
    /// Reject inputs above `max_bytes` before touching their contents.
    pub fn check_size(file: &SourceFile, max_bytes: usize) -> ScanResult<()> {
        if file.len() > max_bytes {
            return Err(CardScanError::InputTooLarge {
                name: file.name.clone(),
                size: file.len(),
                limit: max_bytes,
            });
        }
        Ok(())
    }

    /// Decode any format the `image` crate recognizes into RGBA.
    pub fn decode(file: &SourceFile, max_bytes: usize) -> ScanResult<RgbaImage> {
        Self::check_size(file, max_bytes)?;

        let decoded =
            image::load_from_memory(&file.bytes).map_err(|source| CardScanError::ImageDecode {
                name: file.name.clone(),
                source,
            })?;

        Ok(decoded.to_rgba8())
    }

    /// Shrink an image so its longest side is at most `max_dimension`.
    ///
    /// Returns the raster to search and the factor mapping source
    /// coordinates into it (1.0 when no resize was needed).
    pub fn detection_raster(image: &RgbaImage, max_dimension: u32) -> (Cow<'_, RgbaImage>, f64) {
        let (width, height) = image.dimensions();
        let longest = width.max(height);
        if max_dimension == 0 || longest <= max_dimension {
            return (Cow::Borrowed(image), 1.0);
        }

        let scale = max_dimension as f64 / longest as f64;
        let target_width = ((width as f64 * scale).round() as u32).max(1);
        let target_height = ((height as f64 * scale).round() as u32).max(1);
        let resized =
            image::imageops::resize(image, target_width, target_height, FilterType::Triangle);

        (Cow::Owned(resized), scale)
    }

    /// Drop the alpha channel, compositing over black.
    pub fn rgba_to_rgb(rgba_image: &RgbaImage) -> RgbImage {
        let (width, height) = rgba_image.dimensions();
        let mut rgb_image = RgbImage::new(width, height);

        for (x, y, pixel) in rgba_image.enumerate_pixels() {
            let alpha = pixel[3] as u16;
            let channel = |c: u8| ((c as u16 * alpha + 127) / 255) as u8;
            rgb_image.put_pixel(
                x,
                y,
                image::Rgb([channel(pixel[0]), channel(pixel[1]), channel(pixel[2])]),
            );
        }

        rgb_image
    }

    /// Rec. 601 luma of an RGBA pixel, alpha-weighted.
    #[inline]
    pub fn luma(pixel: &image::Rgba<u8>) -> f32 {
        let alpha = pixel[3] as f32 / 255.0;
        (0.299 * pixel[0] as f32 + 0.587 * pixel[1] as f32 + 0.114 * pixel[2] as f32) * alpha
    }
}
