//! Crop, normalize and encode accepted regions

use crate::bbox::CandidateRegion;
use crate::detection::ExtractionConfig;
use crate::error::CardScanError;
use crate::traits::MetadataEnricher;
use crate::utils::ImageUtils;
use crate::{DetectedCard, Region, ScanResult};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::RgbaImage;
use std::time::Instant;
use tracing::{debug, warn};

/// Cuts card images out of a source raster. Never mutates the source.
#[derive(Debug, Clone, Default)]
pub struct CardExtractor {
    config: ExtractionConfig,
}

impl CardExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Crop `region` plus padding, resize to the canonical card size and
    /// encode as JPEG. Identical inputs give identical bytes.
    pub fn extract(&self, image: &RgbaImage, region: &Region, index: usize) -> ScanResult<Vec<u8>> {
        let (width, height) = image.dimensions();
        if !region.fits_within(width, height) {
            return Err(CardScanError::Extraction {
                index,
                reason: format!("region {:?} exceeds {}x{} image", region, width, height),
            });
        }

        let padded = region.padded(self.config.padding, width, height);
        if padded.area() == 0 {
            return Err(CardScanError::Extraction {
                index,
                reason: "empty region".to_string(),
            });
        }

        let crop =
            imageops::crop_imm(image, padded.x, padded.y, padded.width, padded.height).to_image();
        let normalized = imageops::resize(
            &crop,
            self.config.output_width,
            self.config.output_height,
            FilterType::Lanczos3,
        );
        let rgb = ImageUtils::rgba_to_rgb(&normalized);

        let mut blob = Vec::new();
        JpegEncoder::new_with_quality(&mut blob, self.config.jpeg_quality)
            .encode_image(&rgb)
            .map_err(|e| CardScanError::Extraction {
                index,
                reason: e.to_string(),
            })?;

        Ok(blob)
    }

    /// Extract every accepted region and run enrichment on the successes.
    ///
    /// A failing region becomes an `error` card with an empty blob; its
    /// siblings are unaffected.
    pub fn extract_cards(
        &self,
        image: &RgbaImage,
        regions: &[CandidateRegion],
        original_file: &str,
        enricher: &dyn MetadataEnricher,
    ) -> Vec<DetectedCard> {
        regions
            .iter()
            .enumerate()
            .map(|(index, candidate)| {
                let start = Instant::now();
                let strategy = candidate.strategy.as_str();

                match self.extract(image, &candidate.region, index) {
                    Ok(blob) => {
                        let mut card = DetectedCard::detected(
                            original_file,
                            blob,
                            candidate.confidence,
                            candidate.region,
                            strategy,
                        );
                        let metadata = enricher.enrich(&card);
                        if let Err(e) = card.attach_metadata(metadata) {
                            warn!(card = %card.id, error = %e, "discarding card metadata");
                        }
                        debug!(
                            index,
                            strategy,
                            confidence = candidate.confidence,
                            bytes = card.image_blob.len(),
                            "extracted card"
                        );
                        card.with_processing_time(start.elapsed().as_millis() as u64)
                    }
                    Err(e) => {
                        warn!(index, file = original_file, error = %e, "card extraction failed");
                        DetectedCard::failed(
                            original_file,
                            candidate.confidence,
                            candidate.region,
                            strategy,
                        )
                        .with_processing_time(start.elapsed().as_millis() as u64)
                    }
                }
            })
            .collect()
    }
}
