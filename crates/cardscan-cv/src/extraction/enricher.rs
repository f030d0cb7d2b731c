//! Best-effort card metadata

use crate::traits::MetadataEnricher;
use crate::{AutoExtractedData, DetectedCard, Guess};

/// Stand-in enricher until text recognition is wired in.
///
/// Emits low-confidence placeholders and a rough grade estimate derived
/// from how cleanly the card outline was detected.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderEnricher;

impl PlaceholderEnricher {
    fn grade_estimate(confidence: f64) -> &'static str {
        if confidence >= 0.9 {
            "Near Mint"
        } else if confidence >= 0.75 {
            "Excellent"
        } else if confidence >= 0.6 {
            "Very Good"
        } else {
            "Good"
        }
    }
}

impl MetadataEnricher for PlaceholderEnricher {
    fn enrich(&self, card: &DetectedCard) -> AutoExtractedData {
        if card.image_blob.is_empty() {
            return AutoExtractedData::default();
        }

        AutoExtractedData {
            player_name: Some(Guess::new("Unknown Player".to_string(), 0.05)),
            grade_estimate: Some(Guess::new(
                Self::grade_estimate(card.confidence).to_string(),
                0.2,
            )),
            ..Default::default()
        }
    }
}
