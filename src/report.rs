//! JSON report and card image output for the `detect` command

use anyhow::{Context, Result};
use cardscan_core::{
    AutoExtractedData, CardStatus, DetectedCard, DetectionStats, ProcessingResult,
    ProcessingStatus, Region,
};
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct ScanReport {
    pub session: Option<ProcessingStatus>,
    pub images: Vec<ImageReport>,
}

impl ScanReport {
    pub fn total_cards(&self) -> usize {
        self.images.iter().map(|i| i.cards.len()).sum()
    }
}

#[derive(Debug, Serialize)]
pub struct ImageReport {
    pub original: String,
    pub processing_time_ms: u64,
    pub used_fallback: bool,
    pub stats: DetectionStats,
    pub cards: Vec<CardReport>,
}

#[derive(Debug, Serialize)]
pub struct CardReport {
    pub id: String,
    /// Extracted JPEG relative to the output directory
    pub file: Option<String>,
    pub confidence: f64,
    pub bounds: Region,
    pub strategy: String,
    pub status: CardStatus,
    pub metadata: Option<AutoExtractedData>,
}

/// Name of the JPEG written for card `index` of `original`.
pub fn card_file_name(original: &str, index: usize) -> String {
    let stem = Path::new(original)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| original.to_string());
    format!("{}_card{:02}.jpg", stem, index + 1)
}

/// Write every extracted card plus `report.json` into `out`.
pub fn write_report(
    out: &Path,
    results: &[ProcessingResult],
    session: Option<ProcessingStatus>,
) -> Result<ScanReport> {
    fs::create_dir_all(out).with_context(|| format!("Failed to create {}", out.display()))?;

    let mut images = Vec::with_capacity(results.len());
    for result in results {
        let mut cards = Vec::with_capacity(result.cards.len());
        for (index, card) in result.cards.iter().enumerate() {
            let file = write_card(out, &result.original, index, card)?;
            cards.push(CardReport {
                id: card.id.to_string(),
                file,
                confidence: card.confidence,
                bounds: card.bounds,
                strategy: card.strategy.clone(),
                status: card.status,
                metadata: card.metadata.clone(),
            });
        }
        images.push(ImageReport {
            original: result.original.clone(),
            processing_time_ms: result.processing_time_ms,
            used_fallback: result.stats.used_fallback,
            stats: result.stats.clone(),
            cards,
        });
    }

    let report = ScanReport { session, images };
    let json = serde_json::to_string_pretty(&report)?;
    let report_path = out.join("report.json");
    fs::write(&report_path, json)
        .with_context(|| format!("Failed to write {}", report_path.display()))?;

    Ok(report)
}

fn write_card(
    out: &Path,
    original: &str,
    index: usize,
    card: &DetectedCard,
) -> Result<Option<String>> {
    if card.image_blob.is_empty() {
        return Ok(None);
    }
    let name = card_file_name(original, index);
    let path = out.join(&name);
    fs::write(&path, &card.image_blob)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(Some(name))
}
