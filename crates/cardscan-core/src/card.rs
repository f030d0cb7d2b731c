//! Detected cards and their best-effort metadata

use crate::geometry::Region;
use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle of a detected card.
///
/// `Detected -> Processing -> Enhanced`, with `Error` reachable from either
/// non-terminal state. `Enhanced` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardStatus {
    Detected,
    Processing,
    Enhanced,
    Error,
}

impl CardStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CardStatus::Enhanced | CardStatus::Error)
    }

    pub fn can_transition_to(&self, next: CardStatus) -> bool {
        use CardStatus::*;
        matches!(
            (self, next),
            (Detected, Processing)
                | (Detected, Error)
                | (Processing, Enhanced)
                | (Processing, Error)
        )
    }
}

impl fmt::Display for CardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CardStatus::Detected => "detected",
            CardStatus::Processing => "processing",
            CardStatus::Enhanced => "enhanced",
            CardStatus::Error => "error",
        };
        f.write_str(label)
    }
}

/// A guessed value together with how much it should be trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guess<T> {
    pub value: T,
    pub confidence: f64,
}

impl<T> Guess<T> {
    pub fn new(value: T, confidence: f64) -> Self {
        Self {
            value,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Structured metadata read off a card. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutoExtractedData {
    pub player_name: Option<Guess<String>>,
    pub team: Option<Guess<String>>,
    pub year: Option<Guess<u16>>,
    pub set_name: Option<Guess<String>>,
    pub card_number: Option<Guess<String>>,
    pub sport: Option<Guess<String>>,
    pub grade_estimate: Option<Guess<String>>,
}

impl AutoExtractedData {
    pub fn is_empty(&self) -> bool {
        self.player_name.is_none()
            && self.team.is_none()
            && self.year.is_none()
            && self.set_name.is_none()
            && self.card_number.is_none()
            && self.sport.is_none()
            && self.grade_estimate.is_none()
    }
}

/// One card cut out of a source photo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedCard {
    pub id: Uuid,
    pub original_file: String,
    /// Encoded JPEG. Empty when extraction failed.
    #[serde(skip)]
    pub image_blob: Vec<u8>,
    pub confidence: f64,
    pub bounds: Region,
    pub metadata: Option<AutoExtractedData>,
    pub status: CardStatus,
    pub processing_time_ms: Option<u64>,
    /// Name of the strategy that proposed the region.
    pub strategy: String,
}

impl DetectedCard {
    pub fn detected(
        original_file: impl Into<String>,
        image_blob: Vec<u8>,
        confidence: f64,
        bounds: Region,
        strategy: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            original_file: original_file.into(),
            image_blob,
            confidence,
            bounds,
            metadata: None,
            status: CardStatus::Detected,
            processing_time_ms: None,
            strategy: strategy.into(),
        }
    }

    /// A card whose region was accepted but could not be extracted.
    pub fn failed(
        original_file: impl Into<String>,
        confidence: f64,
        bounds: Region,
        strategy: impl Into<String>,
    ) -> Self {
        let mut card = Self::detected(original_file, Vec::new(), confidence, bounds, strategy);
        card.status = CardStatus::Error;
        card
    }

    pub fn with_processing_time(mut self, ms: u64) -> Self {
        self.processing_time_ms = Some(ms);
        self
    }

    pub fn advance(&mut self, next: CardStatus) -> anyhow::Result<()> {
        if !self.status.can_transition_to(next) {
            bail!(
                "card {} cannot move from {} to {}",
                self.id,
                self.status,
                next
            );
        }
        self.status = next;
        Ok(())
    }

    /// Attach enrichment output. Empty metadata leaves the card `Detected`.
    pub fn attach_metadata(&mut self, data: AutoExtractedData) -> anyhow::Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.advance(CardStatus::Processing)?;
        self.metadata = Some(data);
        self.advance(CardStatus::Enhanced)
    }

    pub fn is_error(&self) -> bool {
        self.status == CardStatus::Error
    }
}
