//! Upload sessions and per-image processing results

use crate::card::{CardStatus, DetectedCard};
use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// `Uploading -> Processing -> Completed | Error`, forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Uploading,
    Processing,
    Completed,
    Error,
}

impl SessionStatus {
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Uploading, Processing) | (Processing, Completed) | (Processing, Error)
        )
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Error)
    }
}

/// A batch of images submitted together.
///
/// Card counters always satisfy `processed_cards + failed_cards <= total_cards`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSession {
    pub id: SessionId,
    /// Unix epoch milliseconds
    pub start_time: u64,
    pub files: Vec<String>,
    pub processed_files: usize,
    pub failed_files: usize,
    pub total_cards: usize,
    pub processed_cards: usize,
    pub failed_cards: usize,
    pub status: SessionStatus,
}

impl UploadSession {
    pub fn new(files: Vec<String>) -> Self {
        Self {
            id: SessionId::new(),
            start_time: now_millis(),
            files,
            processed_files: 0,
            failed_files: 0,
            total_cards: 0,
            processed_cards: 0,
            failed_cards: 0,
            status: SessionStatus::Uploading,
        }
    }

    fn transition(&mut self, next: SessionStatus) -> anyhow::Result<()> {
        if !self.status.can_transition_to(next) {
            bail!(
                "session {} cannot move from {:?} to {:?}",
                self.id,
                self.status,
                next
            );
        }
        self.status = next;
        Ok(())
    }

    /// Enter `Processing`. Calling again while already processing is a no-op.
    pub fn begin_processing(&mut self) -> anyhow::Result<()> {
        if self.status == SessionStatus::Processing {
            return Ok(());
        }
        self.transition(SessionStatus::Processing)
    }

    pub fn complete(&mut self) -> anyhow::Result<()> {
        self.transition(SessionStatus::Completed)
    }

    pub fn fail(&mut self) -> anyhow::Result<()> {
        self.transition(SessionStatus::Error)
    }

    /// Settle an open session: `Error` when every file failed, `Completed`
    /// otherwise. A session still in `Uploading` passes through `Processing`.
    pub fn finish(&mut self) -> anyhow::Result<()> {
        self.begin_processing()?;
        if !self.files.is_empty() && self.failed_files >= self.files.len() {
            self.fail()
        } else {
            self.complete()
        }
    }

    /// Track a file that was not part of the initial upload.
    pub fn register_file(&mut self, name: &str) {
        if !self.files.iter().any(|f| f == name) {
            self.files.push(name.to_string());
        }
    }

    pub fn record_result(&mut self, cards: &[DetectedCard]) {
        let failed = cards.iter().filter(|c| c.status == CardStatus::Error).count();
        self.total_cards += cards.len();
        self.failed_cards += failed;
        self.processed_cards += cards.len() - failed;
        self.processed_files += 1;
    }

    pub fn record_failure(&mut self) {
        self.failed_files += 1;
    }

    pub fn elapsed_ms(&self) -> u64 {
        now_millis().saturating_sub(self.start_time)
    }

    pub fn status_snapshot(&self) -> ProcessingStatus {
        let done = self.processed_files + self.failed_files;
        let progress = if self.files.is_empty() {
            if self.status.is_finished() { 1.0 } else { 0.0 }
        } else {
            (done as f64 / self.files.len() as f64).min(1.0)
        };

        ProcessingStatus {
            session_id: self.id,
            status: self.status,
            total_files: self.files.len(),
            processed_files: self.processed_files,
            failed_files: self.failed_files,
            total_cards: self.total_cards,
            processed_cards: self.processed_cards,
            failed_cards: self.failed_cards,
            progress,
            elapsed_ms: self.elapsed_ms(),
        }
    }
}

/// Read-only progress view of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingStatus {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub total_files: usize,
    pub processed_files: usize,
    pub failed_files: usize,
    pub total_cards: usize,
    pub processed_cards: usize,
    pub failed_cards: usize,
    /// Fraction of files handled, in [0, 1]
    pub progress: f64,
    pub elapsed_ms: u64,
}

/// Counters describing one detection pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionStats {
    pub candidates_per_strategy: BTreeMap<String, usize>,
    pub exhausted_budgets: Vec<String>,
    pub faces: usize,
    pub background_removed: bool,
    pub accepted: usize,
    pub used_fallback: bool,
    pub elapsed_ms: u64,
}

/// Outcome of processing one image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub session_id: SessionId,
    pub original: String,
    pub cards: Vec<DetectedCard>,
    pub processing_time_ms: u64,
    pub total_detected: usize,
    pub stats: DetectionStats,
}

impl ProcessingResult {
    /// Result for an image that produced nothing.
    pub fn empty(
        session_id: SessionId,
        original: impl Into<String>,
        processing_time_ms: u64,
    ) -> Self {
        Self {
            session_id,
            original: original.into(),
            cards: Vec::new(),
            processing_time_ms,
            total_detected: 0,
            stats: DetectionStats::default(),
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
