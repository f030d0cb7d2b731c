//! Asynchronous detection service
//!
//! Collaborator calls and the CPU-bound pipeline run on tokio's blocking
//! pool. Each run races a timer; when the timer wins, the run's
//! [`CancellationFlag`] is raised and its eventual output is dropped. Only
//! this service writes to the session store, and only after a race has been
//! decided, so orphaned work never reaches a session.

use super::config::ServiceConfig;
use super::store::SessionStore;
use crate::detection::{CancellationFlag, CardDetector, DetectionInput};
use crate::error::CardScanError;
use crate::extraction::{CardExtractor, PlaceholderEnricher};
use crate::traits::{BackgroundRemover, FaceDetector, MetadataEnricher, NoFaceDetector};
use crate::utils::ImageUtils;
use crate::{
    DetectedCard, DetectionStats, FaceBox, ProcessingResult, ProcessingStatus, Result, ScanResult,
    SessionId, SourceFile, UploadSession,
};
use anyhow::Context;
use futures_util::future::join_all;
use image::RgbaImage;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::spawn_blocking;
use tokio::time::timeout;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelinePlan {
    /// Collaborators plus every configured strategy
    Full,
    /// Fallback detector only, no collaborators
    Basic,
}

struct PipelineOutput {
    cards: Vec<DetectedCard>,
    stats: DetectionStats,
}

/// Session-aware front end of the detection pipeline
pub struct CardDetectionService {
    config: ServiceConfig,
    sessions: SessionStore,
    detector: Arc<CardDetector>,
    fallback_detector: Arc<CardDetector>,
    extractor: Arc<CardExtractor>,
    face_detector: Arc<dyn FaceDetector>,
    background_remover: Option<Arc<dyn BackgroundRemover>>,
    enricher: Arc<dyn MetadataEnricher>,
}

impl CardDetectionService {
    pub fn new(config: ServiceConfig) -> ScanResult<Self> {
        config.validate()?;

        Ok(Self {
            sessions: SessionStore::new(config.session_capacity, config.session_ttl()),
            detector: Arc::new(CardDetector::new(config.detection.clone())?),
            fallback_detector: Arc::new(CardDetector::new(config.fallback.clone())?),
            extractor: Arc::new(CardExtractor::new(config.detection.extraction.clone())),
            face_detector: Arc::new(NoFaceDetector),
            background_remover: None,
            enricher: Arc::new(PlaceholderEnricher),
            config,
        })
    }

    pub fn with_face_detector(mut self, face_detector: Arc<dyn FaceDetector>) -> Self {
        self.face_detector = face_detector;
        self
    }

    pub fn with_background_remover(mut self, remover: Arc<dyn BackgroundRemover>) -> Self {
        self.background_remover = Some(remover);
        self
    }

    pub fn with_enricher(mut self, enricher: Arc<dyn MetadataEnricher>) -> Self {
        self.enricher = enricher;
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Open a session in `uploading` state for the given files.
    pub fn create_session(&self, files: &[SourceFile]) -> SessionId {
        let names = files.iter().map(|f| f.name.clone()).collect();
        let id = self.sessions.insert(UploadSession::new(names));
        debug!(session = %id, files = files.len(), "created session");
        id
    }

    pub fn get_session(&self, id: SessionId) -> Option<UploadSession> {
        self.sessions.get(id)
    }

    pub fn get_processing_status(&self, id: SessionId) -> Option<ProcessingStatus> {
        self.sessions.update(id, |session| session.status_snapshot())
    }

    /// Close a session that images were added to one at a time. It ends in
    /// `error` only when every file failed.
    pub fn finish_session(&self, id: SessionId) -> ScanResult<ProcessingStatus> {
        let status = self
            .sessions
            .update(id, |session| {
                if session.status.is_finished() {
                    return Err(CardScanError::SessionFinished(id));
                }
                if let Err(e) = session.finish() {
                    warn!(session = %id, error = %e, "session update rejected");
                }
                Ok(session.status_snapshot())
            })
            .ok_or(CardScanError::SessionNotFound(id))??;

        info!(
            session = %id,
            status = ?status.status,
            processed = status.processed_files,
            failed = status.failed_files,
            "session finished"
        );
        Ok(status)
    }

    /// Run the pipeline for one image.
    ///
    /// Oversized or undecodable input fails before any session is touched.
    /// Without `session_id` a single-image session is created and finished
    /// here; an existing session stays open until
    /// [`finish_session`](Self::finish_session) and a finished one is
    /// rejected. A failed or timed-out run is retried once with the basic
    /// detector; only when that also fails is an error returned.
    pub async fn process_image(
        &self,
        file: SourceFile,
        session_id: Option<SessionId>,
    ) -> ScanResult<ProcessingResult> {
        let (name, image) = self.decode(file).await?;

        let (session_id, owns_session) = match session_id {
            Some(id) => match self.sessions.get(id) {
                None => return Err(CardScanError::SessionNotFound(id)),
                Some(session) if session.status.is_finished() => {
                    return Err(CardScanError::SessionFinished(id));
                }
                Some(_) => (id, false),
            },
            None => (self.sessions.insert(UploadSession::new(vec![name.clone()])), true),
        };

        self.update_session(session_id, |s| {
            s.register_file(&name);
            s.begin_processing()
        });

        let outcome = self.process_decoded(session_id, &name, image).await;

        if owns_session {
            let succeeded = outcome.is_ok();
            self.update_session(session_id, |s| if succeeded { s.complete() } else { s.fail() });
        }
        outcome
    }

    /// Process files in chunks of `batch_concurrency`, returning one result
    /// per file in input order. Failing files yield empty results.
    pub async fn process_batch(&self, files: Vec<SourceFile>) -> Vec<ProcessingResult> {
        let session_id = self.create_session(&files);
        self.update_session(session_id, |s| s.begin_processing());
        let total = files.len();
        info!(session = %session_id, files = total, "processing batch");

        let mut results = Vec::with_capacity(total);
        let mut pending = files.into_iter().peekable();
        while pending.peek().is_some() {
            let chunk: Vec<SourceFile> = pending
                .by_ref()
                .take(self.config.batch_concurrency)
                .collect();
            let chunk_results = join_all(
                chunk
                    .into_iter()
                    .map(|file| self.process_in_session(session_id, file)),
            )
            .await;
            results.extend(chunk_results);
        }

        self.update_session(session_id, UploadSession::finish);

        if let Some(status) = self.get_processing_status(session_id) {
            info!(
                session = %session_id,
                processed = status.processed_files,
                failed = status.failed_files,
                cards = status.total_cards,
                elapsed_ms = status.elapsed_ms,
                "batch finished"
            );
        }
        results
    }

    /// One batch member; every failure is folded into an empty result.
    async fn process_in_session(
        &self,
        session_id: SessionId,
        file: SourceFile,
    ) -> ProcessingResult {
        let start = Instant::now();
        let name = file.name.clone();

        let outcome = match self.decode(file).await {
            Ok((name, image)) => self.process_decoded(session_id, &name, image).await,
            Err(e) => {
                self.record(session_id, |s| s.record_failure());
                Err(e)
            }
        };

        outcome.unwrap_or_else(|e| {
            warn!(session = %session_id, file = %name, error = %e, "image failed");
            ProcessingResult::empty(session_id, name, start.elapsed().as_millis() as u64)
        })
    }

    async fn decode(&self, file: SourceFile) -> ScanResult<(String, Arc<RgbaImage>)> {
        ImageUtils::check_size(&file, self.config.max_input_bytes)?;

        let max_bytes = self.config.max_input_bytes;
        let name = file.name.clone();
        let decoded = spawn_blocking(move || ImageUtils::decode(&file, max_bytes))
            .await
            .map_err(|e| CardScanError::Detection {
                name: name.clone(),
                source: anyhow::Error::new(e).context("decoder task failed"),
            })??;

        Ok((name, Arc::new(decoded)))
    }

    /// Detect, extract and record the outcome in the session counters.
    async fn process_decoded(
        &self,
        session_id: SessionId,
        name: &str,
        image: Arc<RgbaImage>,
    ) -> ScanResult<ProcessingResult> {
        let start = Instant::now();

        match self.run_with_fallback(name, image).await {
            Ok(output) => {
                self.record(session_id, |s| s.record_result(&output.cards));
                let processing_time_ms = start.elapsed().as_millis() as u64;
                info!(
                    session = %session_id,
                    file = name,
                    cards = output.cards.len(),
                    fallback = output.stats.used_fallback,
                    processing_time_ms,
                    "processed image"
                );
                Ok(ProcessingResult {
                    session_id,
                    original: name.to_string(),
                    total_detected: output.cards.len(),
                    cards: output.cards,
                    processing_time_ms,
                    stats: output.stats,
                })
            }
            Err(e) => {
                self.record(session_id, |s| s.record_failure());
                Err(e)
            }
        }
    }

    async fn run_with_fallback(
        &self,
        name: &str,
        image: Arc<RgbaImage>,
    ) -> ScanResult<PipelineOutput> {
        let cancel = CancellationFlag::new();
        let full = timeout(
            self.config.image_timeout(),
            self.run_pipeline(PipelinePlan::Full, name, Arc::clone(&image), cancel.clone()),
        )
        .await;

        match full {
            Ok(Ok(output)) => return Ok(output),
            Ok(Err(e)) => {
                warn!(file = name, error = %e, "detection failed, falling back to basic detection");
            }
            Err(_) => {
                let err = CardScanError::DetectionTimeout {
                    name: name.to_string(),
                    timeout_ms: self.config.image_timeout_ms,
                };
                warn!(file = name, error = %err, "falling back to basic detection");
            }
        }
        cancel.cancel();

        let fallback_cancel = CancellationFlag::new();
        let fallback = timeout(
            self.config.fallback_timeout(),
            self.run_pipeline(PipelinePlan::Basic, name, image, fallback_cancel.clone()),
        )
        .await;

        match fallback {
            Ok(Ok(mut output)) => {
                output.stats.used_fallback = true;
                Ok(output)
            }
            Ok(Err(source)) => Err(CardScanError::Detection {
                name: name.to_string(),
                source,
            }),
            Err(_) => {
                fallback_cancel.cancel();
                Err(CardScanError::DetectionTimeout {
                    name: name.to_string(),
                    timeout_ms: self.config.fallback_timeout_ms,
                })
            }
        }
    }

    async fn run_pipeline(
        &self,
        plan: PipelinePlan,
        name: &str,
        image: Arc<RgbaImage>,
        cancel: CancellationFlag,
    ) -> Result<PipelineOutput> {
        let (detector, faces, removed) = match plan {
            PipelinePlan::Full => {
                let (faces, removed) = tokio::join!(
                    self.detect_faces(Arc::clone(&image)),
                    self.remove_background(Arc::clone(&image))
                );
                (Arc::clone(&self.detector), faces, removed)
            }
            PipelinePlan::Basic => (Arc::clone(&self.fallback_detector), Vec::new(), None),
        };

        let detect_image = Arc::clone(&image);
        let detect_cancel = cancel.clone();
        let outcome = spawn_blocking(move || {
            let input = DetectionInput::new(&detect_image)
                .with_faces(&faces)
                .with_background_removed(removed.as_ref());
            detector.detect(input, &detect_cancel)
        })
        .await
        .context("detection task panicked")??;

        if cancel.is_cancelled() {
            anyhow::bail!("pipeline cancelled before extraction");
        }

        let extractor = Arc::clone(&self.extractor);
        let enricher = Arc::clone(&self.enricher);
        let file_name = name.to_string();
        let regions = outcome.regions;
        let cards = spawn_blocking(move || {
            extractor.extract_cards(&image, &regions, &file_name, enricher.as_ref())
        })
        .await
        .context("extraction task panicked")?;

        Ok(PipelineOutput {
            cards,
            stats: outcome.stats,
        })
    }

    /// Faces in the image, or none when the detector fails or is slow.
    async fn detect_faces(&self, image: Arc<RgbaImage>) -> Vec<FaceBox> {
        let detector = Arc::clone(&self.face_detector);
        let collaborator = detector.name().to_string();
        let task = spawn_blocking(move || detector.detect(&image));

        let reason = match timeout(self.config.collaborator_timeout(), task).await {
            Ok(Ok(Ok(faces))) => return faces,
            Ok(Ok(Err(e))) => e.to_string(),
            Ok(Err(e)) => format!("task failed: {}", e),
            Err(_) => format!("no answer within {}ms", self.config.collaborator_timeout_ms),
        };
        let err = CardScanError::CollaboratorUnavailable {
            collaborator,
            reason,
        };
        warn!(error = %err, "continuing without faces");
        Vec::new()
    }

    /// Background-suppressed copy of the image, or `None` to skip.
    async fn remove_background(&self, image: Arc<RgbaImage>) -> Option<RgbaImage> {
        let remover = Arc::clone(self.background_remover.as_ref()?);
        let collaborator = remover.name().to_string();
        let task = spawn_blocking(move || remover.remove_background(&image));

        let reason = match timeout(self.config.collaborator_timeout(), task).await {
            Ok(Ok(Ok(removed))) => return removed,
            Ok(Ok(Err(e))) => e.to_string(),
            Ok(Err(e)) => format!("task failed: {}", e),
            Err(_) => format!("no answer within {}ms", self.config.collaborator_timeout_ms),
        };
        let err = CardScanError::CollaboratorUnavailable {
            collaborator,
            reason,
        };
        warn!(error = %err, "continuing without background removal");
        None
    }

    /// Apply a session transition, logging rather than failing when the
    /// session was evicted or the transition is not allowed.
    fn update_session<F>(&self, id: SessionId, f: F)
    where
        F: FnOnce(&mut UploadSession) -> anyhow::Result<()>,
    {
        match self.sessions.update(id, f) {
            Some(Ok(())) => {}
            Some(Err(e)) => warn!(session = %id, error = %e, "session update rejected"),
            None => warn!(session = %id, "session no longer tracked"),
        }
    }

    fn record(&self, id: SessionId, f: impl FnOnce(&mut UploadSession)) {
        if self.sessions.update(id, f).is_none() {
            warn!(session = %id, "session no longer tracked");
        }
    }
}
