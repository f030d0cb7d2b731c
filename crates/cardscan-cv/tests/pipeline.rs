use anyhow::anyhow;
use cardscan_cv::traits::{BackgroundRemover, FaceDetector};
use cardscan_cv::{
    CancellationFlag, CardDetectionService, CardDetector, CardExtractor, CardScanError,
    CardStatus, DetectionConfig, DetectionInput, FaceBox, Region, ServiceConfig, SessionId,
    SessionStatus, SourceFile, StrategyKind,
};
use image::{ImageFormat, Rgba, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const CARD: Region = Region {
    x: 375,
    y: 525,
    width: 250,
    height: 350,
};

/// Light, slightly noisy table with dark cards painted on it.
fn scene(width: u32, height: u32, cards: &[Region], seed: u64) -> RgbaImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut image = RgbaImage::new(width, height);
    for pixel in image.pixels_mut() {
        let jitter: i16 = rng.gen_range(-6..=6);
        let v = (220 + jitter) as u8;
        *pixel = Rgba([v, v, v.saturating_sub(4), 255]);
    }
    for card in cards {
        for y in card.y..card.bottom() {
            for x in card.x..card.right() {
                image.put_pixel(x, y, Rgba([40, 70, 140, 255]));
            }
        }
    }
    image
}

/// Noise-free table with one dark card.
fn flat_scene(width: u32, height: u32, card: Region) -> RgbaImage {
    let mut image = RgbaImage::from_pixel(width, height, Rgba([220, 220, 216, 255]));
    for y in card.y..card.bottom() {
        for x in card.x..card.right() {
            image.put_pixel(x, y, Rgba([40, 70, 140, 255]));
        }
    }
    image
}

fn png(image: &RgbaImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

fn card_photo(name: &str) -> SourceFile {
    SourceFile::new(name, png(&scene(1000, 1400, &[CARD], 7)))
}

struct StubFaces {
    faces: Vec<FaceBox>,
    calls: AtomicUsize,
}

impl FaceDetector for StubFaces {
    fn name(&self) -> &str {
        "stub-faces"
    }

    fn detect(&self, _image: &RgbaImage) -> anyhow::Result<Vec<FaceBox>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.faces.clone())
    }
}

struct SlowFaces;

impl FaceDetector for SlowFaces {
    fn detect(&self, _image: &RgbaImage) -> anyhow::Result<Vec<FaceBox>> {
        std::thread::sleep(Duration::from_millis(400));
        Ok(vec![FaceBox::new(450, 600, 60, 60, 0.9)])
    }
}

struct BrokenRemover;

impl BackgroundRemover for BrokenRemover {
    fn name(&self) -> &str {
        "broken"
    }

    fn remove_background(&self, _image: &RgbaImage) -> anyhow::Result<Option<RgbaImage>> {
        Err(anyhow!("segmentation model not loaded"))
    }
}

struct PanickingRemover;

impl BackgroundRemover for PanickingRemover {
    fn remove_background(&self, _image: &RgbaImage) -> anyhow::Result<Option<RgbaImage>> {
        panic!("remover crashed")
    }
}

/// Clears the light table to transparent black and keeps the card.
struct MaskingRemover;

impl BackgroundRemover for MaskingRemover {
    fn name(&self) -> &str {
        "masking"
    }

    fn remove_background(&self, image: &RgbaImage) -> anyhow::Result<Option<RgbaImage>> {
        let mut masked = image.clone();
        for pixel in masked.pixels_mut() {
            if pixel[0] > 150 {
                *pixel = Rgba([0, 0, 0, 0]);
            }
        }
        Ok(Some(masked))
    }
}

/// Returns a mask at half resolution.
struct ShrinkingRemover;

impl BackgroundRemover for ShrinkingRemover {
    fn remove_background(&self, image: &RgbaImage) -> anyhow::Result<Option<RgbaImage>> {
        let (width, height) = image.dimensions();
        Ok(Some(RgbaImage::new(width / 2, height / 2)))
    }
}

fn assert_result_invariants(regions: &[Region], confidences: &[f64], tolerance: f64, overlap: f64) {
    for region in regions {
        assert!(
            region.aspect_deviation() <= tolerance + 1e-9,
            "region {:?} has aspect {}",
            region,
            region.aspect_ratio()
        );
    }
    for confidence in confidences {
        assert!((0.0..=1.0).contains(confidence));
    }
    for (i, a) in regions.iter().enumerate() {
        for b in &regions[i + 1..] {
            assert!(a.overlap_ratio(b) <= overlap + 1e-9, "{:?} overlaps {:?}", a, b);
        }
    }
}

#[test]
fn test_single_card_on_plain_background() {
    let config = DetectionConfig::default();
    let detector = CardDetector::new(config.clone()).unwrap();
    let image = scene(1000, 1400, &[CARD], 11);

    let outcome = detector
        .detect(DetectionInput::new(&image), &CancellationFlag::new())
        .unwrap();

    assert!(!outcome.regions.is_empty());
    let best = outcome
        .regions
        .iter()
        .find(|c| c.region.overlap_ratio(&CARD) >= 0.8)
        .expect("card region not found");
    assert!(best.confidence >= config.geometric.threshold);

    let regions: Vec<Region> = outcome.regions.iter().map(|c| c.region).collect();
    let confidences: Vec<f64> = outcome.regions.iter().map(|c| c.confidence).collect();
    assert_result_invariants(
        &regions,
        &confidences,
        config.aspect_tolerance,
        config.overlap_threshold,
    );
    assert!(regions.len() <= config.max_regions);
    assert!(outcome.stats.accepted == regions.len());
}

#[test]
fn test_one_card_yields_one_region() {
    let card = Region::new(200, 280, 600, 840);
    let image = flat_scene(1000, 1400, card);
    let detector = CardDetector::new(DetectionConfig::default()).unwrap();

    let outcome = detector
        .detect(DetectionInput::new(&image), &CancellationFlag::new())
        .unwrap();

    assert_eq!(outcome.regions.len(), 1, "accepted {:?}", outcome.regions);
    assert_eq!(outcome.stats.accepted, 1);
    let found = &outcome.regions[0];
    assert_eq!(found.confidence, 1.0);
    let coverage = found.region.intersection_area(&card) as f64 / card.area() as f64;
    assert!(coverage >= 0.9, "{:?} covers {:.3} of the card", found.region, coverage);
}

#[test]
fn test_background_removed_surface_marks_candidates() {
    let image = scene(1000, 1400, &[CARD], 13);
    let masked = MaskingRemover.remove_background(&image).unwrap().unwrap();
    let faces = [FaceBox::new(460, 600, 80, 80, 0.95)];
    let detector = CardDetector::new(DetectionConfig::default()).unwrap();

    let input = DetectionInput::new(&image)
        .with_faces(&faces)
        .with_background_removed(Some(&masked));
    let outcome = detector.detect(input, &CancellationFlag::new()).unwrap();

    assert!(outcome.stats.background_removed);
    assert!(!outcome.regions.is_empty());
    assert!(outcome.regions.iter().all(|c| c.background_removed));
    let first = &outcome.regions[0];
    assert!(first.contains_face);
    assert_eq!(first.confidence, 1.0);
    // face bonus alone on a background-removed surface
    assert!(first.fit >= 0.8);
    assert!(first.region.overlap_ratio(&faces[0].region()) >= 0.9);
}

#[test]
fn test_mismatched_background_removed_surface_is_ignored() {
    let image = scene(1000, 1400, &[CARD], 17);
    let small = RgbaImage::new(500, 700);
    let detector = CardDetector::new(DetectionConfig::default()).unwrap();

    let input = DetectionInput::new(&image).with_background_removed(Some(&small));
    let outcome = detector.detect(input, &CancellationFlag::new()).unwrap();

    assert!(!outcome.stats.background_removed);
    assert!(outcome.regions.iter().all(|c| !c.background_removed));
    assert!(outcome.regions.iter().any(|c| c.region.overlap_ratio(&CARD) >= 0.8));
}

#[test]
fn test_blank_image_yields_nothing() {
    let image = RgbaImage::from_pixel(600, 800, Rgba([200, 200, 200, 255]));
    let detector = CardDetector::new(DetectionConfig::default()).unwrap();

    let outcome = detector
        .detect(DetectionInput::new(&image), &CancellationFlag::new())
        .unwrap();

    assert!(outcome.regions.is_empty());
}

#[test]
fn test_cancelled_detection_fails() {
    let image = scene(500, 700, &[], 3);
    let detector = CardDetector::new(DetectionConfig::default()).unwrap();
    let cancel = CancellationFlag::new();
    cancel.cancel();

    assert!(detector.detect(DetectionInput::new(&image), &cancel).is_err());
}

#[test]
fn test_extraction_is_deterministic() {
    let image = scene(1000, 1400, &[CARD], 5);
    let extractor = CardExtractor::default();

    let first = extractor.extract(&image, &CARD, 0).unwrap();
    let second = extractor.extract(&image, &CARD, 0).unwrap();
    assert_eq!(first, second);

    let decoded = image::load_from_memory(&first).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (350, 490));
}

#[test]
fn test_extraction_rejects_out_of_bounds_region() {
    let image = scene(200, 300, &[], 5);
    let extractor = CardExtractor::default();

    let result = extractor.extract(&image, &Region::new(150, 200, 100, 140), 3);
    assert!(matches!(result, Err(CardScanError::Extraction { index: 3, .. })));
}

#[tokio::test]
async fn test_process_image_creates_finished_session() {
    let service = CardDetectionService::new(ServiceConfig::default()).unwrap();

    let result = service.process_image(card_photo("table.png"), None).await.unwrap();

    assert_eq!(result.total_detected, result.cards.len());
    assert!(!result.cards.is_empty());
    assert!(!result.stats.used_fallback);
    for card in &result.cards {
        assert_eq!(card.original_file, "table.png");
        assert!(card.status == CardStatus::Enhanced || card.status == CardStatus::Detected);
        assert!(!card.image_blob.is_empty());
    }

    let session = service.get_session(result.session_id).unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.processed_files, 1);
    assert_eq!(session.total_cards, result.cards.len());
    assert_eq!(session.processed_cards + session.failed_cards, session.total_cards);
}

#[tokio::test]
async fn test_no_faces_means_no_face_anchored_candidates() {
    let faces = Arc::new(StubFaces {
        faces: Vec::new(),
        calls: AtomicUsize::new(0),
    });
    let service = CardDetectionService::new(ServiceConfig::default())
        .unwrap()
        .with_face_detector(faces.clone());

    let result = service.process_image(card_photo("a.png"), None).await.unwrap();

    assert_eq!(faces.calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.stats.faces, 0);
    let face_key = StrategyKind::FaceAnchored.as_str();
    assert_eq!(result.stats.candidates_per_strategy.get(face_key).copied().unwrap_or(0), 0);
    assert!(result.cards.iter().all(|c| c.strategy != face_key));
}

#[tokio::test]
async fn test_face_inside_card_is_preferred() {
    let faces = Arc::new(StubFaces {
        faces: vec![FaceBox::new(460, 600, 80, 80, 0.95)],
        calls: AtomicUsize::new(0),
    });
    let service = CardDetectionService::new(ServiceConfig::default())
        .unwrap()
        .with_face_detector(faces);

    let result = service.process_image(card_photo("b.png"), None).await.unwrap();

    assert_eq!(result.stats.faces, 1);
    let first = result.cards.first().unwrap();
    assert!(first.bounds.overlap_ratio(&Region::new(460, 600, 80, 80)) >= 0.9);
}

#[tokio::test]
async fn test_oversized_input_touches_no_session() {
    let service = CardDetectionService::new(ServiceConfig::default()).unwrap();
    let huge = SourceFile::new("huge.jpg", vec![0u8; 20 * 1024 * 1024]);

    let err = service.process_image(huge, None).await.unwrap_err();

    assert!(matches!(err, CardScanError::InputTooLarge { .. }));
    assert!(err.is_input_error());
    assert!(service.sessions().is_empty());
}

#[tokio::test]
async fn test_undecodable_input_is_rejected() {
    let service = CardDetectionService::new(ServiceConfig::default()).unwrap();
    let junk = SourceFile::new("junk.png", b"definitely not an image".to_vec());

    let err = service.process_image(junk, None).await.unwrap_err();

    assert!(matches!(err, CardScanError::ImageDecode { .. }));
    assert!(service.sessions().is_empty());
}

#[tokio::test]
async fn test_unknown_session_is_rejected() {
    let service = CardDetectionService::new(ServiceConfig::default()).unwrap();
    let missing = SessionId::new();

    let err = service
        .process_image(card_photo("c.png"), Some(missing))
        .await
        .unwrap_err();

    assert!(matches!(err, CardScanError::SessionNotFound(id) if id == missing));
}

#[tokio::test]
async fn test_failing_background_remover_is_skipped() {
    let service = CardDetectionService::new(ServiceConfig::default())
        .unwrap()
        .with_background_remover(Arc::new(BrokenRemover));

    let result = service.process_image(card_photo("d.png"), None).await.unwrap();

    assert!(!result.cards.is_empty());
    assert!(!result.stats.background_removed);
    assert!(!result.stats.used_fallback);
}

#[tokio::test]
async fn test_panicking_background_remover_is_skipped() {
    let service = CardDetectionService::new(ServiceConfig::default())
        .unwrap()
        .with_background_remover(Arc::new(PanickingRemover));

    let result = service.process_image(card_photo("e.png"), None).await.unwrap();

    assert!(!result.cards.is_empty());
    assert!(!result.stats.background_removed);
}

#[tokio::test]
async fn test_masking_background_remover_is_used() {
    let service = CardDetectionService::new(ServiceConfig::default())
        .unwrap()
        .with_background_remover(Arc::new(MaskingRemover));

    let result = service.process_image(card_photo("m.png"), None).await.unwrap();

    assert!(result.stats.background_removed);
    assert!(!result.stats.used_fallback);
    assert!(!result.cards.is_empty());
    assert!(result.cards[0].bounds.overlap_ratio(&CARD) >= 0.8);
}

#[tokio::test]
async fn test_masked_face_card_ranks_first() {
    let faces = Arc::new(StubFaces {
        faces: vec![FaceBox::new(460, 600, 80, 80, 0.95)],
        calls: AtomicUsize::new(0),
    });
    let service = CardDetectionService::new(ServiceConfig::default())
        .unwrap()
        .with_face_detector(faces)
        .with_background_remover(Arc::new(MaskingRemover));

    let result = service.process_image(card_photo("n.png"), None).await.unwrap();

    assert!(result.stats.background_removed);
    assert_eq!(result.stats.faces, 1);
    let first = result.cards.first().unwrap();
    assert!(first.bounds.overlap_ratio(&Region::new(460, 600, 80, 80)) >= 0.9);
}

#[tokio::test]
async fn test_background_removed_with_other_dimensions_is_ignored() {
    let service = CardDetectionService::new(ServiceConfig::default())
        .unwrap()
        .with_background_remover(Arc::new(ShrinkingRemover));

    let result = service.process_image(card_photo("s.png"), None).await.unwrap();

    assert!(!result.stats.background_removed);
    assert!(!result.cards.is_empty());
}

#[tokio::test]
async fn test_slow_face_detector_times_out() {
    let config = ServiceConfig {
        collaborator_timeout_ms: 50,
        ..Default::default()
    };
    let service = CardDetectionService::new(config)
        .unwrap()
        .with_face_detector(Arc::new(SlowFaces));

    let result = service.process_image(card_photo("f.png"), None).await.unwrap();

    assert_eq!(result.stats.faces, 0);
    assert!(!result.cards.is_empty());
}

#[tokio::test]
async fn test_timed_out_pipeline_falls_back() {
    let config = ServiceConfig {
        image_timeout_ms: 1,
        ..Default::default()
    };
    let service = CardDetectionService::new(config).unwrap();

    let result = service.process_image(card_photo("g.png"), None).await.unwrap();

    assert!(result.stats.used_fallback);
    let session = service.get_session(result.session_id).unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
}

#[tokio::test]
async fn test_batch_keeps_order_and_counts_failures() {
    let config = ServiceConfig {
        batch_concurrency: 2,
        ..Default::default()
    };
    let service = CardDetectionService::new(config).unwrap();
    let files = vec![
        card_photo("one.png"),
        SourceFile::new("broken.png", b"garbage".to_vec()),
        card_photo("three.png"),
    ];

    let results = service.process_batch(files).await;

    let names: Vec<&str> = results.iter().map(|r| r.original.as_str()).collect();
    assert_eq!(names, ["one.png", "broken.png", "three.png"]);
    assert!(results[1].cards.is_empty());
    assert!(!results[0].cards.is_empty());
    assert!(results.iter().all(|r| r.session_id == results[0].session_id));

    let status = service.get_processing_status(results[0].session_id).unwrap();
    assert_eq!(status.status, SessionStatus::Completed);
    assert_eq!(status.total_files, 3);
    assert_eq!(status.processed_files, 2);
    assert_eq!(status.failed_files, 1);
    assert_eq!(
        status.total_cards,
        results[0].cards.len() + results[2].cards.len()
    );
}

#[tokio::test]
async fn test_batch_of_failures_ends_in_error() {
    let service = CardDetectionService::new(ServiceConfig::default()).unwrap();
    let files = vec![
        SourceFile::new("x.png", b"nope".to_vec()),
        SourceFile::new("y.png", vec![1, 2, 3]),
    ];

    let results = service.process_batch(files).await;

    assert_eq!(results.len(), 2);
    let session = service.get_session(results[0].session_id).unwrap();
    assert_eq!(session.status, SessionStatus::Error);
    assert_eq!(session.failed_files, 2);
}

#[tokio::test]
async fn test_images_join_an_existing_session() {
    let service = CardDetectionService::new(ServiceConfig::default()).unwrap();
    let first = card_photo("first.png");
    let id = service.create_session(std::slice::from_ref(&first));

    service.process_image(first, Some(id)).await.unwrap();
    service.process_image(card_photo("extra.png"), Some(id)).await.unwrap();

    let session = service.get_session(id).unwrap();
    assert_eq!(session.status, SessionStatus::Processing);
    assert_eq!(session.files, vec!["first.png", "extra.png"]);
    assert_eq!(session.processed_files, 2);

    let status = service.finish_session(id).unwrap();
    assert_eq!(status.status, SessionStatus::Completed);
    assert_eq!(status.progress, 1.0);
    assert_eq!(service.get_session(id).unwrap().status, SessionStatus::Completed);
}

#[tokio::test]
async fn test_finished_session_accepts_no_more_images() {
    let service = CardDetectionService::new(ServiceConfig::default()).unwrap();
    let id = service.create_session(&[]);

    let status = service.finish_session(id).unwrap();
    assert_eq!(status.status, SessionStatus::Completed);

    let again = service.finish_session(id).unwrap_err();
    assert!(matches!(again, CardScanError::SessionFinished(s) if s == id));
    let late = service
        .process_image(card_photo("late.png"), Some(id))
        .await
        .unwrap_err();
    assert!(matches!(late, CardScanError::SessionFinished(s) if s == id));

    let missing = SessionId::new();
    let err = service.finish_session(missing).unwrap_err();
    assert!(matches!(err, CardScanError::SessionNotFound(s) if s == missing));
}
