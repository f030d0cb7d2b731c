// tests/core_tests.rs
use cardscan_core::{
    card::{CardStatus, DetectedCard},
    geometry::{FaceBox, Region, TARGET_ASPECT_RATIO},
    session::{SessionStatus, UploadSession},
};

#[test]
fn test_card_sized_region() {
    let region = Region::new(100, 100, 250, 350);

    assert!((region.aspect_ratio() - TARGET_ASPECT_RATIO).abs() < 1e-9);
    assert_eq!(region.area(), 87_500);
    assert_eq!(region.right(), 350);
    assert!(region.contains(&FaceBox::new(150, 150, 60, 60, 0.9).region()));
}

#[test]
fn test_session_counts_cards_and_failures() {
    let mut session = UploadSession::new(vec!["front.jpg".into(), "back.jpg".into()]);
    session.begin_processing().unwrap();

    let cards = vec![
        DetectedCard::detected(
            "front.jpg",
            vec![1, 2, 3],
            0.8,
            Region::new(0, 0, 50, 70),
            "geometric",
        ),
        DetectedCard::failed("front.jpg", 0.7, Region::new(60, 0, 50, 70), "geometric"),
    ];
    session.record_result(&cards);
    session.record_failure();
    session.complete().unwrap();

    let status = session.status_snapshot();
    assert_eq!(status.status, SessionStatus::Completed);
    assert_eq!(status.total_files, 2);
    assert_eq!(status.processed_files, 1);
    assert_eq!(status.failed_files, 1);
    assert_eq!(status.total_cards, 2);
    assert_eq!(status.failed_cards, 1);
    assert_eq!(cards[1].status, CardStatus::Error);
    assert!(session.fail().is_err());
}
