//! End-to-end pipeline: synthetic frames through the motion detector and
//! the fusion engine, asserting the published-event semantics without a
//! broker in the loop.

use homesight::config::FusionConfig;
use homesight::detect::MotionDetector;
use homesight::fusion::FusionEngine;
use homesight::geometry::{Direction, Point};
use homesight::protocol::{Door, Zone};
use image::GrayImage;

const WIDTH: u32 = 160;
const HEIGHT: u32 = 120;
const BACKGROUND: u8 = 50;

fn flat_frame() -> GrayImage {
    GrayImage::from_pixel(WIDTH, HEIGHT, image::Luma([BACKGROUND]))
}

/// A 40x40 bright square centered at (cx, cy).
fn frame_with_blob(cx: u32, cy: u32) -> GrayImage {
    let mut frame = flat_frame();
    for y in cy - 20..cy + 20 {
        for x in cx - 20..cx + 20 {
            frame.put_pixel(x, y, image::Luma([255]));
        }
    }
    frame
}

fn normalized(blob: homesight::detect::Blob) -> Point {
    Point(
        blob.centroid.0 / WIDTH as f64,
        blob.centroid.1 / HEIGHT as f64,
    )
}

#[test]
fn moving_blob_publishes_one_bedroom_crossing() {
    let config = FusionConfig::default();
    let mut detector = MotionDetector::new();
    let mut engine = FusionEngine::new(config);

    // First frame only seeds the background model.
    assert!(detector.detect(&flat_frame(), 10.0).is_none());

    // Blob above the bedroom door line (y = 0.30 -> row 36).
    let blob = detector
        .detect(&frame_with_blob(40, 24), engine.effective_min_area(0.0))
        .expect("blob above the line");
    let above = normalized(blob);
    assert!(above.1 < 0.30);
    let outcome = engine.observe_frame(Some(above), 0.0);
    assert!(outcome.crossing.is_none());

    // Blob below the line: exactly one crossing, into the living room.
    let blob = detector
        .detect(&frame_with_blob(40, 42), engine.effective_min_area(0.1))
        .expect("blob below the line");
    let below = normalized(blob);
    assert!(below.1 > 0.30 && below.1 < 0.40);
    let crossing = engine
        .observe_frame(Some(below), 0.1)
        .crossing
        .expect("crossing event");

    assert_eq!(crossing.door, Door::Bed);
    assert_eq!(crossing.direction, Direction::IntoLiving);
    assert_eq!(crossing.confidence, 0.70);
    assert!((0.0..=1.0).contains(&crossing.centroid.0));
    assert!((0.0..=1.0).contains(&crossing.centroid.1));

    // The same movement repeated immediately is inside the cooldown.
    let blob = detector
        .detect(&frame_with_blob(40, 24), engine.effective_min_area(0.4))
        .expect("blob back above the line");
    let outcome = engine.observe_frame(Some(normalized(blob)), 0.4);
    assert!(outcome.crossing.is_none());
}

#[test]
fn pir_boost_admits_marginal_blob_and_raises_confidence() {
    // The 40x40 blob cleans up to roughly 1600 px. Gate at 2000 so it
    // only passes while a PIR pulse scales the gate to 1200.
    let config = FusionConfig {
        min_contour_area: 2_000.0,
        ..FusionConfig::default()
    };
    let mut detector = MotionDetector::new();
    let mut engine = FusionEngine::new(config);

    detector.detect(&flat_frame(), 10.0);

    // Without corroborating infrared the blob is rejected outright.
    assert!(detector
        .detect(&frame_with_blob(40, 24), engine.effective_min_area(0.0))
        .is_none());

    engine.observe_pir(Zone::Bedroom, 0.1);

    let blob = detector
        .detect(&frame_with_blob(40, 24), engine.effective_min_area(0.2))
        .expect("boosted gate admits the blob");
    engine.observe_frame(Some(normalized(blob)), 0.2);

    let blob = detector
        .detect(&frame_with_blob(40, 42), engine.effective_min_area(0.3))
        .expect("boosted gate admits the blob");
    let crossing = engine
        .observe_frame(Some(normalized(blob)), 0.3)
        .crossing
        .expect("crossing event");

    assert_eq!(crossing.door, Door::Bed);
    assert_eq!(crossing.confidence, 0.85);
}
