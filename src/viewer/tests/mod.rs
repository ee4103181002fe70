//! Scenario tests for the image viewer.
//!
//! Most scenarios use an 800x600 viewport showing a 1600x1200 image, which
//! fits at scale 0.5 with no pan: normalized `(x, y)` is on screen at
//! `(x * 800, y * 600)`.

mod editing_tests;

use std::time::Duration;

use web_time::Instant;

use super::*;

const EPSILON: f32 = 0.0001;

fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn label(id: &str, x: f32, y: f32) -> Label {
    Label::new(LabelId::new(id), x, y, PositionType::In)
}

/// A loaded viewer with the given image size and labels.
fn viewer_with(
    image: (u32, u32),
    config: ViewerConfig,
    labels: Vec<Label>,
) -> (ImageViewer, Instant) {
    let now = Instant::now();
    let mut viewer = ImageViewer::new(Size::new(800.0, 600.0), config);
    viewer
        .handle(
            ViewerInput::ImageLoaded {
                width: image.0,
                height: image.1,
            },
            now,
        )
        .unwrap();
    viewer.set_labels(labels);
    (viewer, now)
}

/// The standard 800x600 viewport with a 1600x1200 image.
fn standard_viewer(labels: Vec<Label>) -> (ImageViewer, Instant) {
    viewer_with((1600, 1200), ViewerConfig::default(), labels)
}

fn tap(viewer: &mut ImageViewer, button: PointerButton, at: Point, now: Instant) {
    viewer
        .handle(ViewerInput::PointerDown { button, position: at }, now)
        .unwrap();
    viewer
        .handle(ViewerInput::PointerUp { position: at }, now)
        .unwrap();
}

fn drag(viewer: &mut ImageViewer, from: Point, to: Point, now: Instant) {
    viewer
        .handle(
            ViewerInput::PointerDown {
                button: PointerButton::Left,
                position: from,
            },
            now,
        )
        .unwrap();
    viewer
        .handle(ViewerInput::PointerMove { position: to }, now)
        .unwrap();
    viewer
        .handle(ViewerInput::PointerUp { position: to }, now)
        .unwrap();
}

fn press(viewer: &mut ImageViewer, hotkey: Hotkey, now: Instant) {
    viewer.handle(ViewerInput::Hotkey { hotkey }, now).unwrap();
}

/// Take the requests and check exactly one was queued.
fn single_request(viewer: &mut ImageViewer) -> LabelRequest {
    let mut requests = viewer.take_requests();
    assert_eq!(requests.len(), 1, "expected one request, got {:?}", requests);
    requests.remove(0)
}

fn after(now: Instant, millis: u64) -> Instant {
    now + Duration::from_millis(millis)
}
