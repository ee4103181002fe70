//! Marker layout, hit-testing and tap routing for labels drawn over an image.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_HIDE_LABELS_WHEN_ZOOMING_COUNT, MARKER_HIT_RADIUS};
use crate::coordinate_space::{self, ImageMetrics, Point, Size, ViewportState};
use crate::label::{Label, LabelId, LabelStatus, PositionType};
use crate::movable_area::AreaEvent;

/// Decides whether the platform needs rendering work reduced.
///
/// Hosts plug in their own heuristic (device class, measured frame times).
pub trait RenderPolicy: std::fmt::Debug {
    fn should_throttle_rendering(&self) -> bool;
}

/// A fixed answer, set from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StaticRenderPolicy(pub bool);

impl RenderPolicy for StaticRenderPolicy {
    fn should_throttle_rendering(&self) -> bool {
        self.0
    }
}

/// Pointer buttons that drive label actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerButton {
    Left,
    Right,
    Middle,
}

/// What a tap on the overlay asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelAction {
    Create {
        position: Point,
        position_type: PositionType,
    },
    Delete(LabelId),
    TogglePositionType(LabelId),
    Focus(LabelId),
}

/// Map a tap to a label action.
///
/// | button | empty area     | on a marker         |
/// |--------|----------------|---------------------|
/// | left   | create (in)    | focus               |
/// | right  | create (out)   | delete              |
/// | middle | -              | toggle position type|
pub fn route_tap(
    button: PointerButton,
    hit: Option<&LabelId>,
    normalized: Point,
) -> Option<LabelAction> {
    match (button, hit) {
        (PointerButton::Left, None) => Some(LabelAction::Create {
            position: normalized,
            position_type: PositionType::In,
        }),
        (PointerButton::Right, None) => Some(LabelAction::Create {
            position: normalized,
            position_type: PositionType::Out,
        }),
        (PointerButton::Middle, None) => None,
        (PointerButton::Left, Some(id)) => Some(LabelAction::Focus(id.clone())),
        (PointerButton::Right, Some(id)) => Some(LabelAction::Delete(id.clone())),
        (PointerButton::Middle, Some(id)) => Some(LabelAction::TogglePositionType(id.clone())),
    }
}

/// Where and how to draw one marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerLayout {
    pub id: LabelId,
    /// 1-based number shown on the marker and in the list
    pub number: usize,
    /// Marker anchor in screen space
    pub screen: Point,
    /// Inverse of the viewport scale. Markers drawn inside the scaled image
    /// layer apply it to keep a constant on-screen size.
    pub counter_scale: f32,
    pub position_type: PositionType,
    pub status: LabelStatus,
    pub focused: bool,
}

/// Overlay settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayConfig {
    /// Labels above this count may be hidden during zoom gestures
    pub hide_labels_when_zooming_count: usize,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            hide_labels_when_zooming_count: DEFAULT_HIDE_LABELS_WHEN_ZOOMING_COUNT,
        }
    }
}

/// Lays out label markers over a viewport.
#[derive(Debug)]
pub struct LabelOverlay {
    config: OverlayConfig,
    policy: Box<dyn RenderPolicy>,
    hidden_for_zoom: bool,
    markers: Vec<MarkerLayout>,
    /// Screen anchors of every label, kept while markers are hidden
    anchors: Vec<(LabelId, Point)>,
}

impl LabelOverlay {
    pub fn new(config: OverlayConfig, policy: Box<dyn RenderPolicy>) -> Self {
        Self {
            config,
            policy,
            hidden_for_zoom: false,
            markers: Vec::new(),
            anchors: Vec::new(),
        }
    }

    /// Whether markers are currently shown.
    pub fn labels_visible(&self) -> bool {
        !self.hidden_for_zoom
    }

    /// Markers from the last layout pass.
    pub fn markers(&self) -> &[MarkerLayout] {
        &self.markers
    }

    /// React to a controller event.
    pub fn observe(&mut self, event: &AreaEvent, label_count: usize) {
        match event {
            AreaEvent::ZoomStart { .. } => {
                if label_count > self.config.hide_labels_when_zooming_count
                    && self.policy.should_throttle_rendering()
                {
                    log::trace!("Hiding {} labels while zooming", label_count);
                    self.hidden_for_zoom = true;
                }
            }
            AreaEvent::ZoomEnd { .. } => {
                self.hidden_for_zoom = false;
            }
            _ => {}
        }
    }

    /// Recompute marker positions for the current viewport.
    pub fn layout(
        &mut self,
        labels: &[Label],
        image: ImageMetrics,
        viewport: Size,
        state: &ViewportState,
        focused: Option<&LabelId>,
    ) -> &[MarkerLayout] {
        self.markers.clear();
        self.anchors.clear();
        self.anchors.extend(labels.iter().map(|label| {
            let screen = coordinate_space::to_screen(label.position(), image, viewport, state);
            (label.id.clone(), screen)
        }));
        if self.hidden_for_zoom {
            return &self.markers;
        }

        let counter_scale = 1.0 / state.scale;
        self.markers.extend(labels.iter().zip(&self.anchors).enumerate().map(
            |(i, (label, (_, screen)))| MarkerLayout {
                id: label.id.clone(),
                number: i + 1,
                screen: *screen,
                counter_scale,
                position_type: label.position_type,
                status: label.status,
                focused: focused == Some(&label.id),
            },
        ));
        &self.markers
    }

    /// Find the marker under a screen position.
    ///
    /// The closest marker within the hit radius wins; later markers win ties
    /// since they are drawn on top. Markers hidden during a zoom gesture can
    /// still be hit.
    pub fn hit_test(&self, screen: Point) -> Option<LabelId> {
        let mut best: Option<(&LabelId, f32)> = None;
        for (id, anchor) in &self.anchors {
            let distance = anchor.distance_to(screen);
            if distance > MARKER_HIT_RADIUS {
                continue;
            }
            if best.is_none_or(|(_, d)| distance <= d) {
                best = Some((id, distance));
            }
        }
        best.map(|(id, _)| id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(n: usize) -> Vec<Label> {
        (0..n)
            .map(|i| {
                let f = (i as f32 + 1.0) / (n as f32 + 1.0);
                Label::new(LabelId::new(format!("l{i}")), f, f, PositionType::In)
            })
            .collect()
    }

    fn overlay(throttle: bool, threshold: usize) -> LabelOverlay {
        LabelOverlay::new(
            OverlayConfig {
                hide_labels_when_zooming_count: threshold,
            },
            Box::new(StaticRenderPolicy(throttle)),
        )
    }

    #[test]
    fn test_tap_routing_table() {
        let p = Point::new(0.4, 0.6);
        let id = LabelId::new("a");

        assert_eq!(
            route_tap(PointerButton::Left, None, p),
            Some(LabelAction::Create {
                position: p,
                position_type: PositionType::In
            })
        );
        assert_eq!(
            route_tap(PointerButton::Right, None, p),
            Some(LabelAction::Create {
                position: p,
                position_type: PositionType::Out
            })
        );
        assert_eq!(route_tap(PointerButton::Middle, None, p), None);
        assert_eq!(
            route_tap(PointerButton::Right, Some(&id), p),
            Some(LabelAction::Delete(id.clone()))
        );
        assert_eq!(
            route_tap(PointerButton::Middle, Some(&id), p),
            Some(LabelAction::TogglePositionType(id.clone()))
        );
        assert_eq!(
            route_tap(PointerButton::Left, Some(&id), p),
            Some(LabelAction::Focus(id))
        );
    }

    #[test]
    fn test_layout_positions_and_counter_scale() {
        let mut overlay = overlay(false, 10);
        let labels = vec![Label::new("a".into(), 0.5, 0.25, PositionType::Out)];
        let state = ViewportState::new(0.25, 0.0, 2.0);
        let focused = LabelId::new("a");

        let markers = overlay.layout(
            &labels,
            ImageMetrics::new(400, 400),
            Size::new(1000.0, 1000.0),
            &state,
            Some(&focused),
        );

        assert_eq!(markers.len(), 1);
        let m = &markers[0];
        assert_eq!(m.number, 1);
        assert_eq!(m.screen, Point::new(250.0 + 400.0, 200.0));
        assert_eq!(m.counter_scale, 0.5);
        assert_eq!(m.position_type, PositionType::Out);
        assert!(m.focused);
    }

    #[test]
    fn test_hit_test_uses_screen_radius() {
        let mut overlay = overlay(false, 10);
        let labels = vec![Label::new("a".into(), 0.5, 0.5, PositionType::In)];
        let state = ViewportState::new(0.0, 0.0, 1.0);
        overlay.layout(
            &labels,
            ImageMetrics::new(200, 200),
            Size::new(200.0, 200.0),
            &state,
            None,
        );

        assert_eq!(overlay.hit_test(Point::new(105.0, 100.0)), Some(LabelId::new("a")));
        let outside = Point::new(100.0, 100.0 + MARKER_HIT_RADIUS + 1.0);
        assert_eq!(overlay.hit_test(outside), None);
    }

    #[test]
    fn test_hit_test_prefers_closest() {
        let mut overlay = overlay(false, 10);
        let labels = vec![
            Label::new("a".into(), 0.50, 0.5, PositionType::In),
            Label::new("b".into(), 0.55, 0.5, PositionType::In),
        ];
        overlay.layout(
            &labels,
            ImageMetrics::new(200, 200),
            Size::new(200.0, 200.0),
            &ViewportState::default(),
            None,
        );

        // a at x=100, b at x=110
        assert_eq!(overlay.hit_test(Point::new(108.0, 100.0)), Some(LabelId::new("b")));
        assert_eq!(overlay.hit_test(Point::new(102.0, 100.0)), Some(LabelId::new("a")));
    }

    #[test]
    fn test_labels_hidden_between_zoom_events_when_throttled() {
        let mut overlay = overlay(true, 5);
        let labels = labels(6);

        overlay.observe(&AreaEvent::ZoomStart { scale: 1.0 }, labels.len());
        assert!(!overlay.labels_visible());
        let markers = overlay.layout(
            &labels,
            ImageMetrics::new(100, 100),
            Size::new(100.0, 100.0),
            &ViewportState::default(),
            None,
        );
        assert!(markers.is_empty());
        assert_eq!(
            overlay.hit_test(Point::new(100.0 / 7.0, 100.0 / 7.0)),
            Some(LabelId::new("l0"))
        );

        overlay.observe(&AreaEvent::Zooming { scale: 1.5 }, labels.len());
        assert!(!overlay.labels_visible());

        overlay.observe(&AreaEvent::ZoomEnd { scale: 1.5 }, labels.len());
        assert!(overlay.labels_visible());
    }

    #[test]
    fn test_labels_stay_visible_below_threshold_or_without_throttle() {
        let mut below = overlay(true, 5);
        below.observe(&AreaEvent::ZoomStart { scale: 1.0 }, 5);
        assert!(below.labels_visible());

        let mut fast = overlay(false, 5);
        fast.observe(&AreaEvent::ZoomStart { scale: 1.0 }, 50);
        assert!(fast.labels_visible());
    }
}
