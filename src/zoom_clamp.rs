//! Scale bounds and zoom-to-point mathematics.
//!
//! This module contains the mathematical functions for zoom operations,
//! extracted for testability and reusability.

use serde::{Deserialize, Serialize};

use crate::constants::{
    MAX_SCALE_FLOOR, MAX_SCALE_VIEWPORT_FACTOR, MIN_SCALE_VIEWPORT_DIVISOR, SCALE_STEP_DIVISIONS,
};
use crate::coordinate_space::{ImageMetrics, Point, Size, ViewportState};

/// Allowed scale range for an image shown in a viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleBounds {
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

impl ScaleBounds {
    /// Derive bounds from the viewport and image sizes.
    ///
    /// Returns `None` while the image has no dimensions yet; callers keep
    /// their previous bounds in that case.
    pub fn compute(viewport: Size, image: ImageMetrics) -> Option<Self> {
        if image.is_empty() {
            return None;
        }
        let image = image.size();

        let min = (viewport.width / MIN_SCALE_VIEWPORT_DIVISOR / image.width)
            .min(viewport.height / MIN_SCALE_VIEWPORT_DIVISOR / image.height);
        let max = (MAX_SCALE_VIEWPORT_FACTOR * viewport.width / image.width)
            .max(MAX_SCALE_VIEWPORT_FACTOR * viewport.height / image.height)
            .max(MAX_SCALE_FLOOR);
        let step = (min + max) / SCALE_STEP_DIVISIONS;

        Some(Self { min, max, step })
    }

    /// Clamp a requested scale into the bounds.
    pub fn clamp(&self, scale: f32) -> f32 {
        self.min.max(self.max.min(scale))
    }

    /// Scale change for a single zoom-button press at the current scale.
    ///
    /// Grows with the current scale so each press feels similar at any
    /// magnification.
    pub fn step_scale(&self, current: f32) -> f32 {
        self.step * current.max(1.0).sqrt()
    }

    /// One zoom-in step from `current`, clamped.
    pub fn zoom_in(&self, current: f32) -> f32 {
        self.clamp(current + self.step_scale(current))
    }

    /// One zoom-out step from `current`, clamped.
    pub fn zoom_out(&self, current: f32) -> f32 {
        self.clamp(current - self.step_scale(current))
    }

    /// Largest scale at which the whole image fits in the viewport, clamped.
    pub fn fit_scale(&self, viewport: Size, image: ImageMetrics) -> f32 {
        let image = image.size();
        self.clamp((viewport.width / image.width).min(viewport.height / image.height))
    }
}

impl Default for ScaleBounds {
    /// Bounds used before any image has loaded.
    fn default() -> Self {
        Self {
            min: 0.1,
            max: MAX_SCALE_FLOOR,
            step: (0.1 + MAX_SCALE_FLOOR) / SCALE_STEP_DIVISIONS,
        }
    }
}

/// Change the scale while keeping a viewport point fixed on screen.
///
/// `center` is given in viewport fractions. The content point under it before
/// the zoom stays under it afterwards.
pub fn zoom_about(state: &ViewportState, new_scale: f32, center: Point) -> ViewportState {
    let ratio = new_scale / state.scale;
    ViewportState {
        pan_x: center.x - (center.x - state.pan_x) * ratio,
        pan_y: center.y - (center.y - state.pan_y) * ratio,
        scale: new_scale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinate_space::{to_normalized, to_screen};

    const EPSILON: f32 = 0.0001;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn test_bounds_for_reference_scene() {
        let bounds =
            ScaleBounds::compute(Size::new(800.0, 600.0), ImageMetrics::new(1600, 1200)).unwrap();

        assert!(approx_eq(bounds.min, 0.1));
        // max(1.0, 1.0) * 2 = 2.0, floored up to 3.0
        assert!(approx_eq(bounds.max, 3.0));
        assert!(approx_eq(bounds.step, 0.124));
        assert_eq!(bounds.clamp(10.0), 3.0);
    }

    #[test]
    fn test_bounds_for_small_image_exceed_floor() {
        let bounds =
            ScaleBounds::compute(Size::new(800.0, 600.0), ImageMetrics::new(100, 100)).unwrap();

        assert!(approx_eq(bounds.min, 1.2));
        assert!(approx_eq(bounds.max, 16.0));
    }

    #[test]
    fn test_bounds_require_loaded_image() {
        assert!(ScaleBounds::compute(Size::new(800.0, 600.0), ImageMetrics::new(0, 100)).is_none());
        assert!(ScaleBounds::compute(Size::new(800.0, 600.0), ImageMetrics::new(100, 0)).is_none());
    }

    #[test]
    fn test_clamp_is_idempotent() {
        let bounds = ScaleBounds {
            min: 0.2,
            max: 4.0,
            step: 0.168,
        };
        for s in [-1.0, 0.0, 0.1, 0.2, 1.0, 3.99, 4.0, 100.0] {
            let once = bounds.clamp(s);
            assert_eq!(bounds.clamp(once), once);
        }
    }

    #[test]
    fn test_bounds_monotonic_in_viewport_size() {
        let image = ImageMetrics::new(1000, 1400);
        let mut previous: Option<ScaleBounds> = None;

        for w in (200..=3000).step_by(200) {
            let viewport = Size::new(w as f32, w as f32 * 0.75);
            let bounds = ScaleBounds::compute(viewport, image).unwrap();
            assert!(bounds.max >= MAX_SCALE_FLOOR);
            assert!(bounds.min < bounds.max);
            if let Some(prev) = previous {
                assert!(bounds.max >= prev.max);
                assert!(bounds.min >= prev.min);
            }
            previous = Some(bounds);
        }
    }

    #[test]
    fn test_step_scale_is_monotonic() {
        let bounds = ScaleBounds::default();
        let mut last = 0.0;
        for i in 0..60 {
            let step = bounds.step_scale(i as f32 * 0.1);
            assert!(step >= last);
            last = step;
        }
    }

    #[test]
    fn test_zoom_steps_stay_in_bounds() {
        let bounds = ScaleBounds::default();

        let mut scale = 1.0;
        for _ in 0..100 {
            scale = bounds.zoom_in(scale);
        }
        assert_eq!(scale, bounds.max);

        for _ in 0..100 {
            scale = bounds.zoom_out(scale);
        }
        assert_eq!(scale, bounds.min);
    }

    #[test]
    fn test_fit_scale() {
        let viewport = Size::new(800.0, 600.0);
        let image = ImageMetrics::new(1600, 1200);
        let bounds = ScaleBounds::compute(viewport, image).unwrap();

        assert!(approx_eq(bounds.fit_scale(viewport, image), 0.5));
    }

    #[test]
    fn test_zoom_about_keeps_center_fixed() {
        let viewport = Size::new(800.0, 600.0);
        let image = ImageMetrics::new(1600, 1200);
        let state = ViewportState::new(0.1, -0.1, 0.5);
        let center = Point::new(0.25, 0.75);
        let screen = Point::new(center.x * viewport.width, center.y * viewport.height);

        let before = to_normalized(screen, image, viewport, &state);
        let zoomed = zoom_about(&state, 1.7, center);
        let after = to_normalized(screen, image, viewport, &zoomed);

        assert_eq!(zoomed.scale, 1.7);
        assert!(approx_eq(before.x, after.x));
        assert!(approx_eq(before.y, after.y));

        let back = to_screen(after, image, viewport, &zoomed);
        assert!((back.x - screen.x).abs() < 0.01);
    }

    #[test]
    fn test_zoom_about_same_scale_is_noop() {
        let state = ViewportState::new(0.2, 0.4, 1.3);
        let zoomed = zoom_about(&state, 1.3, Point::new(0.9, 0.1));
        assert!(approx_eq(zoomed.pan_x, state.pan_x));
        assert!(approx_eq(zoomed.pan_y, state.pan_y));
    }
}
