//! Global constants for the label viewer.
//!
//! Tunables that shape the feel of zooming, dragging and saving live here so
//! they can be adjusted in one place.

use std::time::Duration;

// =============================================================================
// Scale bounds
// =============================================================================

/// The smallest allowed scale shows the image at one fifth of the viewport.
pub const MIN_SCALE_VIEWPORT_DIVISOR: f32 = 5.0;

/// The largest allowed scale shows the image at twice the viewport size.
pub const MAX_SCALE_VIEWPORT_FACTOR: f32 = 2.0;

/// Floor for the largest allowed scale, so small images can always be
/// magnified at least this much.
pub const MAX_SCALE_FLOOR: f32 = 3.0;

/// Number of steps between the smallest and largest scale.
pub const SCALE_STEP_DIVISIONS: f32 = 25.0;

// =============================================================================
// Interaction
// =============================================================================

/// Pointer travel (screen pixels) below which a press/release is a tap.
pub const TAP_SLOP: f32 = 4.0;

/// Marker hit radius in screen pixels. Markers keep a constant on-screen size,
/// so the radius does not depend on zoom.
pub const MARKER_HIT_RADIUS: f32 = 12.0;

/// Default fraction of the scaled content that must stay inside the viewport.
pub const DEFAULT_KEEP_IN_VIEW: f32 = 0.1;

/// Wheel zoom factor per notch.
pub const DEFAULT_WHEEL_ZOOM_FACTOR: f32 = 1.1;

/// Idle time after the last wheel notch before a wheel zoom burst ends.
pub const WHEEL_ZOOM_END_DELAY: Duration = Duration::from_millis(200);

// =============================================================================
// Rendering and saving
// =============================================================================

/// Label count above which labels may be hidden while zooming.
pub const DEFAULT_HIDE_LABELS_WHEN_ZOOMING_COUNT: usize = 30;

/// Idle window after the last keystroke before a text field is saved.
pub const DEFAULT_SAVE_DEBOUNCE: Duration = Duration::from_millis(800);

/// Prefix of ids given to labels the server has not confirmed yet.
pub const TRANSIENT_ID_PREFIX: &str = "tmp-";
