//! Conversions between normalized label coordinates and screen coordinates.
//!
//! Three coordinate systems are involved:
//! - **normalized**: fractions (0..1) of the image width/height, independent of zoom
//! - **image**: natural image pixels
//! - **screen**: pixels relative to the top-left corner of the viewport
//!
//! Pan is stored as a fraction of the viewport size, so the image's top-left
//! corner sits at `(pan_x * viewport_w, pan_y * viewport_h)` on screen.

use serde::{Deserialize, Serialize};

/// A 2D point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Calculate distance to another point.
    pub fn distance_to(&self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Clamp both axes to [0, 1].
    pub fn clamp_unit(self) -> Self {
        Self::new(self.x.clamp(0.0, 1.0), self.y.clamp(0.0, 1.0))
    }
}

/// A width/height pair in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// True when either side is zero or negative.
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// An axis-aligned rectangle in screen space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Get the center point of the rectangle.
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Check if a point is inside the rectangle.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }
}

/// Natural pixel dimensions of a loaded image.
///
/// Set once when the image finishes loading and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetrics {
    pub natural_width: u32,
    pub natural_height: u32,
}

impl ImageMetrics {
    pub fn new(natural_width: u32, natural_height: u32) -> Self {
        Self {
            natural_width,
            natural_height,
        }
    }

    /// Image size as floating point pixels.
    pub fn size(&self) -> Size {
        Size::new(self.natural_width as f32, self.natural_height as f32)
    }

    /// An image with a zero side has not finished loading.
    pub fn is_empty(&self) -> bool {
        self.natural_width == 0 || self.natural_height == 0
    }
}

/// Pan/zoom state of a viewport.
///
/// `pan_x`/`pan_y` are fractions of the viewport width/height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportState {
    pub pan_x: f32,
    pub pan_y: f32,
    pub scale: f32,
}

impl ViewportState {
    pub fn new(pan_x: f32, pan_y: f32, scale: f32) -> Self {
        Self {
            pan_x,
            pan_y,
            scale,
        }
    }
}

impl Default for ViewportState {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0)
    }
}

/// Convert a normalized label coordinate to a screen position.
pub fn to_screen(
    normalized: Point,
    image: ImageMetrics,
    viewport: Size,
    state: &ViewportState,
) -> Point {
    let image = image.size();
    Point::new(
        state.pan_x * viewport.width + normalized.x * image.width * state.scale,
        state.pan_y * viewport.height + normalized.y * image.height * state.scale,
    )
}

/// Convert a screen position to a normalized label coordinate.
///
/// Positions outside the image are clamped onto its border instead of being
/// rejected; viewport edges are reachable while zoomed out.
pub fn to_normalized(
    screen: Point,
    image: ImageMetrics,
    viewport: Size,
    state: &ViewportState,
) -> Point {
    unclamped_normalized(screen, image, viewport, state).clamp_unit()
}

/// Inverse of [`to_screen`] without clamping.
pub(crate) fn unclamped_normalized(
    screen: Point,
    image: ImageMetrics,
    viewport: Size,
    state: &ViewportState,
) -> Point {
    let image = image.size();
    Point::new(
        (screen.x - state.pan_x * viewport.width) / (image.width * state.scale),
        (screen.y - state.pan_y * viewport.height) / (image.height * state.scale),
    )
}

/// Screen rectangle covered by the image.
pub fn image_rect(image: ImageMetrics, viewport: Size, state: &ViewportState) -> Rect {
    let image = image.size();
    Rect::new(
        state.pan_x * viewport.width,
        state.pan_y * viewport.height,
        image.width * state.scale,
        image.height * state.scale,
    )
}

/// Pan that places a normalized point at the center of the viewport.
pub fn center_pan_on(
    normalized: Point,
    image: ImageMetrics,
    viewport: Size,
    scale: f32,
) -> (f32, f32) {
    let image = image.size();
    (
        0.5 - normalized.x * image.width * scale / viewport.width,
        0.5 - normalized.y * image.height * scale / viewport.height,
    )
}
