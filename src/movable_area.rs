//! Pan/zoom controller for a rectangular viewport.
//!
//! The controller owns the [`ViewportState`] and the [`ScaleBounds`] of one
//! viewport. Pan and zoom are tracked as two independent gesture state
//! machines so a pinch can move and scale at the same time.
//!
//! Every operation queues [`AreaEvent`]s; the owner drains them with
//! [`MovableAreaController::take_events`] after handling an input.

use crate::constants::DEFAULT_KEEP_IN_VIEW;
use crate::coordinate_space::{self, ImageMetrics, Point, Size, ViewportState};
use crate::zoom_clamp::{self, ScaleBounds};

/// Behaviour switches for a controller instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovableAreaConfig {
    /// Keep part of the content inside the viewport after every move.
    pub limit_in_area: bool,
    /// Fraction of the scaled content that must overlap the viewport when
    /// `limit_in_area` is set.
    pub keep_in_view: f32,
}

impl Default for MovableAreaConfig {
    fn default() -> Self {
        Self {
            limit_in_area: true,
            keep_in_view: DEFAULT_KEEP_IN_VIEW,
        }
    }
}

/// Pan drag interaction state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PanGesture {
    /// Not dragging
    #[default]
    Idle,
    /// Dragging; `origin` is the pan before the drag started and `last` the
    /// last pointer position (screen space).
    Dragging { origin: (f32, f32), last: Point },
}

/// Zoom interaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZoomGesture {
    #[default]
    Idle,
    Zooming,
}

/// Handle for undoing a completed move.
///
/// Only valid while no newer move has completed on the same controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveReset {
    generation: u64,
    origin: (f32, f32),
}

impl MoveReset {
    /// Pan the controller had before the move.
    pub fn origin(&self) -> (f32, f32) {
        self.origin
    }
}

/// Events emitted by the controller. Positions are pan values (viewport
/// fractions).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AreaEvent {
    MoveStart { x: f32, y: f32 },
    Moving { x: f32, y: f32 },
    MoveEnd { x: f32, y: f32, reset: MoveReset },
    ZoomStart { scale: f32 },
    Zooming { scale: f32 },
    ZoomEnd { scale: f32 },
}

/// Requested zoom, optionally anchored at a viewport point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomTarget {
    pub scale: f32,
    /// Anchor in viewport fractions ([0, 1] on both axes). `None` keeps the
    /// current pan.
    pub center: Option<Point>,
}

impl ZoomTarget {
    pub fn new(scale: f32) -> Self {
        Self {
            scale,
            center: None,
        }
    }

    pub fn at(scale: f32, center: Point) -> Self {
        Self {
            scale,
            center: Some(center),
        }
    }
}

/// Docking position along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dock {
    /// Left or top
    Start,
    Center,
    /// Right or bottom
    End,
}

/// A viewport edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Top,
    Bottom,
    Left,
    Right,
}

/// Options for [`MovableAreaController::closest_margins`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MarginOptions {
    /// Snap an axis to [`Dock::Center`] when the content center is within this
    /// fraction of the viewport size from the viewport center.
    pub center_tolerance: Option<f32>,
}

/// Distances (screen pixels) from each content side to the matching
/// viewport edge, plus the resulting docking decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestMargins {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
    pub x: Dock,
    pub y: Dock,
    /// The single closest edge. Ties go to top/bottom before left/right.
    pub nearest: Edge,
}

/// Owns pan and zoom for one viewport.
#[derive(Debug, Clone)]
pub struct MovableAreaController {
    config: MovableAreaConfig,
    viewport: Size,
    content: Option<ImageMetrics>,
    state: ViewportState,
    bounds: ScaleBounds,
    pan: PanGesture,
    zoom: ZoomGesture,
    /// Incremented on every completed move.
    move_generation: u64,
    /// Content was fitted to a non-empty viewport at least once
    fitted: bool,
    events: Vec<AreaEvent>,
}

impl MovableAreaController {
    /// Create a controller for a viewport of the given size with no content.
    pub fn new(viewport: Size, config: MovableAreaConfig) -> Self {
        Self {
            config,
            viewport,
            content: None,
            state: ViewportState::default(),
            bounds: ScaleBounds::default(),
            pan: PanGesture::Idle,
            zoom: ZoomGesture::Idle,
            move_generation: 0,
            fitted: false,
            events: Vec::new(),
        }
    }

    pub fn state(&self) -> ViewportState {
        self.state
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn content(&self) -> Option<ImageMetrics> {
        self.content
    }

    pub fn bounds(&self) -> ScaleBounds {
        self.bounds
    }

    pub fn config(&self) -> MovableAreaConfig {
        self.config
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.pan, PanGesture::Dragging { .. })
    }

    pub fn is_zooming(&self) -> bool {
        self.zoom == ZoomGesture::Zooming
    }

    /// Drain queued events.
    pub fn take_events(&mut self) -> Vec<AreaEvent> {
        std::mem::take(&mut self.events)
    }

    // ------------------------------------------------------------------------
    // Size and content
    // ------------------------------------------------------------------------

    /// Set the content (image) shown in the viewport and fit it.
    ///
    /// With an empty viewport the fit waits for the first
    /// [`MovableAreaController::update_size`].
    pub fn set_content(&mut self, content: ImageMetrics) {
        self.content = Some(content);
        self.fitted = false;
        if self.viewport.is_empty() {
            log::debug!("Viewport has no size yet, deferring fit");
            return;
        }
        if let Some(bounds) = ScaleBounds::compute(self.viewport, content) {
            self.bounds = bounds;
            log::debug!(
                "Content {}x{}: scale bounds {:.3}..{:.3} step {:.3}",
                content.natural_width,
                content.natural_height,
                bounds.min,
                bounds.max,
                bounds.step
            );
            self.fit();
        }
    }

    /// React to a new viewport size.
    ///
    /// Bounds are recomputed; a scale that falls outside them is clamped and
    /// the content re-centered. Content that was never fitted is fitted now.
    pub fn update_size(&mut self, viewport: Size) {
        self.viewport = viewport;
        if viewport.is_empty() {
            return;
        }
        let Some(content) = self.content else {
            return;
        };
        let Some(bounds) = ScaleBounds::compute(viewport, content) else {
            return;
        };
        self.bounds = bounds;
        if !self.fitted {
            self.fit();
            return;
        }

        let clamped = bounds.clamp(self.state.scale);
        if clamped != self.state.scale {
            log::debug!(
                "Viewport resized to {}x{}: scale {:.3} -> {:.3}",
                viewport.width,
                viewport.height,
                self.state.scale,
                clamped
            );
            self.state.scale = clamped;
            self.center_content();
        }
    }

    /// Fit the whole content into the viewport and center it.
    pub fn fit(&mut self) {
        let Some(content) = self.content else {
            return;
        };
        if self.viewport.is_empty() {
            return;
        }
        self.state.scale = self.bounds.fit_scale(self.viewport, content);
        self.center_content();
        self.fitted = true;
    }

    fn center_content(&mut self) {
        if let Some((w, h)) = self.scaled_content_fraction() {
            self.state.pan_x = 0.5 - w / 2.0;
            self.state.pan_y = 0.5 - h / 2.0;
        }
    }

    /// Content size at the current scale, as fractions of the viewport.
    fn scaled_content_fraction(&self) -> Option<(f32, f32)> {
        if self.viewport.is_empty() {
            return None;
        }
        let content = self.content?.size();
        Some((
            content.width * self.state.scale / self.viewport.width,
            content.height * self.state.scale / self.viewport.height,
        ))
    }

    // ------------------------------------------------------------------------
    // Moving
    // ------------------------------------------------------------------------

    /// Pan by a screen-space delta in one step.
    pub fn move_by(&mut self, dx: f32, dy: f32) {
        if self.viewport.is_empty() {
            return;
        }
        let target = (
            self.state.pan_x + dx / self.viewport.width,
            self.state.pan_y + dy / self.viewport.height,
        );
        self.move_to(target.0, target.1);
    }

    /// Set the pan (viewport fractions) in one step.
    pub fn move_to(&mut self, pan_x: f32, pan_y: f32) {
        let origin = (self.state.pan_x, self.state.pan_y);
        self.events.push(AreaEvent::MoveStart {
            x: origin.0,
            y: origin.1,
        });
        let (x, y) = self.limited(pan_x, pan_y);
        self.state.pan_x = x;
        self.state.pan_y = y;
        self.finish_move(origin);
    }

    /// Move so that a normalized content point sits at the viewport center.
    pub fn center_on(&mut self, normalized: Point) {
        let Some(content) = self.content else {
            return;
        };
        if self.viewport.is_empty() {
            return;
        }
        let (x, y) =
            coordinate_space::center_pan_on(normalized, content, self.viewport, self.state.scale);
        self.move_to(x, y);
    }

    /// Start a pan drag at a screen position.
    pub fn begin_drag(&mut self, position: Point) {
        if self.is_dragging() {
            return;
        }
        let origin = (self.state.pan_x, self.state.pan_y);
        self.pan = PanGesture::Dragging {
            origin,
            last: position,
        };
        self.events.push(AreaEvent::MoveStart {
            x: origin.0,
            y: origin.1,
        });
    }

    /// Continue a pan drag. The area limit is not enforced until release.
    pub fn drag_to(&mut self, position: Point) {
        let PanGesture::Dragging { origin, last } = self.pan else {
            return;
        };
        if self.viewport.is_empty() {
            return;
        }
        self.state.pan_x += (position.x - last.x) / self.viewport.width;
        self.state.pan_y += (position.y - last.y) / self.viewport.height;
        self.pan = PanGesture::Dragging {
            origin,
            last: position,
        };
        self.events.push(AreaEvent::Moving {
            x: self.state.pan_x,
            y: self.state.pan_y,
        });
    }

    /// Finish a pan drag, applying the area limit.
    pub fn end_drag(&mut self) {
        let PanGesture::Dragging { origin, .. } = self.pan else {
            return;
        };
        self.pan = PanGesture::Idle;
        let (x, y) = self.limited(self.state.pan_x, self.state.pan_y);
        self.state.pan_x = x;
        self.state.pan_y = y;
        self.finish_move(origin);
    }

    fn finish_move(&mut self, origin: (f32, f32)) {
        self.move_generation += 1;
        let reset = MoveReset {
            generation: self.move_generation,
            origin,
        };
        self.events.push(AreaEvent::MoveEnd {
            x: self.state.pan_x,
            y: self.state.pan_y,
            reset,
        });
    }

    /// Revert a completed move.
    ///
    /// Does nothing and returns `false` if another move has completed since,
    /// or a drag is in progress.
    pub fn reset(&mut self, reset: &MoveReset) -> bool {
        if reset.generation != self.move_generation || self.is_dragging() {
            log::debug!(
                "Ignoring stale move reset (generation {} != {})",
                reset.generation,
                self.move_generation
            );
            return false;
        }
        self.state.pan_x = reset.origin.0;
        self.state.pan_y = reset.origin.1;
        true
    }

    /// Clamp a pan so at least `keep_in_view` of the content stays visible.
    fn limited(&self, pan_x: f32, pan_y: f32) -> (f32, f32) {
        if !self.config.limit_in_area {
            return (pan_x, pan_y);
        }
        let Some((w, h)) = self.scaled_content_fraction() else {
            return (pan_x, pan_y);
        };
        let keep_x = (w * self.config.keep_in_view).min(1.0);
        let keep_y = (h * self.config.keep_in_view).min(1.0);
        (
            pan_x.clamp(keep_x - w, 1.0 - keep_x),
            pan_y.clamp(keep_y - h, 1.0 - keep_y),
        )
    }

    // ------------------------------------------------------------------------
    // Zooming
    // ------------------------------------------------------------------------

    /// Start a zoom gesture (pinch or wheel burst).
    pub fn begin_zoom(&mut self) {
        if self.is_zooming() {
            return;
        }
        self.zoom = ZoomGesture::Zooming;
        self.events.push(AreaEvent::ZoomStart {
            scale: self.state.scale,
        });
    }

    /// Finish a zoom gesture, applying the area limit.
    pub fn end_zoom(&mut self) {
        if !self.is_zooming() {
            return;
        }
        self.zoom = ZoomGesture::Idle;
        if !self.is_dragging() {
            let (x, y) = self.limited(self.state.pan_x, self.state.pan_y);
            self.state.pan_x = x;
            self.state.pan_y = y;
        }
        self.events.push(AreaEvent::ZoomEnd {
            scale: self.state.scale,
        });
    }

    /// Zoom to a target scale, clamped into the current bounds.
    ///
    /// Outside a zoom gesture this is a complete start/zooming/end sequence.
    pub fn zoom(&mut self, target: ZoomTarget) {
        let standalone = !self.is_zooming();
        if standalone {
            self.begin_zoom();
        }

        let scale = self.bounds.clamp(target.scale);
        self.state = match target.center {
            Some(center) => zoom_clamp::zoom_about(&self.state, scale, center),
            None => ViewportState {
                scale,
                ..self.state
            },
        };
        self.events.push(AreaEvent::Zooming { scale });

        if standalone {
            self.end_zoom();
        }
    }

    /// Zoom with an updater computing the new scale from the current one.
    pub fn zoom_with<F>(&mut self, center: Option<Point>, update: F)
    where
        F: FnOnce(f32) -> f32,
    {
        let scale = update(self.state.scale);
        self.zoom(ZoomTarget { scale, center });
    }

    /// One zoom-button step in, anchored at the viewport center.
    pub fn zoom_in(&mut self) {
        let bounds = self.bounds;
        self.zoom_with(Some(Point::new(0.5, 0.5)), |s| bounds.zoom_in(s));
    }

    /// One zoom-button step out, anchored at the viewport center.
    pub fn zoom_out(&mut self) {
        let bounds = self.bounds;
        self.zoom_with(Some(Point::new(0.5, 0.5)), |s| bounds.zoom_out(s));
    }

    // ------------------------------------------------------------------------
    // Docking
    // ------------------------------------------------------------------------

    /// Find the viewport edges the content is closest to.
    ///
    /// Within an axis a tie goes to the start edge (left/top). For the single
    /// nearest edge a tie goes to top/bottom before left/right.
    pub fn closest_margins(&self, options: MarginOptions) -> ClosestMargins {
        let (w, h) = self.scaled_content_fraction().unwrap_or((0.0, 0.0));
        let vw = self.viewport.width;
        let vh = self.viewport.height;

        let left = self.state.pan_x * vw;
        let top = self.state.pan_y * vh;
        let right = vw - (left + w * vw);
        let bottom = vh - (top + h * vh);

        let dock = |start: f32, end: f32, extent: f32, size: f32| {
            if let Some(tolerance) = options.center_tolerance {
                let center = start + extent / 2.0;
                if (center - size / 2.0).abs() <= tolerance * size {
                    return Dock::Center;
                }
            }
            if start <= end { Dock::Start } else { Dock::End }
        };

        let x = dock(left, right, w * vw, vw);
        let y = dock(top, bottom, h * vh, vh);

        let mut nearest = (Edge::Top, top);
        for candidate in [(Edge::Bottom, bottom), (Edge::Left, left), (Edge::Right, right)] {
            if candidate.1 < nearest.1 {
                nearest = candidate;
            }
        }

        ClosestMargins {
            left,
            right,
            top,
            bottom,
            x,
            y,
            nearest: nearest.0,
        }
    }
}
