//! One viewer per displayed image.
//!
//! [`ImageViewer`] wires the pan/zoom controller, the label overlay, the focus
//! coordinator and the edit trackers together. The host feeds it
//! [`ViewerInput`]s together with the current time, performs the
//! [`LabelRequest`]s it emits and reports their results back through
//! [`ImageViewer::complete`].
//!
//! Every mutation is optimistic: the label store changes first, and a failed
//! request rolls the change back (unless a newer edit has superseded it) and
//! queues a [`Notice`] for the host to show.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use web_time::Instant;

use crate::config::AppConfig;
use crate::constants::{
    DEFAULT_SAVE_DEBOUNCE, DEFAULT_WHEEL_ZOOM_FACTOR, TAP_SLOP, WHEEL_ZOOM_END_DELAY,
};
use crate::coordinate_space::{self, ImageMetrics, Point, Size, ViewportState};
use crate::edit_tracker::{EditTracker, FieldPhase, SaveRequest};
use crate::error::{RequestError, Result, ViewerError};
use crate::focus::{EffectWatcher, FocusEffects, FocusState, FocusSyncCoordinator};
use crate::keybindings::{Hotkey, KeyBindings, ViewerAction};
use crate::label::{Label, LabelId, LabelStatus, LabelStore, PositionType, TextField};
use crate::label_overlay::{
    self, LabelAction, LabelOverlay, MarkerLayout, OverlayConfig, PointerButton, RenderPolicy,
    StaticRenderPolicy,
};
use crate::movable_area::{MovableAreaConfig, MovableAreaController, ZoomTarget};
use crate::zoom_clamp::ScaleBounds;

#[cfg(test)]
mod tests;

// =============================================================================
// Inputs and outputs
// =============================================================================

/// An input event from the host UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewerInput {
    /// The image finished loading with these natural dimensions
    ImageLoaded { width: u32, height: u32 },
    /// The image could not be loaded
    ImageFailed { reason: String },
    /// The viewport changed size
    Resize { width: f32, height: f32 },
    PointerDown {
        button: PointerButton,
        position: Point,
    },
    PointerMove { position: Point },
    PointerUp { position: Point },
    /// Mouse wheel; negative `delta_y` zooms in
    Wheel { delta_y: f32, position: Point },
    PinchStart { center: Point },
    /// `scale_factor` is relative to the scale when the pinch started
    PinchUpdate { scale_factor: f32, center: Point },
    PinchEnd,
    Hotkey { hotkey: Hotkey },
    /// A label was clicked in the side list
    ListClick { id: LabelId },
    /// A text field of a label was edited
    EditText {
        id: LabelId,
        field: TextField,
        text: String,
    },
}

/// Identifies a request the host performs on behalf of the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What the server is asked to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RequestBody {
    /// `label` is the transient id to be replaced by the server id
    Create {
        label: LabelId,
        x: f32,
        y: f32,
        position_type: PositionType,
    },
    UpdatePosition {
        label: LabelId,
        x: f32,
        y: f32,
    },
    UpdatePositionType {
        label: LabelId,
        position_type: PositionType,
    },
    UpdateText {
        label: LabelId,
        field: TextField,
        text: String,
    },
    Delete {
        label: LabelId,
    },
}

/// A label mutation for the host to send to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRequest {
    pub id: RequestId,
    #[serde(flatten)]
    pub body: RequestBody,
}

/// Successful result of a [`LabelRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestOutcome {
    /// A create succeeded and the server assigned an id
    Created { server_id: LabelId },
    Done,
}

/// A user-visible message, typically shown as a toast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub label: Option<LabelId>,
    pub message: String,
}

/// Side effects the host UI should perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", content = "label", rename_all = "snake_case")]
pub enum HostEffect {
    /// Scroll the side list so the label is visible
    ScrollIntoView(LabelId),
    /// Give keyboard focus to the label's text input
    FocusInput(LabelId),
}

/// Serializable view of the viewer, for hosts and session replays.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewerSnapshot {
    pub loading: bool,
    pub viewport: Size,
    pub state: ViewportState,
    pub bounds: Option<ScaleBounds>,
    pub labels_visible: bool,
    pub focused: Option<LabelId>,
    pub labels: Vec<Label>,
    pub in_flight: usize,
    pub pending_saves: bool,
}

// =============================================================================
// Configuration
// =============================================================================

/// Runtime settings of a viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    pub area: MovableAreaConfig,
    pub overlay: OverlayConfig,
    /// Answer of the default render policy
    pub throttle_rendering: bool,
    pub save_debounce: Duration,
    pub wheel_zoom_factor: f32,
    pub keybindings: KeyBindings,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            area: MovableAreaConfig::default(),
            overlay: OverlayConfig::default(),
            throttle_rendering: false,
            save_debounce: DEFAULT_SAVE_DEBOUNCE,
            wheel_zoom_factor: DEFAULT_WHEEL_ZOOM_FACTOR,
            keybindings: KeyBindings::default(),
        }
    }
}

impl From<&AppConfig> for ViewerConfig {
    fn from(config: &AppConfig) -> Self {
        let prefs = &config.preferences;
        Self {
            area: prefs.area_config(),
            overlay: prefs.overlay_config(),
            throttle_rendering: prefs.throttle_rendering,
            save_debounce: prefs.save_debounce(),
            wheel_zoom_factor: prefs.wheel_zoom_factor.max(1.0),
            keybindings: config.keybindings.clone(),
        }
    }
}

// =============================================================================
// Internal state
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum ImageState {
    Loading,
    Loaded(ImageMetrics),
    /// Stays a spinner; there is no retry
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
enum PressTarget {
    Area,
    Marker(LabelId),
}

/// A pointer press that has not been released yet.
#[derive(Debug, Clone, PartialEq)]
struct Press {
    button: PointerButton,
    start: Point,
    target: PressTarget,
    /// Moved further than the tap slop
    dragging: bool,
}

/// Bookkeeping for a request awaiting completion.
#[derive(Debug, Clone, PartialEq)]
enum InFlight {
    Create { label: LabelId },
    Position(SaveRequest<LabelId, Point>),
    PositionType(SaveRequest<LabelId, PositionType>),
    Text(SaveRequest<(LabelId, TextField), String>),
    Delete { label: LabelId, previous: LabelStatus },
}

impl InFlight {
    fn label(&self) -> &LabelId {
        match self {
            InFlight::Create { label } | InFlight::Delete { label, .. } => label,
            InFlight::Position(save) => &save.key,
            InFlight::PositionType(save) => &save.key,
            InFlight::Text(save) => &save.key.0,
        }
    }
}

/// Saves for labels still waiting for their server id are held back.
fn is_confirmed(store: &LabelStore, id: &LabelId) -> bool {
    store
        .get(id)
        .is_some_and(|label| label.status != LabelStatus::Creating)
}

fn position_body(save: &SaveRequest<LabelId, Point>) -> RequestBody {
    RequestBody::UpdatePosition {
        label: save.key.clone(),
        x: save.value.x,
        y: save.value.y,
    }
}

fn text_body(save: &SaveRequest<(LabelId, TextField), String>) -> RequestBody {
    RequestBody::UpdateText {
        label: save.key.0.clone(),
        field: save.key.1,
        text: save.value.clone(),
    }
}

// =============================================================================
// Viewer
// =============================================================================

/// Interactive label viewer for one image.
#[derive(Debug)]
pub struct ImageViewer {
    config: ViewerConfig,
    image: ImageState,
    area: MovableAreaController,
    overlay: LabelOverlay,
    focus: FocusSyncCoordinator,
    /// Recenters the viewport on the focused label
    overlay_watcher: EffectWatcher,
    list_watcher: EffectWatcher,
    input_watcher: EffectWatcher,
    store: LabelStore,
    positions: EditTracker<LabelId, Point>,
    position_types: EditTracker<LabelId, PositionType>,
    texts: EditTracker<(LabelId, TextField), String>,
    press: Option<Press>,
    /// Scale when the current pinch started
    pinch_base: Option<f32>,
    /// Time of the last wheel notch of the current burst
    wheel_last: Option<Instant>,
    next_request: u64,
    in_flight: BTreeMap<RequestId, InFlight>,
    outbox: Vec<LabelRequest>,
    notices: Vec<Notice>,
    effects: Vec<HostEffect>,
    mounted: bool,
}

impl ImageViewer {
    /// Create a viewer whose render policy is fixed by the configuration.
    pub fn new(viewport: Size, config: ViewerConfig) -> Self {
        let policy = Box::new(StaticRenderPolicy(config.throttle_rendering));
        Self::with_render_policy(viewport, config, policy)
    }

    /// Create a viewer with a host-provided render policy.
    pub fn with_render_policy(
        viewport: Size,
        config: ViewerConfig,
        policy: Box<dyn RenderPolicy>,
    ) -> Self {
        let focus = FocusSyncCoordinator::new();
        let overlay_watcher = EffectWatcher::new(FocusEffects::FOCUS_LABEL, focus.state());
        let list_watcher = EffectWatcher::new(FocusEffects::SCROLL_INTO_VIEW, focus.state());
        let input_watcher = EffectWatcher::new(FocusEffects::FOCUS_INPUT, focus.state());

        Self {
            image: ImageState::Loading,
            area: MovableAreaController::new(viewport, config.area),
            overlay: LabelOverlay::new(config.overlay, policy),
            focus,
            overlay_watcher,
            list_watcher,
            input_watcher,
            store: LabelStore::new(),
            positions: EditTracker::with_debounce(config.save_debounce),
            position_types: EditTracker::with_debounce(config.save_debounce),
            texts: EditTracker::with_debounce(config.save_debounce),
            press: None,
            pinch_base: None,
            wheel_last: None,
            next_request: 0,
            in_flight: BTreeMap::new(),
            outbox: Vec::new(),
            notices: Vec::new(),
            effects: Vec::new(),
            mounted: true,
            config,
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// The pan/zoom controller.
    pub fn area(&self) -> &MovableAreaController {
        &self.area
    }

    pub fn state(&self) -> ViewportState {
        self.area.state()
    }

    pub fn bounds(&self) -> ScaleBounds {
        self.area.bounds()
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Natural image size, once loaded.
    pub fn image(&self) -> Option<ImageMetrics> {
        match self.image {
            ImageState::Loaded(image) => Some(image),
            _ => None,
        }
    }

    /// True until the image has loaded. A failed image stays loading.
    pub fn is_loading(&self) -> bool {
        !matches!(self.image, ImageState::Loaded(_))
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn labels(&self) -> &[Label] {
        self.store.labels()
    }

    pub fn label(&self, id: &LabelId) -> Option<&Label> {
        self.store.get(id)
    }

    /// Markers from the last layout pass.
    pub fn markers(&self) -> &[MarkerLayout] {
        self.overlay.markers()
    }

    pub fn labels_visible(&self) -> bool {
        self.overlay.labels_visible()
    }

    pub fn focused_id(&self) -> Option<&LabelId> {
        self.focus.focused_id()
    }

    pub fn focus_state(&self) -> &FocusState {
        self.focus.state()
    }

    pub fn position_phase(&self, id: &LabelId) -> Option<FieldPhase> {
        self.positions.phase(id)
    }

    pub fn text_phase(&self, id: &LabelId, field: TextField) -> Option<FieldPhase> {
        self.texts.phase(&(id.clone(), field))
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Check if any edit is waiting for its debounce window.
    pub fn has_pending_saves(&self) -> bool {
        self.positions.has_pending() || self.texts.has_pending()
    }

    /// Earliest instant at which [`ImageViewer::tick`] has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        let wheel = self.wheel_last.map(|last| last + WHEEL_ZOOM_END_DELAY);
        [wheel, self.positions.next_due(), self.texts.next_due()]
            .into_iter()
            .flatten()
            .min()
    }

    /// Drain requests the host should send.
    pub fn take_requests(&mut self) -> Vec<LabelRequest> {
        std::mem::take(&mut self.outbox)
    }

    /// Drain user-visible notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Drain UI effects triggered by focus changes.
    pub fn take_effects(&mut self) -> Vec<HostEffect> {
        std::mem::take(&mut self.effects)
    }

    pub fn snapshot(&self) -> ViewerSnapshot {
        ViewerSnapshot {
            loading: self.is_loading(),
            viewport: self.area.viewport(),
            state: self.area.state(),
            bounds: self.image().map(|_| self.area.bounds()),
            labels_visible: self.overlay.labels_visible(),
            focused: self.focus.focused_id().cloned(),
            labels: self.store.labels().to_vec(),
            in_flight: self.in_flight.len(),
            pending_saves: self.has_pending_saves(),
        }
    }

    // ------------------------------------------------------------------------
    // Host API
    // ------------------------------------------------------------------------

    /// Replace the label collection with labels known to the server.
    pub fn set_labels(&mut self, labels: Vec<Label>) {
        let debounce = self.config.save_debounce;
        self.positions = EditTracker::with_debounce(debounce);
        self.position_types = EditTracker::with_debounce(debounce);
        self.texts = EditTracker::with_debounce(debounce);
        self.store = LabelStore::from_labels(labels);

        let labels = self.store.labels().to_vec();
        for label in &labels {
            self.track(label);
        }
        if let Some(focused) = self.focus.focused_id().cloned() {
            if self.store.get(&focused).is_none() {
                self.focus.clear();
            }
        }
        log::debug!("Loaded {} labels", labels.len());
        self.settle();
    }

    /// Focus a label programmatically.
    pub fn focus(&mut self, id: &LabelId, effects: FocusEffects) -> Result<()> {
        self.ensure_mounted()?;
        self.label_status(id)?;
        self.focus.focus(id.clone(), effects);
        self.settle();
        Ok(())
    }

    /// Handle one input event.
    pub fn handle(&mut self, input: ViewerInput, now: Instant) -> Result<()> {
        self.ensure_mounted()?;
        let result = match input {
            ViewerInput::ImageLoaded { width, height } => {
                self.image_loaded(ImageMetrics::new(width, height));
                Ok(())
            }
            ViewerInput::ImageFailed { reason } => {
                self.image_failed(&reason);
                Ok(())
            }
            ViewerInput::Resize { width, height } => {
                self.resize(Size::new(width, height));
                Ok(())
            }
            ViewerInput::PointerDown { button, position } => self.pointer_down(button, position),
            ViewerInput::PointerMove { position } => self.pointer_move(position),
            ViewerInput::PointerUp { position } => self.pointer_up(position, now),
            ViewerInput::Wheel { delta_y, position } => self.wheel(delta_y, position, now),
            ViewerInput::PinchStart { center } => self.pinch_start(center),
            ViewerInput::PinchUpdate {
                scale_factor,
                center,
            } => self.pinch_update(scale_factor, center),
            ViewerInput::PinchEnd => {
                self.pinch_end();
                Ok(())
            }
            ViewerInput::Hotkey { hotkey } => self.hotkey(hotkey),
            ViewerInput::ListClick { id } => self.list_click(id),
            ViewerInput::EditText { id, field, text } => self.edit_text(id, field, text, now),
        };
        self.settle();
        result
    }

    /// Advance time: send saves whose debounce window passed and end idle
    /// wheel zoom bursts.
    pub fn tick(&mut self, now: Instant) {
        if !self.mounted {
            return;
        }
        if let Some(last) = self.wheel_last {
            if now.saturating_duration_since(last) >= WHEEL_ZOOM_END_DELAY {
                self.wheel_last = None;
                if self.pinch_base.is_none() {
                    self.area.end_zoom();
                }
            }
        }

        let store = &self.store;
        let positions = self
            .positions
            .due_matching(now, |id| is_confirmed(store, id));
        let texts = self
            .texts
            .due_matching(now, |(id, _)| is_confirmed(store, id));

        for save in positions {
            let label = save.key.clone();
            self.send(position_body(&save), InFlight::Position(save));
            self.refresh_status(&label, false);
        }
        for save in texts {
            let label = save.key.0.clone();
            self.send(text_body(&save), InFlight::Text(save));
            self.refresh_status(&label, false);
        }
        self.settle();
    }

    /// Report the result of a request.
    ///
    /// Completions arriving after [`ImageViewer::unmount`] are ignored.
    pub fn complete(
        &mut self,
        id: RequestId,
        result: std::result::Result<RequestOutcome, RequestError>,
    ) -> Result<()> {
        if !self.mounted {
            log::debug!("Ignoring completion of request {} after unmount", id);
            return Ok(());
        }
        let Some(pending) = self.in_flight.remove(&id) else {
            return Err(ViewerError::UnknownRequest(id));
        };
        match result {
            Ok(outcome) => self.request_succeeded(pending, outcome),
            Err(error) => self.request_failed(pending, error),
        }
        self.settle();
        Ok(())
    }

    /// Tear the viewer down.
    ///
    /// Edits still waiting for their debounce window are sent right away and
    /// returned along with any unsent requests. In-flight requests are
    /// cancelled; their completions are ignored. Edits of labels the server
    /// never confirmed cannot be saved and are dropped.
    pub fn unmount(&mut self) -> Vec<LabelRequest> {
        if !self.mounted {
            return Vec::new();
        }

        let store = &self.store;
        let positions = self.positions.flush_matching(|id| is_confirmed(store, id));
        let texts = self
            .texts
            .flush_matching(|(id, _)| is_confirmed(store, id));
        if self.has_pending_saves() {
            log::warn!("Dropping edits of labels that were never confirmed by the server");
        }

        for save in &positions {
            let id = self.next_request_id();
            self.outbox.push(LabelRequest {
                id,
                body: position_body(save),
            });
        }
        for save in &texts {
            let id = self.next_request_id();
            self.outbox.push(LabelRequest {
                id,
                body: text_body(save),
            });
        }

        if !self.in_flight.is_empty() {
            log::debug!("Cancelling {} in-flight requests", self.in_flight.len());
            self.in_flight.clear();
        }
        self.press = None;
        self.pinch_base = None;
        self.wheel_last = None;
        self.mounted = false;
        log::info!("Viewer unmounted");
        std::mem::take(&mut self.outbox)
    }

    // ------------------------------------------------------------------------
    // Image and viewport
    // ------------------------------------------------------------------------

    fn image_loaded(&mut self, image: ImageMetrics) {
        if image.is_empty() {
            log::warn!(
                "Image reported empty size {}x{}",
                image.natural_width,
                image.natural_height
            );
            self.image = ImageState::Failed;
            return;
        }
        if let ImageState::Loaded(current) = self.image {
            log::warn!(
                "Ignoring second image load ({}x{}), keeping {}x{}",
                image.natural_width,
                image.natural_height,
                current.natural_width,
                current.natural_height
            );
            return;
        }
        log::info!(
            "Image loaded: {}x{}",
            image.natural_width,
            image.natural_height
        );
        self.image = ImageState::Loaded(image);
        self.area.set_content(image);
    }

    fn image_failed(&mut self, reason: &str) {
        if self.image().is_some() {
            log::debug!("Ignoring image failure after load: {}", reason);
            return;
        }
        log::warn!("Image failed to load: {}", reason);
        self.image = ImageState::Failed;
    }

    fn resize(&mut self, viewport: Size) {
        if viewport.is_empty() {
            log::debug!(
                "Ignoring empty viewport {}x{}",
                viewport.width,
                viewport.height
            );
            return;
        }
        self.area.update_size(viewport);
    }

    fn loaded_image(&self) -> Result<ImageMetrics> {
        self.image().ok_or(ViewerError::ImageNotLoaded)
    }

    fn normalized(&self, screen: Point, image: ImageMetrics) -> Point {
        coordinate_space::to_normalized(screen, image, self.area.viewport(), &self.area.state())
    }

    /// Screen position as a fraction of the viewport.
    fn viewport_fraction(&self, screen: Point) -> Point {
        let viewport = self.area.viewport();
        if viewport.is_empty() {
            return Point::new(0.5, 0.5);
        }
        Point::new(screen.x / viewport.width, screen.y / viewport.height).clamp_unit()
    }

    // ------------------------------------------------------------------------
    // Pointer
    // ------------------------------------------------------------------------

    fn pointer_down(&mut self, button: PointerButton, position: Point) -> Result<()> {
        self.loaded_image()?;
        let target = match self.overlay.hit_test(position) {
            Some(id) => PressTarget::Marker(id),
            None => PressTarget::Area,
        };
        log::trace!("{:?} press at {:?} on {:?}", button, position, target);
        self.press = Some(Press {
            button,
            start: position,
            target,
            dragging: false,
        });
        Ok(())
    }

    fn pointer_move(&mut self, position: Point) -> Result<()> {
        let image = self.loaded_image()?;
        let Some(press) = self.press.as_mut() else {
            return Ok(());
        };
        let started = !press.dragging;
        if started {
            if press.start.distance_to(position) <= TAP_SLOP {
                return Ok(());
            }
            press.dragging = true;
        }
        let press = press.clone();
        if press.button != PointerButton::Left {
            return Ok(());
        }

        match press.target {
            PressTarget::Area => {
                if started {
                    self.area.begin_drag(press.start);
                }
                self.area.drag_to(position);
            }
            PressTarget::Marker(id) => {
                if self.is_movable(&id) {
                    let normalized = self.normalized(position, image);
                    self.store.place(&id, normalized);
                }
            }
        }
        Ok(())
    }

    fn pointer_up(&mut self, position: Point, now: Instant) -> Result<()> {
        let image = self.loaded_image()?;
        let Some(press) = self.press.take() else {
            return Ok(());
        };

        if press.dragging {
            match (press.button, press.target) {
                (PointerButton::Left, PressTarget::Area) => self.area.end_drag(),
                (PointerButton::Left, PressTarget::Marker(id)) => {
                    if self.is_movable(&id) {
                        let normalized = self.normalized(position, image);
                        self.store.place(&id, normalized);
                        self.commit_position(&id, now);
                    }
                }
                _ => {}
            }
            return Ok(());
        }

        let hit = match &press.target {
            PressTarget::Marker(id) => Some(id),
            PressTarget::Area => None,
        };
        let normalized = self.normalized(position, image);
        match label_overlay::route_tap(press.button, hit, normalized) {
            Some(action) => self.apply(action),
            None => Ok(()),
        }
    }

    fn apply(&mut self, action: LabelAction) -> Result<()> {
        log::debug!("Label action {:?}", action);
        match action {
            LabelAction::Create {
                position,
                position_type,
            } => {
                self.create_label(position, position_type);
                Ok(())
            }
            LabelAction::Delete(id) => self.delete_label(&id),
            LabelAction::TogglePositionType(id) => self.toggle_position_type(&id),
            LabelAction::Focus(id) => {
                self.focus
                    .focus(id, FocusEffects::FOCUS_INPUT | FocusEffects::SCROLL_INTO_VIEW);
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------------
    // Zoom gestures
    // ------------------------------------------------------------------------

    fn wheel(&mut self, delta_y: f32, position: Point, now: Instant) -> Result<()> {
        self.loaded_image()?;
        if delta_y == 0.0 {
            return Ok(());
        }
        self.area.begin_zoom();
        self.wheel_last = Some(now);

        let factor = self.config.wheel_zoom_factor;
        let center = self.viewport_fraction(position);
        self.area.zoom_with(Some(center), |scale| {
            if delta_y < 0.0 {
                scale * factor
            } else {
                scale / factor
            }
        });
        Ok(())
    }

    fn pinch_start(&mut self, center: Point) -> Result<()> {
        self.loaded_image()?;
        self.pinch_base = Some(self.area.state().scale);
        self.area.begin_zoom();
        self.area.begin_drag(center);
        Ok(())
    }

    fn pinch_update(&mut self, scale_factor: f32, center: Point) -> Result<()> {
        self.loaded_image()?;
        let Some(base) = self.pinch_base else {
            return Ok(());
        };
        let anchor = self.viewport_fraction(center);
        self.area.zoom(ZoomTarget::at(base * scale_factor, anchor));
        self.area.drag_to(center);
        Ok(())
    }

    fn pinch_end(&mut self) {
        if self.pinch_base.take().is_none() {
            return;
        }
        self.area.end_zoom();
        self.area.end_drag();
    }

    // ------------------------------------------------------------------------
    // Keyboard, list and text
    // ------------------------------------------------------------------------

    fn hotkey(&mut self, hotkey: Hotkey) -> Result<()> {
        let Some(action) = self.config.keybindings.action_for(hotkey) else {
            log::trace!("Unbound hotkey {}", hotkey.display());
            return Ok(());
        };
        log::debug!("Hotkey {} -> {}", hotkey.display(), action.name());

        match action {
            ViewerAction::FocusNext => {
                let order = self.store.ids();
                self.focus.next(&order, FocusEffects::all());
            }
            ViewerAction::FocusPrev => {
                let order = self.store.ids();
                self.focus.prev(&order, FocusEffects::all());
            }
            ViewerAction::ZoomIn => {
                self.loaded_image()?;
                self.area.zoom_in();
            }
            ViewerAction::ZoomOut => {
                self.loaded_image()?;
                self.area.zoom_out();
            }
            ViewerAction::ResetView => {
                self.loaded_image()?;
                self.area.fit();
            }
        }
        Ok(())
    }

    fn list_click(&mut self, id: LabelId) -> Result<()> {
        self.label_status(&id)?;
        self.focus
            .focus(id, FocusEffects::FOCUS_LABEL | FocusEffects::FOCUS_INPUT);
        Ok(())
    }

    fn edit_text(
        &mut self,
        id: LabelId,
        field: TextField,
        text: String,
        now: Instant,
    ) -> Result<()> {
        if self.label_status(&id)? == LabelStatus::Deleting {
            log::debug!("Ignoring edit of label {} being deleted", id);
            return Ok(());
        }
        self.store.set_text(&id, field, text.clone());
        self.texts.edit(&(id, field), text, now);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Label mutations
    // ------------------------------------------------------------------------

    fn label_status(&self, id: &LabelId) -> Result<LabelStatus> {
        self.store
            .get(id)
            .map(|label| label.status)
            .ok_or_else(|| ViewerError::UnknownLabel(id.clone()))
    }

    fn is_movable(&self, id: &LabelId) -> bool {
        self.store
            .get(id)
            .is_some_and(|label| label.status != LabelStatus::Deleting)
    }

    fn create_label(&mut self, position: Point, position_type: PositionType) {
        let id = self.store.create_optimistic(position, position_type);
        if let Some(label) = self.store.get(&id).cloned() {
            self.track(&label);
        }
        self.focus.focus(
            id.clone(),
            FocusEffects::FOCUS_INPUT | FocusEffects::SCROLL_INTO_VIEW,
        );
        self.send(
            RequestBody::Create {
                label: id.clone(),
                x: position.x,
                y: position.y,
                position_type,
            },
            InFlight::Create { label: id },
        );
    }

    /// Save a label's position after a drag.
    fn commit_position(&mut self, id: &LabelId, now: Instant) {
        let Some(position) = self.store.get(id).map(Label::position) else {
            return;
        };
        if !is_confirmed(&self.store, id) {
            // Sent by the first tick after the server assigns an id
            self.positions.edit(id, position, now);
            return;
        }
        if let Some(save) = self.positions.save_now(id, position) {
            self.send(position_body(&save), InFlight::Position(save));
            self.refresh_status(id, false);
        }
    }

    fn toggle_position_type(&mut self, id: &LabelId) -> Result<()> {
        match self.label_status(id)? {
            LabelStatus::Creating | LabelStatus::Deleting => {
                log::debug!("Ignoring position type change of label {}", id);
                return Ok(());
            }
            _ => {}
        }
        let Some(position_type) = self.store.toggle_position_type(id) else {
            return Err(ViewerError::UnknownLabel(id.clone()));
        };
        if let Some(save) = self.position_types.save_now(id, position_type) {
            self.send(
                RequestBody::UpdatePositionType {
                    label: id.clone(),
                    position_type,
                },
                InFlight::PositionType(save),
            );
        }
        Ok(())
    }

    fn delete_label(&mut self, id: &LabelId) -> Result<()> {
        match self.label_status(id)? {
            LabelStatus::Creating | LabelStatus::Deleting => {
                log::debug!("Ignoring delete of label {}", id);
                return Ok(());
            }
            _ => {}
        }
        let Some(previous) = self.store.begin_delete(id) else {
            return Err(ViewerError::UnknownLabel(id.clone()));
        };
        self.send(
            RequestBody::Delete { label: id.clone() },
            InFlight::Delete {
                label: id.clone(),
                previous,
            },
        );
        Ok(())
    }

    fn track(&mut self, label: &Label) {
        self.positions.track(label.id.clone(), label.position());
        self.position_types
            .track(label.id.clone(), label.position_type);
        for field in [TextField::Translation, TextField::Proofread] {
            self.texts
                .track((label.id.clone(), field), label.text(field).to_string());
        }
    }

    fn forget(&mut self, id: &LabelId) {
        self.positions.forget(id);
        self.position_types.forget(id);
        for field in [TextField::Translation, TextField::Proofread] {
            self.texts.forget(&(id.clone(), field));
        }
        self.focus.forget(id);
    }

    fn rename(&mut self, from: &LabelId, to: &LabelId) {
        self.positions.rename(from, to.clone());
        self.position_types.rename(from, to.clone());
        for field in [TextField::Translation, TextField::Proofread] {
            self.texts.rename(&(from.clone(), field), (to.clone(), field));
        }
        self.focus.rename(from, to);
    }

    // ------------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------------

    fn next_request_id(&mut self) -> RequestId {
        self.next_request += 1;
        RequestId(self.next_request)
    }

    fn send(&mut self, body: RequestBody, pending: InFlight) {
        let id = self.next_request_id();
        log::debug!("Request {}: {:?}", id, body);
        self.in_flight.insert(id, pending);
        self.outbox.push(LabelRequest { id, body });
    }

    /// Derive a label's status from its outstanding requests.
    ///
    /// Labels being created or deleted keep their status.
    fn refresh_status(&mut self, id: &LabelId, failed: bool) {
        let busy = self.in_flight.values().any(|pending| pending.label() == id);
        let Some(label) = self.store.get_mut(id) else {
            return;
        };
        if matches!(label.status, LabelStatus::Creating | LabelStatus::Deleting) {
            return;
        }
        label.status = if failed {
            LabelStatus::Error
        } else if busy {
            LabelStatus::Saving
        } else {
            LabelStatus::Pending
        };
    }

    fn notify(&mut self, label: Option<&LabelId>, message: String) {
        self.notices.push(Notice {
            label: label.cloned(),
            message,
        });
    }

    fn request_succeeded(&mut self, pending: InFlight, outcome: RequestOutcome) {
        match pending {
            InFlight::Create { label } => match outcome {
                RequestOutcome::Created { server_id } => {
                    if self.store.confirm_create(&label, server_id.clone()) {
                        log::debug!("Label {} confirmed as {}", label, server_id);
                        self.rename(&label, &server_id);
                    }
                }
                RequestOutcome::Done => {
                    log::warn!("Create of label {} returned no server id", label);
                    self.drop_created(&label, "Label was not created".to_string());
                }
            },
            InFlight::Position(save) => {
                if let Some(position) = self.positions.ack(&save) {
                    self.store.place(&save.key, position);
                }
                self.refresh_status(&save.key, false);
            }
            InFlight::PositionType(save) => {
                if let Some(position_type) = self.position_types.ack(&save) {
                    self.store.set_position_type(&save.key, position_type);
                }
                self.refresh_status(&save.key, false);
            }
            InFlight::Text(save) => {
                let (id, field) = &save.key;
                if let Some(text) = self.texts.ack(&save) {
                    self.store.set_text(id, *field, text);
                }
                self.refresh_status(id, false);
            }
            InFlight::Delete { label, .. } => {
                if self.store.confirm_delete(&label).is_some() {
                    log::debug!("Label {} deleted", label);
                    self.forget(&label);
                }
            }
        }
    }

    fn request_failed(&mut self, pending: InFlight, error: RequestError) {
        log::warn!("Request for label {} failed: {}", pending.label(), error);
        match pending {
            InFlight::Create { label } => {
                self.drop_created(&label, format!("Failed to create label: {error}"));
            }
            InFlight::Position(save) => match self.positions.fail(&save) {
                Some(previous) => {
                    self.store.place(&save.key, previous);
                    self.refresh_status(&save.key, true);
                    self.notify(Some(&save.key), format!("Failed to move label: {error}"));
                }
                None => self.refresh_status(&save.key, false),
            },
            InFlight::PositionType(save) => match self.position_types.fail(&save) {
                Some(previous) => {
                    self.store.set_position_type(&save.key, previous);
                    self.refresh_status(&save.key, true);
                    self.notify(
                        Some(&save.key),
                        format!("Failed to change label position: {error}"),
                    );
                }
                None => self.refresh_status(&save.key, false),
            },
            InFlight::Text(save) => {
                let (id, field) = &save.key;
                match self.texts.fail(&save) {
                    Some(previous) => {
                        self.store.set_text(id, *field, previous);
                        self.refresh_status(id, true);
                        self.notify(Some(id), format!("Failed to save text: {error}"));
                    }
                    None => self.refresh_status(id, false),
                }
            }
            InFlight::Delete { label, previous } => {
                if self.store.fail_delete(&label, previous) && previous != LabelStatus::Error {
                    self.refresh_status(&label, false);
                }
                self.notify(Some(&label), format!("Failed to delete label: {error}"));
            }
        }
    }

    fn drop_created(&mut self, label: &LabelId, message: String) {
        if self.store.fail_create(label).is_some() {
            self.forget(label);
        }
        self.notify(None, message);
    }

    // ------------------------------------------------------------------------
    // Reactions
    // ------------------------------------------------------------------------

    fn ensure_mounted(&self) -> Result<()> {
        if self.mounted {
            Ok(())
        } else {
            Err(ViewerError::Unmounted)
        }
    }

    /// Propagate state changes to the overlay and focus consumers.
    fn settle(&mut self) {
        self.observe_area_events();

        if let Some(id) = self.overlay_watcher.poll(self.focus.state()) {
            if let Some(position) = self.store.get(&id).map(Label::position) {
                self.area.center_on(position);
                self.observe_area_events();
            }
        }
        if let Some(id) = self.list_watcher.poll(self.focus.state()) {
            self.effects.push(HostEffect::ScrollIntoView(id));
        }
        if let Some(id) = self.input_watcher.poll(self.focus.state()) {
            self.effects.push(HostEffect::FocusInput(id));
        }

        if let ImageState::Loaded(image) = self.image {
            let state = self.area.state();
            self.overlay.layout(
                self.store.labels(),
                image,
                self.area.viewport(),
                &state,
                self.focus.focused_id(),
            );
        }
    }

    fn observe_area_events(&mut self) {
        let label_count = self.store.len();
        for event in self.area.take_events() {
            log::trace!("Area event {:?}", event);
            self.overlay.observe(&event, label_count);
        }
    }
}
