//! Customizable hotkeys for the label viewer.
//!
//! Bindings map a key plus modifiers to a [`ViewerAction`]. Recording new
//! bindings is left to the host UI; this module only stores, resolves and
//! checks them.

use serde::{Deserialize, Serialize};

/// Keys that can be bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
    Q,
    R,
    S,
    T,
    U,
    V,
    W,
    X,
    Y,
    Z,
    Key0,
    Key1,
    Key2,
    Key3,
    Key4,
    Key5,
    Key6,
    Key7,
    Key8,
    Key9,
    Tab,
    Enter,
    Escape,
    Space,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Minus,
    Equal,
    BracketLeft,
    BracketRight,
}

/// Modifier keys held with a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Modifiers {
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        shift: false,
        alt: false,
        meta: false,
    };

    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        ..Modifiers::NONE
    };

    pub const CTRL: Modifiers = Modifiers {
        ctrl: true,
        ..Modifiers::NONE
    };
}

/// A key with its modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hotkey {
    pub key: KeyCode,
    #[serde(default)]
    pub modifiers: Modifiers,
}

impl Hotkey {
    pub const fn new(key: KeyCode, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }

    /// A key without modifiers.
    pub const fn plain(key: KeyCode) -> Self {
        Self::new(key, Modifiers::NONE)
    }

    /// Display string such as `Ctrl+Shift+Tab`.
    pub fn display(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if self.modifiers.ctrl {
            parts.push("Ctrl");
        }
        if self.modifiers.alt {
            parts.push("Alt");
        }
        if self.modifiers.shift {
            parts.push("Shift");
        }
        if self.modifiers.meta {
            parts.push("Meta");
        }
        parts.push(key_to_string(self.key));
        parts.join("+")
    }
}

/// Actions a hotkey can trigger in the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewerAction {
    FocusNext,
    FocusPrev,
    ZoomIn,
    ZoomOut,
    ResetView,
}

impl ViewerAction {
    /// Get the display name for this action.
    pub fn name(&self) -> &'static str {
        match self {
            ViewerAction::FocusNext => "Next label",
            ViewerAction::FocusPrev => "Previous label",
            ViewerAction::ZoomIn => "Zoom in",
            ViewerAction::ZoomOut => "Zoom out",
            ViewerAction::ResetView => "Reset view",
        }
    }

    /// Get all bindable actions.
    pub fn all() -> &'static [ViewerAction] {
        &[
            ViewerAction::FocusNext,
            ViewerAction::FocusPrev,
            ViewerAction::ZoomIn,
            ViewerAction::ZoomOut,
            ViewerAction::ResetView,
        ]
    }
}

/// Hotkey configuration for the viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyBindings {
    pub focus_next: Hotkey,
    pub focus_prev: Hotkey,
    pub zoom_in: Hotkey,
    pub zoom_out: Hotkey,
    pub reset_view: Hotkey,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            focus_next: Hotkey::plain(KeyCode::Tab),
            focus_prev: Hotkey::new(KeyCode::Tab, Modifiers::SHIFT),
            zoom_in: Hotkey::plain(KeyCode::Equal),
            zoom_out: Hotkey::plain(KeyCode::Minus),
            reset_view: Hotkey::plain(KeyCode::Key0),
        }
    }
}

impl KeyBindings {
    /// Create new keybindings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the action bound to a hotkey, if any.
    pub fn action_for(&self, hotkey: Hotkey) -> Option<ViewerAction> {
        ViewerAction::all()
            .iter()
            .copied()
            .find(|action| self.hotkey_for(*action) == hotkey)
    }

    /// Get the hotkey bound to an action.
    pub fn hotkey_for(&self, action: ViewerAction) -> Hotkey {
        match action {
            ViewerAction::FocusNext => self.focus_next,
            ViewerAction::FocusPrev => self.focus_prev,
            ViewerAction::ZoomIn => self.zoom_in,
            ViewerAction::ZoomOut => self.zoom_out,
            ViewerAction::ResetView => self.reset_view,
        }
    }

    /// Bind an action to a hotkey.
    pub fn set(&mut self, action: ViewerAction, hotkey: Hotkey) {
        match action {
            ViewerAction::FocusNext => self.focus_next = hotkey,
            ViewerAction::FocusPrev => self.focus_prev = hotkey,
            ViewerAction::ZoomIn => self.zoom_in = hotkey,
            ViewerAction::ZoomOut => self.zoom_out = hotkey,
            ViewerAction::ResetView => self.reset_view = hotkey,
        }
    }

    /// Check if a hotkey is already used by another action.
    /// Returns the conflicting action, if any.
    pub fn conflict(&self, hotkey: Hotkey, exclude: Option<ViewerAction>) -> Option<ViewerAction> {
        ViewerAction::all()
            .iter()
            .copied()
            .filter(|action| Some(*action) != exclude)
            .find(|action| self.hotkey_for(*action) == hotkey)
    }
}

/// Convert a KeyCode to a display string.
pub fn key_to_string(key: KeyCode) -> &'static str {
    match key {
        KeyCode::A => "A",
        KeyCode::B => "B",
        KeyCode::C => "C",
        KeyCode::D => "D",
        KeyCode::E => "E",
        KeyCode::F => "F",
        KeyCode::G => "G",
        KeyCode::H => "H",
        KeyCode::I => "I",
        KeyCode::J => "J",
        KeyCode::K => "K",
        KeyCode::L => "L",
        KeyCode::M => "M",
        KeyCode::N => "N",
        KeyCode::O => "O",
        KeyCode::P => "P",
        KeyCode::Q => "Q",
        KeyCode::R => "R",
        KeyCode::S => "S",
        KeyCode::T => "T",
        KeyCode::U => "U",
        KeyCode::V => "V",
        KeyCode::W => "W",
        KeyCode::X => "X",
        KeyCode::Y => "Y",
        KeyCode::Z => "Z",
        KeyCode::Key0 => "0",
        KeyCode::Key1 => "1",
        KeyCode::Key2 => "2",
        KeyCode::Key3 => "3",
        KeyCode::Key4 => "4",
        KeyCode::Key5 => "5",
        KeyCode::Key6 => "6",
        KeyCode::Key7 => "7",
        KeyCode::Key8 => "8",
        KeyCode::Key9 => "9",
        KeyCode::Tab => "Tab",
        KeyCode::Enter => "Enter",
        KeyCode::Escape => "Esc",
        KeyCode::Space => "Space",
        KeyCode::ArrowUp => "Up",
        KeyCode::ArrowDown => "Down",
        KeyCode::ArrowLeft => "Left",
        KeyCode::ArrowRight => "Right",
        KeyCode::Minus => "-",
        KeyCode::Equal => "=",
        KeyCode::BracketLeft => "[",
        KeyCode::BracketRight => "]",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bindings_resolve() {
        let bindings = KeyBindings::default();
        assert_eq!(
            bindings.action_for(Hotkey::plain(KeyCode::Tab)),
            Some(ViewerAction::FocusNext)
        );
        assert_eq!(
            bindings.action_for(Hotkey::new(KeyCode::Tab, Modifiers::SHIFT)),
            Some(ViewerAction::FocusPrev)
        );
        assert_eq!(bindings.action_for(Hotkey::new(KeyCode::Tab, Modifiers::CTRL)), None);
        assert_eq!(bindings.action_for(Hotkey::plain(KeyCode::Q)), None);
    }

    #[test]
    fn test_defaults_have_no_conflicts() {
        let bindings = KeyBindings::default();
        for action in ViewerAction::all() {
            let hotkey = bindings.hotkey_for(*action);
            assert_eq!(bindings.conflict(hotkey, Some(*action)), None, "{:?}", action);
        }
    }

    #[test]
    fn test_rebind_and_conflict() {
        let mut bindings = KeyBindings::default();
        bindings.set(ViewerAction::ZoomIn, Hotkey::plain(KeyCode::BracketRight));
        assert_eq!(
            bindings.action_for(Hotkey::plain(KeyCode::BracketRight)),
            Some(ViewerAction::ZoomIn)
        );
        assert_eq!(bindings.action_for(Hotkey::plain(KeyCode::Equal)), None);

        assert_eq!(
            bindings.conflict(Hotkey::plain(KeyCode::Minus), Some(ViewerAction::ZoomIn)),
            Some(ViewerAction::ZoomOut)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Hotkey::new(KeyCode::Tab, Modifiers::SHIFT).display(), "Shift+Tab");
        assert_eq!(Hotkey::plain(KeyCode::Equal).display(), "=");
        let all = Modifiers {
            ctrl: true,
            shift: true,
            alt: true,
            meta: false,
        };
        assert_eq!(Hotkey::new(KeyCode::K, all).display(), "Ctrl+Alt+Shift+K");
    }

    #[test]
    fn test_hotkey_json_defaults_modifiers() {
        let hotkey: Hotkey = serde_json::from_str(r#"{"key":"Tab"}"#).unwrap();
        assert_eq!(hotkey, Hotkey::plain(KeyCode::Tab));
    }
}
