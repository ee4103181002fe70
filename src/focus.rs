//! Focus synchronisation between the label list, the overlay and text inputs.
//!
//! A focus transition names the label and the effects it should trigger.
//! Each requested effect bumps its noise counter, even when the focused id
//! does not change, so focusing the same label twice still re-runs effects.
//! Consumers watch `(focused_id, noise[effect])` through an [`EffectWatcher`].

use bitflags::bitflags;

use crate::label::LabelId;

bitflags! {
    /// Effects a focus transition asks its consumers to perform.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FocusEffects: u8 {
        /// Overlay recenters on and highlights the label
        const FOCUS_LABEL = 1;
        /// Text input takes keyboard focus
        const FOCUS_INPUT = 1 << 1;
        /// Side list scrolls the item into view
        const SCROLL_INTO_VIEW = 1 << 2;
    }
}

impl FocusEffects {
    /// Index of a single effect in the noise counter array.
    fn slot(self) -> Option<usize> {
        if self == Self::FOCUS_LABEL {
            Some(0)
        } else if self == Self::FOCUS_INPUT {
            Some(1)
        } else if self == Self::SCROLL_INTO_VIEW {
            Some(2)
        } else {
            None
        }
    }
}

/// Number of distinct effects.
const EFFECT_COUNT: usize = 3;

/// Shared focus state. One writer (the coordinator), many readers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FocusState {
    pub focused_id: Option<LabelId>,
    /// Effects requested by the most recent transition
    pub effects: FocusEffects,
    noise: [u64; EFFECT_COUNT],
}

impl FocusState {
    /// Noise counter of a single effect. Returns 0 for combined flags.
    pub fn noise(&self, effect: FocusEffects) -> u64 {
        effect.slot().map_or(0, |slot| self.noise[slot])
    }
}

/// Owns the focus state of one viewer.
#[derive(Debug, Clone, Default)]
pub struct FocusSyncCoordinator {
    state: FocusState,
}

impl FocusSyncCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &FocusState {
        &self.state
    }

    pub fn focused_id(&self) -> Option<&LabelId> {
        self.state.focused_id.as_ref()
    }

    /// Focus a label and trigger `effects`.
    pub fn focus(&mut self, id: LabelId, effects: FocusEffects) {
        log::trace!("Focus {} with {:?}", id, effects);
        self.state.focused_id = Some(id);
        self.state.effects = effects;
        for effect in effects.iter() {
            if let Some(slot) = effect.slot() {
                self.state.noise[slot] += 1;
            }
        }
    }

    /// Focus the label after the current one, wrapping to the first.
    ///
    /// Without a current focus the first label is taken. Returns the newly
    /// focused id, or `None` if `order` is empty.
    pub fn next(&mut self, order: &[LabelId], effects: FocusEffects) -> Option<LabelId> {
        let index = match self.current_index(order) {
            Some(i) => (i + 1) % order.len(),
            None => 0,
        };
        self.focus_index(order, index, effects)
    }

    /// Focus the label before the current one, wrapping to the last.
    pub fn prev(&mut self, order: &[LabelId], effects: FocusEffects) -> Option<LabelId> {
        let index = match self.current_index(order) {
            Some(i) => (i + order.len() - 1) % order.len(),
            None => order.len().checked_sub(1)?,
        };
        self.focus_index(order, index, effects)
    }

    fn current_index(&self, order: &[LabelId]) -> Option<usize> {
        let focused = self.state.focused_id.as_ref()?;
        order.iter().position(|id| id == focused)
    }

    fn focus_index(
        &mut self,
        order: &[LabelId],
        index: usize,
        effects: FocusEffects,
    ) -> Option<LabelId> {
        let id = order.get(index)?.clone();
        self.focus(id.clone(), effects);
        Some(id)
    }

    /// Drop the focus without triggering effects.
    pub fn clear(&mut self) {
        self.state.focused_id = None;
        self.state.effects = FocusEffects::empty();
    }

    /// Drop the focus if it points at a removed label.
    pub fn forget(&mut self, id: &LabelId) {
        if self.state.focused_id.as_ref() == Some(id) {
            self.clear();
        }
    }

    /// Follow a label whose transient id was replaced by its server id.
    /// Effects are not re-run.
    pub fn rename(&mut self, from: &LabelId, to: &LabelId) {
        if self.state.focused_id.as_ref() == Some(from) {
            self.state.focused_id = Some(to.clone());
        }
    }
}

/// A consumer's view of one focus effect.
///
/// [`EffectWatcher::poll`] fires once per trigger of its effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectWatcher {
    effect: FocusEffects,
    seen: u64,
}

impl EffectWatcher {
    /// Watch a single effect, ignoring triggers that happened before.
    pub fn new(effect: FocusEffects, state: &FocusState) -> Self {
        Self {
            effect,
            seen: state.noise(effect),
        }
    }

    pub fn effect(&self) -> FocusEffects {
        self.effect
    }

    /// Return the label to act on if the effect fired since the last poll.
    pub fn poll(&mut self, state: &FocusState) -> Option<LabelId> {
        let noise = state.noise(self.effect);
        if noise == self.seen {
            return None;
        }
        self.seen = noise;
        if !state.effects.contains(self.effect) {
            return None;
        }
        state.focused_id.clone()
    }
}
