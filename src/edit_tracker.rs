//! Per-field edit tracking with debounced saves and guarded rollback.
//!
//! Every tracked field moves through a small state machine:
//!
//! ```text
//! Clean --edit--> Dirty --debounce elapsed--> Saving --ack--> Clean
//!                   ^                           |
//!                   +---------edit--------------+--fail--> Error (rolled back)
//! ```
//!
//! Each edit bumps the field's generation. A save request carries the
//! generation it was sent with, so a late failure only rolls back when no
//! newer edit has superseded it (last write wins).

use std::collections::BTreeMap;
use std::time::Duration;

use web_time::Instant;

use crate::constants::DEFAULT_SAVE_DEBOUNCE;

/// Where a field is in its save cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPhase {
    /// Displayed value matches the last acknowledged one
    Clean,
    /// Edited locally, waiting for the debounce window to pass
    Dirty { since: Instant },
    /// A save for the current generation is in flight
    Saving,
    /// The last save failed and the value was rolled back
    Error,
}

/// A save the host should send to the server.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest<K, V> {
    pub key: K,
    pub value: V,
    pub generation: u64,
}

#[derive(Debug, Clone)]
struct FieldState<V> {
    /// Value currently displayed
    value: V,
    /// Last value the server acknowledged
    last_good: V,
    generation: u64,
    acked_generation: u64,
    phase: FieldPhase,
}

/// Tracks edits for a set of fields keyed by `K`.
#[derive(Debug, Clone)]
pub struct EditTracker<K, V> {
    fields: BTreeMap<K, FieldState<V>>,
    debounce: Duration,
}

impl<K: Ord + Clone + std::fmt::Debug, V: Clone + PartialEq> EditTracker<K, V> {
    /// Create a tracker with the default debounce window.
    pub fn new() -> Self {
        Self::with_debounce(DEFAULT_SAVE_DEBOUNCE)
    }

    /// Create a tracker with a custom debounce window.
    pub fn with_debounce(debounce: Duration) -> Self {
        Self {
            fields: BTreeMap::new(),
            debounce,
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Start tracking a field at a server-known value. No-op if tracked.
    pub fn track(&mut self, key: K, value: V) {
        self.fields.entry(key).or_insert_with(|| FieldState {
            last_good: value.clone(),
            value,
            generation: 0,
            acked_generation: 0,
            phase: FieldPhase::Clean,
        });
    }

    /// Stop tracking a field (its label was removed).
    pub fn forget(&mut self, key: &K) {
        self.fields.remove(key);
    }

    /// Move a field to a new key (transient id replaced by server id).
    pub fn rename(&mut self, from: &K, to: K) {
        if let Some(state) = self.fields.remove(from) {
            self.fields.insert(to, state);
        }
    }

    pub fn phase(&self, key: &K) -> Option<FieldPhase> {
        self.fields.get(key).map(|f| f.phase)
    }

    pub fn value(&self, key: &K) -> Option<&V> {
        self.fields.get(key).map(|f| &f.value)
    }

    pub fn generation(&self, key: &K) -> Option<u64> {
        self.fields.get(key).map(|f| f.generation)
    }

    /// Check if any field has an edit that was not sent yet.
    pub fn has_pending(&self) -> bool {
        self.fields
            .values()
            .any(|f| matches!(f.phase, FieldPhase::Dirty { .. }))
    }

    /// Record a local edit. Returns false if the field is not tracked.
    pub fn edit(&mut self, key: &K, value: V, now: Instant) -> bool {
        let Some(field) = self.fields.get_mut(key) else {
            log::warn!("Edit for untracked field {:?} ignored", key);
            return false;
        };
        field.value = value;
        field.generation += 1;
        field.phase = FieldPhase::Dirty { since: now };
        true
    }

    /// Record an edit and send it immediately, skipping the debounce window.
    pub fn save_now(&mut self, key: &K, value: V) -> Option<SaveRequest<K, V>> {
        let field = self.fields.get_mut(key)?;
        field.value = value;
        field.generation += 1;
        field.phase = FieldPhase::Saving;
        Some(SaveRequest {
            key: key.clone(),
            value: field.value.clone(),
            generation: field.generation,
        })
    }

    /// Saves whose debounce window has passed at `now`.
    pub fn due(&mut self, now: Instant) -> Vec<SaveRequest<K, V>> {
        self.due_matching(now, |_| true)
    }

    /// Like [`EditTracker::due`], but fields rejected by `sendable` stay dirty.
    pub fn due_matching<P>(&mut self, now: Instant, sendable: P) -> Vec<SaveRequest<K, V>>
    where
        P: Fn(&K) -> bool,
    {
        let debounce = self.debounce;
        self.take_dirty(|key, since| {
            sendable(key) && now.saturating_duration_since(since) >= debounce
        })
    }

    /// All unsent edits, regardless of the debounce window.
    ///
    /// Used when the viewer goes away so pending edits are sent, not dropped.
    pub fn flush(&mut self) -> Vec<SaveRequest<K, V>> {
        self.flush_matching(|_| true)
    }

    /// Like [`EditTracker::flush`], restricted to fields accepted by `sendable`.
    pub fn flush_matching<P>(&mut self, sendable: P) -> Vec<SaveRequest<K, V>>
    where
        P: Fn(&K) -> bool,
    {
        self.take_dirty(|key, _| sendable(key))
    }

    /// Earliest instant at which [`EditTracker::due`] will return a save.
    pub fn next_due(&self) -> Option<Instant> {
        self.fields
            .values()
            .filter_map(|f| match f.phase {
                FieldPhase::Dirty { since } => Some(since + self.debounce),
                _ => None,
            })
            .min()
    }

    fn take_dirty<F>(&mut self, ready: F) -> Vec<SaveRequest<K, V>>
    where
        F: Fn(&K, Instant) -> bool,
    {
        let mut requests = Vec::new();
        for (key, field) in self.fields.iter_mut() {
            if let FieldPhase::Dirty { since } = field.phase {
                if ready(key, since) {
                    field.phase = FieldPhase::Saving;
                    requests.push(SaveRequest {
                        key: key.clone(),
                        value: field.value.clone(),
                        generation: field.generation,
                    });
                }
            }
        }
        requests
    }

    /// The server accepted a save.
    ///
    /// A field that rolled back after a newer save failed is brought back in
    /// line with the server: the acknowledged value becomes the displayed one
    /// and is returned when it differs from what was shown. Otherwise `None`.
    pub fn ack(&mut self, request: &SaveRequest<K, V>) -> Option<V> {
        let field = self.fields.get_mut(&request.key)?;
        if request.generation <= field.acked_generation {
            return None;
        }
        field.acked_generation = request.generation;
        field.last_good = request.value.clone();

        match field.phase {
            FieldPhase::Saving if request.generation == field.generation => {
                field.phase = FieldPhase::Clean;
                None
            }
            FieldPhase::Error => {
                field.phase = FieldPhase::Clean;
                if field.value == request.value {
                    return None;
                }
                log::debug!(
                    "Save of {:?} (generation {}) landed after a newer one failed",
                    request.key,
                    request.generation
                );
                field.value = request.value.clone();
                Some(field.value.clone())
            }
            _ => None,
        }
    }

    /// The server rejected a save.
    ///
    /// Rolls back to the last acknowledged value and returns it, unless a
    /// newer edit superseded the failed one or the displayed value no longer
    /// matches what was sent. In that case nothing changes and `None` is
    /// returned.
    pub fn fail(&mut self, request: &SaveRequest<K, V>) -> Option<V> {
        let field = self.fields.get_mut(&request.key)?;
        if request.generation != field.generation || field.value != request.value {
            log::debug!(
                "Save of {:?} (generation {}) failed but was superseded by generation {}",
                request.key,
                request.generation,
                field.generation
            );
            return None;
        }
        field.value = field.last_good.clone();
        field.phase = FieldPhase::Error;
        Some(field.value.clone())
    }
}

impl<K: Ord + Clone + std::fmt::Debug, V: Clone + PartialEq> Default for EditTracker<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
