//! Label data model and the optimistic label store.
//!
//! Labels are point annotations placed on an image in normalized coordinates.
//! Mutations are applied locally first and confirmed or rolled back once the
//! server answers, so every label carries a [`LabelStatus`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::TRANSIENT_ID_PREFIX;
use crate::coordinate_space::Point;

/// Opaque label identifier, server-assigned or transient.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelId(pub String);

impl LabelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create a transient id for a label the server has not confirmed yet.
    pub fn transient(n: u64) -> Self {
        Self(format!("{TRANSIENT_ID_PREFIX}{n}"))
    }

    /// Check if this id was created locally and not yet replaced.
    pub fn is_transient(&self) -> bool {
        self.0.starts_with(TRANSIENT_ID_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LabelId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Whether a marker is placed inside or outside the text region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionType {
    #[default]
    In,
    Out,
}

impl PositionType {
    /// The other position type.
    pub fn toggled(self) -> Self {
        match self {
            PositionType::In => PositionType::Out,
            PositionType::Out => PositionType::In,
        }
    }
}

/// Synchronisation status of a label with the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelStatus {
    /// In sync with the server
    #[default]
    Pending,
    /// Created locally, waiting for the server id
    Creating,
    /// A change is being saved
    Saving,
    /// Delete requested, waiting for confirmation
    Deleting,
    /// The last save failed
    Error,
}

/// The two collaborative text fields of a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextField {
    Translation,
    Proofread,
}

/// A point annotation on an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub id: LabelId,
    /// Normalized x in [0, 1]
    pub x: f32,
    /// Normalized y in [0, 1]
    pub y: f32,
    #[serde(default)]
    pub position_type: PositionType,
    #[serde(default)]
    pub status: LabelStatus,
    #[serde(default)]
    pub translation: String,
    #[serde(default)]
    pub proofread: String,
}

impl Label {
    pub fn new(id: LabelId, x: f32, y: f32, position_type: PositionType) -> Self {
        Self {
            id,
            x,
            y,
            position_type,
            status: LabelStatus::Pending,
            translation: String::new(),
            proofread: String::new(),
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Get the text of one field.
    pub fn text(&self, field: TextField) -> &str {
        match field {
            TextField::Translation => &self.translation,
            TextField::Proofread => &self.proofread,
        }
    }

    /// Replace the text of one field.
    pub fn set_text(&mut self, field: TextField, text: String) {
        match field {
            TextField::Translation => self.translation = text,
            TextField::Proofread => self.proofread = text,
        }
    }
}

/// Ordered label collection with optimistic mutations.
///
/// Order is creation order; it drives the list and next/prev navigation.
#[derive(Debug, Clone, Default)]
pub struct LabelStore {
    labels: Vec<Label>,
    next_transient: u64,
}

impl LabelStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store from labels already known to the server.
    pub fn from_labels(labels: Vec<Label>) -> Self {
        Self {
            labels,
            next_transient: 0,
        }
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Ids in display order.
    pub fn ids(&self) -> Vec<LabelId> {
        self.labels.iter().map(|l| l.id.clone()).collect()
    }

    pub fn get(&self, id: &LabelId) -> Option<&Label> {
        self.labels.iter().find(|l| &l.id == id)
    }

    pub fn get_mut(&mut self, id: &LabelId) -> Option<&mut Label> {
        self.labels.iter_mut().find(|l| &l.id == id)
    }

    /// Position of a label in display order.
    pub fn index_of(&self, id: &LabelId) -> Option<usize> {
        self.labels.iter().position(|l| &l.id == id)
    }

    /// Add a label locally with a transient id and `Creating` status.
    pub fn create_optimistic(&mut self, position: Point, position_type: PositionType) -> LabelId {
        self.next_transient += 1;
        let id = LabelId::transient(self.next_transient);
        let mut label = Label::new(id.clone(), position.x, position.y, position_type);
        label.status = LabelStatus::Creating;
        self.labels.push(label);
        log::debug!("Created label {} at ({:.3}, {:.3})", id, position.x, position.y);
        id
    }

    /// Replace a transient id with the server id.
    ///
    /// Returns false if the transient label no longer exists.
    pub fn confirm_create(&mut self, transient: &LabelId, server_id: LabelId) -> bool {
        let Some(label) = self.get_mut(transient) else {
            return false;
        };
        label.id = server_id;
        label.status = LabelStatus::Pending;
        true
    }

    /// Remove a label whose creation failed.
    pub fn fail_create(&mut self, transient: &LabelId) -> Option<Label> {
        self.remove(transient)
    }

    /// Move a label locally without touching its status.
    pub fn place(&mut self, id: &LabelId, position: Point) -> bool {
        let Some(label) = self.get_mut(id) else {
            return false;
        };
        let position = position.clamp_unit();
        label.x = position.x;
        label.y = position.y;
        true
    }

    /// Move a label locally and mark it as saving.
    pub fn set_position(&mut self, id: &LabelId, position: Point) -> bool {
        self.place(id, position) && self.set_status(id, LabelStatus::Saving)
    }

    /// Change a label's position type locally and mark it as saving.
    pub fn toggle_position_type(&mut self, id: &LabelId) -> Option<PositionType> {
        let label = self.get_mut(id)?;
        label.position_type = label.position_type.toggled();
        label.status = LabelStatus::Saving;
        Some(label.position_type)
    }

    /// Set a label's position type without touching its status.
    pub fn set_position_type(&mut self, id: &LabelId, position_type: PositionType) -> bool {
        let Some(label) = self.get_mut(id) else {
            return false;
        };
        label.position_type = position_type;
        true
    }

    /// Update a text field locally. Status is left to the save tracker.
    pub fn set_text(&mut self, id: &LabelId, field: TextField, text: String) -> bool {
        let Some(label) = self.get_mut(id) else {
            return false;
        };
        label.set_text(field, text);
        true
    }

    pub fn set_status(&mut self, id: &LabelId, status: LabelStatus) -> bool {
        let Some(label) = self.get_mut(id) else {
            return false;
        };
        label.status = status;
        true
    }

    /// Mark a label as being deleted.
    ///
    /// Returns the status it had before, for restoring on failure.
    pub fn begin_delete(&mut self, id: &LabelId) -> Option<LabelStatus> {
        let label = self.get_mut(id)?;
        let previous = label.status;
        label.status = LabelStatus::Deleting;
        Some(previous)
    }

    /// Remove a label after the server confirmed its deletion.
    pub fn confirm_delete(&mut self, id: &LabelId) -> Option<Label> {
        self.remove(id)
    }

    /// Restore a label whose deletion failed.
    pub fn fail_delete(&mut self, id: &LabelId, previous: LabelStatus) -> bool {
        self.set_status(id, previous)
    }

    fn remove(&mut self, id: &LabelId) -> Option<Label> {
        let index = self.index_of(id)?;
        Some(self.labels.remove(index))
    }
}
