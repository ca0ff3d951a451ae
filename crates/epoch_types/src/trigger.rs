//! Event markers attached to an epoch.

use serde::{Deserialize, Serialize};

/// A single event marker: a position relative to the epoch start, a
/// nonzero code, and an optional free-text description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub position: i64,
    pub code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Trigger {
    pub fn new(position: i64, code: i32) -> Self {
        Self {
            position,
            code,
            description: None,
        }
    }

    pub fn with_description(position: i64, code: i32, description: impl Into<String>) -> Self {
        Self {
            position,
            code,
            description: Some(description.into()),
        }
    }
}

/// The ordered trigger list of one epoch.
///
/// `file_position` records where the epoch starts in the medium it was read
/// from; it travels with the list so downstream stages can report positions
/// in source coordinates. Trigger code 0 is reserved and cannot be stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerList {
    file_position: i64,
    entries: Vec<Trigger>,
}

impl TriggerList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty list for an epoch starting at `file_position`.
    pub fn at_file_position(file_position: i64) -> Self {
        Self {
            file_position,
            entries: Vec::new(),
        }
    }

    /// Absolute start point of the owning epoch in its source medium.
    pub fn file_position(&self) -> i64 {
        self.file_position
    }

    pub fn set_file_position(&mut self, file_position: i64) {
        self.file_position = file_position;
    }

    /// Appends a trigger. Code 0 is reserved and rejected.
    pub fn push(&mut self, trigger: Trigger) {
        assert!(trigger.code != 0, "trigger code 0 is reserved");
        self.entries.push(trigger);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Trigger] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Trigger> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Appends every trigger of `other` with its position shifted by
    /// `delta`. Used when epochs are concatenated along the point axis.
    pub fn extend_offset(&mut self, other: &TriggerList, delta: i64) {
        for trigger in other.iter() {
            self.entries.push(Trigger {
                position: trigger.position + delta,
                code: trigger.code,
                description: trigger.description.clone(),
            });
        }
    }
}
