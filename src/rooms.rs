//! Room directory
//!
//! The set of known room names. Membership is never stored here: it is
//! derived from the connection registry's current-room field, which
//! rules out the two ever disagreeing.

use crate::types::DEFAULT_ROOM;

/// Insertion-ordered set of room names
///
/// The default room exists from the start and cannot be removed; rooms
/// are created on demand and never destroyed, even when empty. Names
/// are case-sensitive.
#[derive(Debug)]
pub struct RoomDirectory {
    names: Vec<String>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self {
            names: vec![DEFAULT_ROOM.to_string()],
        }
    }

    /// Ensure a room exists, returning whether it was newly created
    pub fn ensure(&mut self, name: &str) -> bool {
        if self.names.iter().any(|n| n == name) {
            return false;
        }
        self.names.push(name.to_string());
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Room names in insertion order, the default room first
    pub fn list(&self) -> Vec<String> {
        self.names.clone()
    }
}

impl Default for RoomDirectory {
    fn default() -> Self {
        Self::new()
    }
}
