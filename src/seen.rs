//! Per-message read receipts
//!
//! Tracks which users have acknowledged viewing each message. Inserts
//! are idempotent; the `changed` flag lets the dispatcher broadcast
//! only when the set actually grew, bounding notification volume.

use std::collections::HashMap;

use crate::types::{ConnectionId, MessageId};

/// Result of marking a message seen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenUpdate {
    /// Whether this call added the user to the set
    pub changed: bool,
    /// The full seen set after the call, in acknowledgment order
    pub seen_by: Vec<ConnectionId>,
}

/// Per-message set of users who have acknowledged it
#[derive(Debug, Default)]
pub struct SeenTracker {
    seen: HashMap<MessageId, Vec<ConnectionId>>,
}

impl SeenTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a user has seen a message
    ///
    /// Re-marking an already-present user is a no-op with
    /// `changed: false`.
    pub fn mark_seen(&mut self, message_id: MessageId, user_id: ConnectionId) -> SeenUpdate {
        let users = self.seen.entry(message_id).or_default();
        let changed = !users.contains(&user_id);
        if changed {
            users.push(user_id);
        }
        SeenUpdate {
            changed,
            seen_by: users.clone(),
        }
    }

    /// The seen set for a message, if anyone has acknowledged it
    pub fn get(&self, message_id: MessageId) -> Option<&Vec<ConnectionId>> {
        self.seen.get(&message_id)
    }
}
