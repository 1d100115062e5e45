//! Reaction aggregation
//!
//! Per-message multiset of (emoji -> users who reacted). A user may
//! react with many distinct emojis but contributes at most one entry
//! per emoji per message.

use std::collections::HashMap;

use crate::message::ReactionMap;
use crate::types::{ConnectionId, MessageId};

/// Aggregated reactions across all messages
#[derive(Debug, Default)]
pub struct ReactionAggregator {
    reactions: HashMap<MessageId, ReactionMap>,
}

impl ReactionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a reaction, deduplicating per user per emoji
    ///
    /// A repeated (message, emoji, user) triple is a silent no-op.
    /// Returns the full updated reaction map for the message so the
    /// dispatcher can broadcast complete state rather than deltas.
    pub fn add(&mut self, message_id: MessageId, emoji: &str, user_id: ConnectionId) -> &ReactionMap {
        let per_message = self.reactions.entry(message_id).or_default();
        let users = per_message.entry(emoji.to_string()).or_default();
        if !users.contains(&user_id) {
            users.push(user_id);
        }
        per_message
    }

    /// Current reaction state for a message, if any
    pub fn get(&self, message_id: MessageId) -> Option<&ReactionMap> {
        self.reactions.get(&message_id)
    }
}
