//! Bounded message history
//!
//! Time-ordered store of recent messages, capped so memory stays flat
//! under load. History is volatile: nothing survives a restart.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::message::ChatMessage;
use crate::types::MessageId;

/// Maximum number of messages retained; oldest evicted first.
pub const HISTORY_CAP: usize = 100;

/// Messages returned per history page.
pub const PAGE_SIZE: usize = 20;

/// Bounded FIFO message store
///
/// Append order equals delivery order within a room, so the deque's
/// order is the only ordering the server guarantees. Private messages
/// are stored too (the dispatcher resolves seen/reaction audiences from
/// them) but never match a room page.
#[derive(Debug, Default)]
pub struct MessageStore {
    messages: VecDeque<ChatMessage>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message, evicting from the front while over capacity
    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push_back(message);
        while self.messages.len() > HISTORY_CAP {
            self.messages.pop_front();
        }
    }

    /// Look up a retained message by id
    ///
    /// Returns `None` once the message has been evicted.
    pub fn get(&self, id: MessageId) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Page of room history before a timestamp cursor
    ///
    /// Returns up to `limit` messages addressed to `room` with
    /// `timestamp < before`, oldest-to-newest, taken from the tail of
    /// the matching subset (the most recent qualifying messages). A
    /// missing cursor applies no timestamp filter. Fewer than `limit`
    /// results means the room's history is exhausted.
    pub fn page(
        &self,
        room: &str,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Vec<ChatMessage> {
        let matching: Vec<&ChatMessage> = self
            .messages
            .iter()
            .filter(|m| m.room() == Some(room))
            .filter(|m| before.map_or(true, |cursor| m.timestamp < cursor))
            .collect();
        let skip = matching.len().saturating_sub(limit);
        matching[skip..].iter().map(|m| (*m).clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
