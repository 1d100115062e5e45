//! Typing indicator set
//!
//! Ephemeral record of who is presently composing input. Entries come
//! and go with client typing signals and are swept on disconnect; the
//! full snapshot is broadcast on every change rather than deltas, which
//! is fine at the set sizes involved.

use crate::types::ConnectionId;

/// Users currently typing, in the order they started
#[derive(Debug, Default)]
pub struct TypingSet {
    typing: Vec<(ConnectionId, String)>,
}

impl TypingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a typing signal
    ///
    /// On `true`, inserts or refreshes the entry; on `false`, removes
    /// it. Returns whether the snapshot changed.
    pub fn set_typing(&mut self, id: ConnectionId, username: &str, is_typing: bool) -> bool {
        if is_typing {
            match self.typing.iter_mut().find(|(conn, _)| *conn == id) {
                Some((_, name)) => {
                    let refreshed = name != username;
                    if refreshed {
                        *name = username.to_string();
                    }
                    refreshed
                }
                None => {
                    self.typing.push((id, username.to_string()));
                    true
                }
            }
        } else {
            self.remove(id)
        }
    }

    /// Drop a connection's entry (idle signal or disconnect)
    pub fn remove(&mut self, id: ConnectionId) -> bool {
        let before = self.typing.len();
        self.typing.retain(|(conn, _)| *conn != id);
        self.typing.len() != before
    }

    /// Usernames currently typing, in start order
    pub fn snapshot(&self) -> Vec<String> {
        self.typing.iter().map(|(_, name)| name.clone()).collect()
    }
}
