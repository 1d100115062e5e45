//! Connection registry
//!
//! The source of truth for presence: which connections exist, who they
//! are, and which room each one is in. The registry only mutates state;
//! presence broadcasts are the dispatcher's job, so every contract here
//! stays independently testable.

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::client::Client;
use crate::message::{ServerEvent, UserInfo};
use crate::types::{ConnectionId, DEFAULT_ROOM};

/// Directory of active connections
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    clients: HashMap<ConnectionId, Client>,
    /// Monotonic counter stamping each join, so presence snapshots keep
    /// a stable order
    next_seq: u64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection under a username
    ///
    /// Creates the entry, or overwrites it if the connection re-joins;
    /// either way the current room resets to the default room.
    pub fn join(
        &mut self,
        id: ConnectionId,
        username: String,
        sender: mpsc::Sender<ServerEvent>,
    ) -> UserInfo {
        let seq = self.next_seq;
        self.next_seq += 1;
        let client = Client::new(id, username, DEFAULT_ROOM.to_string(), seq, sender);
        let info = client.info();
        self.clients.insert(id, client);
        info
    }

    /// Remove a connection, returning its record if it was registered
    ///
    /// Removing an unknown id is a benign no-op; disconnect events may
    /// race with cleanup.
    pub fn leave(&mut self, id: ConnectionId) -> Option<Client> {
        self.clients.remove(&id)
    }

    /// Move a connection to another room
    ///
    /// Unknown ids are ignored (the connection may have raced a
    /// disconnect).
    pub fn set_room(&mut self, id: ConnectionId, room: &str) {
        if let Some(client) = self.clients.get_mut(&id) {
            client.room = room.to_string();
        }
    }

    pub fn lookup(&self, id: ConnectionId) -> Option<&Client> {
        self.clients.get(&id)
    }

    /// Presence snapshot in join order
    pub fn all(&self) -> Vec<UserInfo> {
        let mut clients: Vec<&Client> = self.clients.values().collect();
        clients.sort_by_key(|c| c.joined_seq);
        clients.iter().map(|c| c.info()).collect()
    }

    /// Connections currently in the given room, the derived membership
    /// view
    pub fn members_of(&self, room: &str) -> Vec<&Client> {
        let mut members: Vec<&Client> = self.clients.values().filter(|c| c.room == room).collect();
        members.sort_by_key(|c| c.joined_seq);
        members
    }

    /// Iterate every registered client (fan-out to everyone)
    pub fn iter(&self) -> impl Iterator<Item = &Client> {
        self.clients.values()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> mpsc::Sender<ServerEvent> {
        // These tests never send, so the dropped receiver is fine.
        mpsc::channel(32).0
    }

    #[test]
    fn test_join_defaults_to_general() {
        let mut registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        let info = registry.join(id, "Alice".to_string(), sender());

        assert_eq!(info.room, DEFAULT_ROOM);
        assert_eq!(registry.lookup(id).unwrap().username, "Alice");
    }

    #[test]
    fn test_rejoin_overwrites_and_resets_room() {
        let mut registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        registry.join(id, "Alice".to_string(), sender());
        registry.set_room(id, "rust");
        assert_eq!(registry.lookup(id).unwrap().room, "rust");

        registry.join(id, "Alicia".to_string(), sender());
        let client = registry.lookup(id).unwrap();
        assert_eq!(client.username, "Alicia");
        assert_eq!(client.room, DEFAULT_ROOM);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_leave_unknown_is_noop() {
        let mut registry = ConnectionRegistry::new();
        assert!(registry.leave(ConnectionId::new()).is_none());
    }

    #[test]
    fn test_connection_is_in_exactly_one_room() {
        let mut registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        registry.join(id, "Alice".to_string(), sender());

        for room in ["rust", "random", "rust", DEFAULT_ROOM] {
            registry.set_room(id, room);
            let containing: Vec<&str> = [DEFAULT_ROOM, "rust", "random"]
                .into_iter()
                .filter(|r| registry.members_of(r).iter().any(|c| c.id == id))
                .collect();
            assert_eq!(containing, vec![room]);
        }
    }

    #[test]
    fn test_all_is_join_ordered() {
        let mut registry = ConnectionRegistry::new();
        let first = ConnectionId::new();
        let second = ConnectionId::new();
        let third = ConnectionId::new();
        registry.join(first, "a".to_string(), sender());
        registry.join(second, "b".to_string(), sender());
        registry.join(third, "c".to_string(), sender());

        let ids: Vec<ConnectionId> = registry.all().iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![first, second, third]);
    }

    #[test]
    fn test_members_of_filters_by_room() {
        let mut registry = ConnectionRegistry::new();
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        registry.join(a, "Alice".to_string(), sender());
        registry.join(b, "Bob".to_string(), sender());
        registry.set_room(b, "rust");

        assert_eq!(registry.members_of(DEFAULT_ROOM).len(), 1);
        assert_eq!(registry.members_of("rust").len(), 1);
        assert!(registry.members_of("empty").is_empty());
    }
}
