//! Client struct definition
//!
//! Represents a connected client with their identity, current room,
//! and communication channel.

use tokio::sync::mpsc;

use crate::error::SendError;
use crate::message::{ServerEvent, UserInfo};
use crate::types::ConnectionId;

/// Connected client information
///
/// Holds all state related to a connected client: unique connection ID,
/// username, current room, join ordering, and the server → client
/// message channel.
#[derive(Debug)]
pub struct Client {
    /// Unique identifier for this connection
    pub id: ConnectionId,
    /// Username chosen at join time (not unique across clients)
    pub username: String,
    /// The one room this connection currently belongs to
    pub room: String,
    /// Monotonic join sequence, used to order presence snapshots
    pub joined_seq: u64,
    /// Server → Client message channel
    pub sender: mpsc::Sender<ServerEvent>,
}

impl Client {
    /// Create a new client with the given identity and sender channel
    pub fn new(
        id: ConnectionId,
        username: String,
        room: String,
        joined_seq: u64,
        sender: mpsc::Sender<ServerEvent>,
    ) -> Self {
        Self {
            id,
            username,
            room,
            joined_seq,
            sender,
        }
    }

    /// Send an event to this client
    ///
    /// Returns an error if the channel is closed (client disconnected).
    pub async fn send(&self, event: ServerEvent) -> Result<(), SendError> {
        self.sender
            .send(event)
            .await
            .map_err(|_| SendError::ChannelClosed)
    }

    /// Presence entry for this client
    pub fn info(&self) -> UserInfo {
        UserInfo {
            id: self.id,
            username: self.username.clone(),
            room: self.room.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_ROOM;

    #[tokio::test]
    async fn test_client_creation() {
        let (tx, _rx) = mpsc::channel(32);
        let client = Client::new(
            ConnectionId::new(),
            "Alice".to_string(),
            DEFAULT_ROOM.to_string(),
            0,
            tx,
        );

        assert_eq!(client.username, "Alice");
        assert_eq!(client.room, DEFAULT_ROOM);
        assert_eq!(client.info().username, "Alice");
    }

    #[tokio::test]
    async fn test_send_to_closed_channel_fails() {
        let (tx, rx) = mpsc::channel(32);
        let client = Client::new(
            ConnectionId::new(),
            "Alice".to_string(),
            DEFAULT_ROOM.to_string(),
            0,
            tx,
        );
        drop(rx);

        let result = client
            .send(ServerEvent::RoomList {
                rooms: vec![DEFAULT_ROOM.to_string()],
            })
            .await;
        assert!(matches!(result, Err(SendError::ChannelClosed)));
    }
}
