//! ChatServer Actor implementation
//!
//! The central actor that coordinates all state: the connection
//! registry, room directory, message store, reaction aggregator, seen
//! tracker, and typing set. Uses the Actor pattern with mpsc channels
//! for message passing; components never call each other, so every
//! cross-component invariant is checked inside a single command.

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::message::{
    ChatMessage, DeliveryAck, Destination, FilePayload, Payload, ServerEvent, UserInfo,
};
use crate::reactions::ReactionAggregator;
use crate::registry::ConnectionRegistry;
use crate::rooms::RoomDirectory;
use crate::seen::SeenTracker;
use crate::store::{MessageStore, PAGE_SIZE};
use crate::types::{ConnectionId, MessageId};
use crate::typing::TypingSet;

/// Commands sent from handlers and the HTTP layer to the ChatServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// Client registered an identity
    Join {
        conn_id: ConnectionId,
        username: String,
        sender: mpsc::Sender<ServerEvent>,
    },
    /// Connection lost or closed
    Disconnect { conn_id: ConnectionId },
    /// Text message to the sender's current room
    RoomMessage {
        conn_id: ConnectionId,
        message: String,
        /// Answered with a local-write ack once the message is
        /// persisted and fanned out. Dropped without an answer when the
        /// sender is unknown.
        ack: Option<oneshot::Sender<DeliveryAck>>,
    },
    /// Text message to one recipient connection
    PrivateMessage {
        conn_id: ConnectionId,
        to: ConnectionId,
        message: String,
    },
    /// File message to the sender's current room
    RoomFile {
        conn_id: ConnectionId,
        file: FilePayload,
    },
    /// File message to one recipient connection
    PrivateFile {
        conn_id: ConnectionId,
        to: ConnectionId,
        file: FilePayload,
    },
    /// Create a room by name
    CreateRoom {
        conn_id: ConnectionId,
        name: String,
    },
    /// Switch the sender to a room, creating it on demand
    JoinRoom {
        conn_id: ConnectionId,
        name: String,
    },
    /// Typing indicator on/off
    Typing {
        conn_id: ConnectionId,
        is_typing: bool,
    },
    /// React to a message
    AddReaction {
        conn_id: ConnectionId,
        message_id: MessageId,
        emoji: String,
        user_id: ConnectionId,
    },
    /// Acknowledge having viewed a message
    MessageSeen {
        conn_id: ConnectionId,
        message_id: MessageId,
        user_id: ConnectionId,
        room: Option<String>,
    },
    /// History page for the HTTP interface
    PageMessages {
        room: String,
        before: Option<DateTime<Utc>>,
        respond_to: oneshot::Sender<Vec<ChatMessage>>,
    },
    /// Presence snapshot for the HTTP interface
    ListUsers {
        respond_to: oneshot::Sender<Vec<UserInfo>>,
    },
}

/// Who receives a broadcast
///
/// Fan-out scope is an explicit, testable parameter; nothing is ever
/// emitted globally by accident.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Audience {
    /// Every registered connection
    Everyone,
    /// Current members of one room
    Room(String),
    /// Both parties of a private message
    Pair(ConnectionId, ConnectionId),
    /// A single connection
    One(ConnectionId),
}

/// The main ChatServer actor
///
/// Owns every piece of shared state and processes commands strictly
/// one at a time, so no locks are needed and no event ever observes a
/// partial mutation.
pub struct ChatServer {
    registry: ConnectionRegistry,
    rooms: RoomDirectory,
    store: MessageStore,
    reactions: ReactionAggregator,
    seen: SeenTracker,
    typing: TypingSet,
    /// Next message id; strictly increasing for the server's lifetime
    next_message_id: u64,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
}

impl ChatServer {
    /// Create a new ChatServer with the given command receiver
    pub fn new(receiver: mpsc::Receiver<ServerCommand>) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            rooms: RoomDirectory::new(),
            store: MessageStore::new(),
            reactions: ReactionAggregator::new(),
            seen: SeenTracker::new(),
            typing: TypingSet::new(),
            next_message_id: 1,
            receiver,
        }
    }

    /// Run the ChatServer event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped.
    pub async fn run(mut self) {
        info!("ChatServer started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd).await;
        }

        info!("ChatServer shutting down");
    }

    /// Process a single command
    async fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Join {
                conn_id,
                username,
                sender,
            } => {
                self.handle_join(conn_id, username, sender).await;
            }
            ServerCommand::Disconnect { conn_id } => {
                self.handle_disconnect(conn_id).await;
            }
            ServerCommand::RoomMessage {
                conn_id,
                message,
                ack,
            } => {
                self.handle_room_message(conn_id, message, ack).await;
            }
            ServerCommand::PrivateMessage {
                conn_id,
                to,
                message,
            } => {
                self.handle_private_send(conn_id, to, Payload::Text { message })
                    .await;
            }
            ServerCommand::RoomFile { conn_id, file } => {
                self.handle_room_file(conn_id, file).await;
            }
            ServerCommand::PrivateFile { conn_id, to, file } => {
                self.handle_private_send(conn_id, to, Payload::File { file })
                    .await;
            }
            ServerCommand::CreateRoom { conn_id, name } => {
                self.handle_create_room(conn_id, name).await;
            }
            ServerCommand::JoinRoom { conn_id, name } => {
                self.handle_join_room(conn_id, name).await;
            }
            ServerCommand::Typing { conn_id, is_typing } => {
                self.handle_typing(conn_id, is_typing).await;
            }
            ServerCommand::AddReaction {
                conn_id,
                message_id,
                emoji,
                user_id,
            } => {
                self.handle_add_reaction(conn_id, message_id, emoji, user_id)
                    .await;
            }
            ServerCommand::MessageSeen {
                conn_id,
                message_id,
                user_id,
                room,
            } => {
                self.handle_message_seen(conn_id, message_id, user_id, room)
                    .await;
            }
            ServerCommand::PageMessages {
                room,
                before,
                respond_to,
            } => {
                let _ = respond_to.send(self.store.page(&room, before, PAGE_SIZE));
            }
            ServerCommand::ListUsers { respond_to } => {
                let _ = respond_to.send(self.registry.all());
            }
        }
    }

    /// Handle identity registration (Connecting -> Joined)
    async fn handle_join(
        &mut self,
        conn_id: ConnectionId,
        username: String,
        sender: mpsc::Sender<ServerEvent>,
    ) {
        let info = self.registry.join(conn_id, username.clone(), sender);
        info!("{} joined the chat as {}", conn_id, info.username);

        self.fan_out(
            Audience::Everyone,
            ServerEvent::UserList {
                users: self.registry.all(),
            },
        )
        .await;
        self.fan_out(
            Audience::Everyone,
            ServerEvent::UserJoined {
                username,
                id: conn_id,
            },
        )
        .await;
        self.fan_out(
            Audience::Everyone,
            ServerEvent::RoomList {
                rooms: self.rooms.list(),
            },
        )
        .await;
    }

    /// Handle connection loss (* -> Disconnected)
    ///
    /// All cleanup happens inside this one command: registry removal,
    /// typing removal, presence broadcasts. Messages, reactions, and
    /// seen entries from the departed user are retained.
    async fn handle_disconnect(&mut self, conn_id: ConnectionId) {
        let typing_changed = self.typing.remove(conn_id);
        let departed = self.registry.leave(conn_id);

        if let Some(client) = &departed {
            info!("{} ({}) left the chat", client.username, conn_id);
            self.fan_out(
                Audience::Everyone,
                ServerEvent::UserLeft {
                    username: client.username.clone(),
                    id: conn_id,
                },
            )
            .await;
            self.fan_out(
                Audience::Everyone,
                ServerEvent::UserList {
                    users: self.registry.all(),
                },
            )
            .await;
        }

        if typing_changed {
            self.fan_out(
                Audience::Everyone,
                ServerEvent::TypingUsers {
                    users: self.typing.snapshot(),
                },
            )
            .await;
        }

        debug!(
            "Total clients: {}, stored messages: {}",
            self.registry.len(),
            self.store.len()
        );
    }

    /// Handle a text message to the sender's current room
    async fn handle_room_message(
        &mut self,
        conn_id: ConnectionId,
        message: String,
        ack: Option<oneshot::Sender<DeliveryAck>>,
    ) {
        // Unknown sender: the connection raced a disconnect. Dropping
        // the ack channel un-answered tells the handler there is
        // nothing to confirm.
        let Some(client) = self.registry.lookup(conn_id) else {
            return;
        };
        let room = client.room.clone();
        let sender_name = client.username.clone();

        let message = self.build_message(
            sender_name,
            conn_id,
            Payload::Text { message },
            Destination::Room { room: room.clone() },
            false,
        );
        let message_id = message.id;
        self.store.append(message.clone());

        self.fan_out(Audience::Room(room), ServerEvent::ReceiveMessage { message })
            .await;

        if let Some(ack) = ack {
            let _ = ack.send(DeliveryAck {
                delivered: true,
                message_id,
            });
        }
    }

    /// Handle a file message to the sender's current room
    async fn handle_room_file(&mut self, conn_id: ConnectionId, file: FilePayload) {
        let Some(client) = self.registry.lookup(conn_id) else {
            return;
        };
        let room = client.room.clone();
        let sender_name = client.username.clone();

        let message = self.build_message(
            sender_name,
            conn_id,
            Payload::File { file },
            Destination::Room { room: room.clone() },
            false,
        );
        self.store.append(message.clone());

        self.fan_out(Audience::Room(room), ServerEvent::ReceiveMessage { message })
            .await;
    }

    /// Handle a private text or file message
    ///
    /// Delivered to the recipient and echoed to the sender. The record
    /// is stored (never paginated) so later seen receipts and reactions
    /// can resolve both parties.
    async fn handle_private_send(
        &mut self,
        conn_id: ConnectionId,
        to: ConnectionId,
        payload: Payload,
    ) {
        let Some(client) = self.registry.lookup(conn_id) else {
            return;
        };
        let sender_name = client.username.clone();

        let message = self.build_message(
            sender_name,
            conn_id,
            payload,
            Destination::Direct { to },
            true,
        );
        self.store.append(message.clone());

        self.fan_out(
            Audience::Pair(conn_id, to),
            ServerEvent::PrivateMessage { message },
        )
        .await;
    }

    /// Handle idempotent room creation
    async fn handle_create_room(&mut self, conn_id: ConnectionId, name: String) {
        if self.registry.lookup(conn_id).is_none() {
            return;
        }

        if self.rooms.ensure(&name) {
            info!("Room '{}' created", name);
            self.fan_out(
                Audience::Everyone,
                ServerEvent::RoomList {
                    rooms: self.rooms.list(),
                },
            )
            .await;
        }
    }

    /// Handle a room switch (RoomMember(X) -> RoomMember(Y))
    async fn handle_join_room(&mut self, conn_id: ConnectionId, name: String) {
        if self.registry.lookup(conn_id).is_none() {
            return;
        }

        // Creating on demand keeps the directory in step with every
        // room a connection can actually be in.
        let created = self.rooms.ensure(&name);
        self.registry.set_room(conn_id, &name);
        debug!("{} switched to room '{}'", conn_id, name);

        if created {
            self.fan_out(
                Audience::Everyone,
                ServerEvent::RoomList {
                    rooms: self.rooms.list(),
                },
            )
            .await;
        }
        // Room membership is presence-visible.
        self.fan_out(
            Audience::Everyone,
            ServerEvent::UserList {
                users: self.registry.all(),
            },
        )
        .await;
    }

    /// Handle a typing signal
    async fn handle_typing(&mut self, conn_id: ConnectionId, is_typing: bool) {
        let Some(client) = self.registry.lookup(conn_id) else {
            return;
        };
        let username = client.username.clone();

        if self.typing.set_typing(conn_id, &username, is_typing) {
            self.fan_out(
                Audience::Everyone,
                ServerEvent::TypingUsers {
                    users: self.typing.snapshot(),
                },
            )
            .await;
        }
    }

    /// Handle a reaction
    ///
    /// The duplicate case is a silent no-op in the aggregator, but the
    /// complete current state is still broadcast; clients replace
    /// rather than merge.
    async fn handle_add_reaction(
        &mut self,
        conn_id: ConnectionId,
        message_id: MessageId,
        emoji: String,
        user_id: ConnectionId,
    ) {
        if self.registry.lookup(conn_id).is_none() {
            return;
        }

        let reactions = self.reactions.add(message_id, &emoji, user_id).clone();
        let audience = self.audience_of(message_id, None, conn_id);
        self.fan_out(
            audience,
            ServerEvent::ReactionUpdate {
                message_id,
                reactions,
            },
        )
        .await;
    }

    /// Handle a seen acknowledgment
    ///
    /// Broadcasts only when the seen set actually grew.
    async fn handle_message_seen(
        &mut self,
        conn_id: ConnectionId,
        message_id: MessageId,
        user_id: ConnectionId,
        room: Option<String>,
    ) {
        if self.registry.lookup(conn_id).is_none() {
            return;
        }

        let update = self.seen.mark_seen(message_id, user_id);
        if !update.changed {
            return;
        }

        let audience = self.audience_of(message_id, room.as_deref(), conn_id);
        self.fan_out(
            audience,
            ServerEvent::MessageSeenUpdate {
                message_id,
                seen_by: update.seen_by,
            },
        )
        .await;
    }

    /// Mint an immutable message with the next id and the current time
    fn build_message(
        &mut self,
        sender: String,
        sender_id: ConnectionId,
        payload: Payload,
        destination: Destination,
        is_private: bool,
    ) -> ChatMessage {
        let id = MessageId(self.next_message_id);
        self.next_message_id += 1;
        ChatMessage {
            id,
            sender,
            sender_id,
            payload,
            destination,
            is_private,
            timestamp: Utc::now(),
        }
    }

    /// Resolve the audience of a message-scoped broadcast
    ///
    /// Room messages reach the room, private messages reach both
    /// parties. For ids the store no longer retains, a room hint from
    /// the event wins; otherwise only the originating connection hears
    /// back.
    fn audience_of(
        &self,
        message_id: MessageId,
        room_hint: Option<&str>,
        origin: ConnectionId,
    ) -> Audience {
        match self.store.get(message_id) {
            Some(message) => match &message.destination {
                Destination::Room { room } => Audience::Room(room.clone()),
                Destination::Direct { to } => Audience::Pair(message.sender_id, *to),
            },
            None => match room_hint {
                Some(room) => Audience::Room(room.to_string()),
                None => Audience::One(origin),
            },
        }
    }

    /// Deliver one event to every connection in its audience
    async fn fan_out(&self, audience: Audience, event: ServerEvent) {
        match audience {
            Audience::Everyone => {
                for client in self.registry.iter() {
                    let _ = client.send(event.clone()).await;
                }
            }
            Audience::Room(room) => {
                for client in self.registry.members_of(&room) {
                    let _ = client.send(event.clone()).await;
                }
            }
            Audience::Pair(a, b) => {
                self.send_to(a, event.clone()).await;
                if b != a {
                    self.send_to(b, event).await;
                }
            }
            Audience::One(conn_id) => {
                self.send_to(conn_id, event).await;
            }
        }
    }

    /// Send to a single connection, ignoring departed ones
    async fn send_to(&self, conn_id: ConnectionId, event: ServerEvent) {
        if let Some(client) = self.registry.lookup(conn_id) {
            let _ = client.send(event).await;
        }
    }
}
