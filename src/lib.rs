//! Room-based WebSocket Chat Server Library
//!
//! A real-time chat coordination server built with tokio-tungstenite
//! using the Actor pattern for state management, plus a warp HTTP
//! interface for history pagination.
//!
//! # Features
//! - WebSocket connection handling with a JSON event protocol
//! - Room-based group chat with on-demand room creation
//! - Private one-to-one messages and file messages
//! - Presence broadcasts and typing indicators
//! - Emoji reactions, deduplicated per user per message
//! - Per-message read receipts
//! - Bounded in-memory history with timestamp-cursor pagination
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `ChatServer` is the central actor owning all state: the connection
//!   registry, room directory, message store, reaction aggregator, seen
//!   tracker, and typing set
//! - Each connection has a `handler` task communicating with the server
//! - The HTTP layer reads through the same command channel via oneshot
//!   queries
//! - No locks needed - all state access goes through message passing
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use tokio::sync::mpsc;
//! use chat_hub::{ChatServer, handle_connection};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     let (cmd_tx, cmd_rx) = mpsc::channel(256);
//!
//!     tokio::spawn(ChatServer::new(cmd_rx).run());
//!     tokio::spawn(warp::serve(chat_hub::http::routes(cmd_tx.clone())).run(([127, 0, 0, 1], 8081)));
//!
//!     while let Ok((stream, _)) = listener.accept().await {
//!         let cmd_tx = cmd_tx.clone();
//!         tokio::spawn(handle_connection(stream, cmd_tx));
//!     }
//! }
//! ```

pub mod client;
pub mod error;
pub mod handler;
pub mod http;
pub mod message;
pub mod reactions;
pub mod registry;
pub mod rooms;
pub mod seen;
pub mod server;
pub mod store;
pub mod types;
pub mod typing;

// Re-export main types for convenience
pub use client::Client;
pub use error::{AppError, SendError};
pub use handler::handle_connection;
pub use message::{ChatMessage, ClientEvent, DeliveryAck, ServerEvent, UserInfo};
pub use reactions::ReactionAggregator;
pub use registry::ConnectionRegistry;
pub use rooms::RoomDirectory;
pub use seen::SeenTracker;
pub use server::{ChatServer, ServerCommand};
pub use store::MessageStore;
pub use types::{ConnectionId, MessageId, DEFAULT_ROOM};
pub use typing::TypingSet;
