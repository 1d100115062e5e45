//! WebSocket connection handler
//!
//! Handles individual client connections: WebSocket handshake,
//! event parsing, and bidirectional communication with the ChatServer.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::message::{ClientEvent, ServerEvent};
use crate::server::ServerCommand;
use crate::types::ConnectionId;

/// Capacity of the per-connection server -> client event channel
const EVENT_BUFFER_SIZE: usize = 32;

/// Handle a new TCP connection
///
/// Performs WebSocket handshake, sets up bidirectional communication,
/// and manages the connection lifecycle. All cleanup funnels into a
/// single Disconnect command, whatever ended the connection.
pub async fn handle_connection(
    stream: TcpStream,
    cmd_tx: mpsc::Sender<ServerCommand>,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    // WebSocket handshake
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Assign connection ID
    let conn_id = ConnectionId::new();
    info!("Connection {} established from {}", conn_id, peer_addr);

    // Create channel for server -> client events
    let (event_tx, mut event_rx) = mpsc::channel::<ServerEvent>(EVENT_BUFFER_SIZE);

    // Issue the connection id; the client needs it for private
    // addressing and reaction/seen payloads.
    let connected = ServerEvent::Connected {
        connection_id: conn_id,
    };
    let json = serde_json::to_string(&connected)?;
    ws_sender.send(Message::Text(json.into())).await?;

    // Clones for the read task
    let cmd_tx_read = cmd_tx.clone();
    let event_tx_read = event_tx.clone();

    // Spawn read task (WebSocket -> ServerCommand)
    let read_task = tokio::spawn(async move {
        while let Some(msg_result) = ws_receiver.next().await {
            match msg_result {
                Ok(Message::Text(text)) => {
                    match serde_json::from_str::<ClientEvent>(&text) {
                        Ok(event) => {
                            if forward_event(conn_id, event, &cmd_tx_read, &event_tx_read)
                                .await
                                .is_err()
                            {
                                debug!("Server closed, ending read task for {}", conn_id);
                                break;
                            }
                        }
                        Err(e) => {
                            // Malformed payload is a transport failure:
                            // the connection takes the Disconnected
                            // transition rather than retrying.
                            warn!("Malformed payload from {}: {}", conn_id, e);
                            break;
                        }
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("Connection {} sent close frame", conn_id);
                    break;
                }
                Ok(Message::Ping(_)) => {
                    // Pong is handled automatically by tungstenite
                    debug!("Ping from {}", conn_id);
                }
                Ok(Message::Pong(_)) => {
                    debug!("Pong from {}", conn_id);
                }
                Ok(_) => {
                    // Binary or other frame types - ignore
                }
                Err(e) => {
                    error!("WebSocket error for {}: {}", conn_id, e);
                    break;
                }
            }
        }
        debug!("Read task ended for {}", conn_id);
    });

    // Spawn write task (ServerEvent -> WebSocket)
    let write_task = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, ending write task");
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize event: {}", e);
                    // Continue - don't break on serialization errors
                }
            }
        }
        debug!("Write task ended for connection");

        // Send close frame when done
        let _ = ws_sender.close().await;
    });

    // Wait for either task to complete
    tokio::select! {
        _ = read_task => {
            debug!("Read task completed for {}", conn_id);
        }
        _ = write_task => {
            debug!("Write task completed for {}", conn_id);
        }
    }

    // In-flight work from this connection is discarded; this one
    // command performs all cleanup.
    let _ = cmd_tx.send(ServerCommand::Disconnect { conn_id }).await;

    info!("Connection {} closed", conn_id);

    Ok(())
}

/// Forward a parsed client event to the ChatServer
///
/// Room messages are the one call-shaped event: the actor answers on a
/// oneshot once the message is persisted and fanned out, and the ack
/// goes back to the client as a `message_ack` event. An unanswered
/// oneshot (unknown sender) produces no ack.
async fn forward_event(
    conn_id: ConnectionId,
    event: ClientEvent,
    cmd_tx: &mpsc::Sender<ServerCommand>,
    event_tx: &mpsc::Sender<ServerEvent>,
) -> Result<(), AppError> {
    let cmd = match event {
        ClientEvent::Join { username } => ServerCommand::Join {
            conn_id,
            username,
            sender: event_tx.clone(),
        },
        ClientEvent::RoomMessage { message } => {
            let (ack_tx, ack_rx) = oneshot::channel();
            cmd_tx
                .send(ServerCommand::RoomMessage {
                    conn_id,
                    message,
                    ack: Some(ack_tx),
                })
                .await
                .map_err(|_| AppError::ChannelSend)?;
            if let Ok(ack) = ack_rx.await {
                let _ = event_tx
                    .send(ServerEvent::MessageAck {
                        delivered: ack.delivered,
                        message_id: ack.message_id,
                    })
                    .await;
            }
            return Ok(());
        }
        ClientEvent::PrivateMessage { to, message } => ServerCommand::PrivateMessage {
            conn_id,
            to,
            message,
        },
        ClientEvent::RoomFile { file } => ServerCommand::RoomFile { conn_id, file },
        ClientEvent::PrivateFile { to, file } => ServerCommand::PrivateFile { conn_id, to, file },
        ClientEvent::CreateRoom { name } => ServerCommand::CreateRoom { conn_id, name },
        ClientEvent::JoinRoom { name } => ServerCommand::JoinRoom { conn_id, name },
        ClientEvent::Typing { is_typing } => ServerCommand::Typing { conn_id, is_typing },
        ClientEvent::AddReaction {
            message_id,
            emoji,
            user_id,
        } => ServerCommand::AddReaction {
            conn_id,
            message_id,
            emoji,
            user_id,
        },
        ClientEvent::MessageSeen {
            message_id,
            user_id,
            room,
        } => ServerCommand::MessageSeen {
            conn_id,
            message_id,
            user_id,
            room,
        },
    };

    cmd_tx.send(cmd).await.map_err(|_| AppError::ChannelSend)
}
