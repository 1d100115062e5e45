//! Room-based WebSocket Chat Server - Entry Point
//!
//! Starts the ChatServer actor, the HTTP query interface, and the TCP
//! listener accepting WebSocket connections.

use std::env;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chat_hub::{handle_connection, http, ChatServer};

/// Default WebSocket server address
const DEFAULT_WS_ADDR: &str = "127.0.0.1:8080";

/// Default HTTP query interface address
const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:8081";

/// Channel buffer size for server commands
const CHANNEL_BUFFER_SIZE: usize = 256;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_hub=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_hub=info")),
        )
        .init();

    // Bind addresses from the command line or defaults
    let ws_addr = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_WS_ADDR.to_string());
    let http_addr: SocketAddr = env::args()
        .nth(2)
        .unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string())
        .parse()?;

    // Start TCP listener
    let listener = TcpListener::bind(&ws_addr).await?;
    info!("WebSocket chat server listening on {}", ws_addr);

    // Create ChatServer actor channel and start
    let (cmd_tx, cmd_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
    let server = ChatServer::new(cmd_rx);
    tokio::spawn(server.run());

    info!("ChatServer actor started");

    // HTTP query interface (history pagination, presence snapshot)
    tokio::spawn(warp::serve(http::routes(cmd_tx.clone())).run(http_addr));
    info!("HTTP query interface listening on {}", http_addr);

    // Connection accept loop
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let cmd_tx = cmd_tx.clone();

                // Spawn handler task for each connection
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, cmd_tx).await {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
