//! Error types for the chat server
//!
//! Defines transport-level errors only. Business conditions (unknown
//! sender, duplicate room, duplicate reaction or seen entry, history
//! overflow) are silent no-ops inside the owning component and never
//! surface as errors.

use thiserror::Error;

/// Application-level errors
///
/// Every variant is fatal for the connection that produced it; the
/// handler responds by taking the Disconnected transition.
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,
}

/// Message send errors
///
/// Occurs when attempting to send messages through closed channels.
/// Callers ignore it; the disconnect path owns cleanup.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,
}
