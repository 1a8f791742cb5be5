//! Error types for the chat server
//!
//! Defines application-level errors and mailbox delivery errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;
use tokio_util::codec::LinesCodecError;

/// Application-level errors
///
/// All of these are transport or startup failures. Protocol problems such
/// as a taken nickname or a malformed `/private` are answered to the client
/// and never become an `AppError`.
#[derive(Debug, Error)]
pub enum AppError {
    /// Listener could not be bound (fatal at startup)
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// IO error (fatal for the connection)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Line framing error (fatal for the connection)
    #[error("line codec error: {0}")]
    Codec(#[from] LinesCodecError),

    /// Peer closed the connection before the handshake completed
    #[error("connection closed by peer")]
    ConnectionClosed,
}

/// Mailbox delivery errors
///
/// Returned when a message cannot be queued for a session. The router
/// swallows these; they only show up in debug logs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The session has disconnected or its receiver was dropped
    #[error("session closed")]
    Closed,

    /// The session's mailbox is full
    #[error("mailbox full")]
    Full,
}
