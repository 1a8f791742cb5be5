//! Multi-user Line Chat Server Library
//!
//! A TCP chat server where every connection exchanges plain UTF-8 text
//! lines. Clients pick a unique nickname, then chat with everyone or send
//! private messages.
//!
//! # Features
//! - Nickname handshake with `ERROR:` rejection
//! - Broadcast chat (never echoed to the sender)
//! - Private messages with `/private <nickname> <text>`
//! - `/users` listing and `/exit`
//! - Join/leave system notices
//! - Graceful shutdown that closes every connection
//!
//! # Architecture
//! - `Registry` is a concurrent nickname → session map (DashMap)
//! - `Router` snapshots the registry and delivers without holding locks
//! - Each connection runs a `Dispatcher` state machine in its own task
//! - Routed messages reach a connection through a bounded mailbox, so a
//!   slow client only ever drops its own messages
//!
//! # Example
//! ```ignore
//! use tokio_util::sync::CancellationToken;
//! use line_chat::{ChatServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = ChatServer::bind(ServerConfig::default()).await.unwrap();
//!     server.run(CancellationToken::new()).await.unwrap();
//! }
//! ```

pub mod client;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod message;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use client::{ChatClient, JoinOutcome};
pub use command::{Command, CommandError};
pub use config::{ClientArgs, ServerArgs, ServerConfig};
pub use dispatcher::{Dispatcher, ProtocolState};
pub use error::{AppError, SendError};
pub use handler::{handle_connection, serve_lines};
pub use message::{Message, MessageKind, ServerMessage};
pub use registry::Registry;
pub use router::Router;
pub use server::ChatServer;
pub use session::{Session, SessionHandle};
pub use types::ConnectionId;
