//! Server and client configuration
//!
//! Command line arguments are parsed with clap; `ServerConfig` carries the
//! resulting tunables into the server.

use clap::Parser;

/// Default chat port
pub const DEFAULT_PORT: u16 = 8080;

/// Default per-session mailbox capacity
pub const DEFAULT_MAILBOX_CAPACITY: usize = 256;

/// Default longest accepted input line, in bytes
pub const DEFAULT_MAX_LINE_LENGTH: usize = 4096;

/// Default longest accepted nickname, in characters
pub const DEFAULT_MAX_NICKNAME_LEN: usize = 32;

/// Multi-user line chat server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct ServerArgs {
    /// Port to listen on
    #[arg(default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Messages buffered per client before deliveries are dropped
    #[arg(long, default_value_t = DEFAULT_MAILBOX_CAPACITY)]
    pub mailbox_capacity: usize,

    /// Longest accepted input line in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_LINE_LENGTH)]
    pub max_line_length: usize,

    /// Longest accepted nickname in characters
    #[arg(long, default_value_t = DEFAULT_MAX_NICKNAME_LEN)]
    pub max_nickname_len: usize,
}

impl From<ServerArgs> for ServerConfig {
    fn from(args: ServerArgs) -> Self {
        Self {
            host: args.host,
            port: args.port,
            // a zero-capacity mpsc channel panics
            mailbox_capacity: args.mailbox_capacity.max(1),
            max_line_length: args.max_line_length,
            max_nickname_len: args.max_nickname_len,
        }
    }
}

/// Line chat client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct ClientArgs {
    /// Server host
    #[arg(default_value = "127.0.0.1")]
    pub host: String,

    /// Server port
    #[arg(default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

impl ClientArgs {
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Server tunables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub mailbox_capacity: usize,
    pub max_line_length: usize,
    pub max_nickname_len: usize,
}

impl ServerConfig {
    /// `host:port` to bind
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            max_nickname_len: DEFAULT_MAX_NICKNAME_LEN,
        }
    }
}
