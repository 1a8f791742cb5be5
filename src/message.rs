//! Message definitions
//!
//! `Message` is one immutable chat event. `ServerMessage` is a single line
//! the server writes to a client, either a chat event or server text.

use std::fmt;

use chrono::{DateTime, Local};

/// Sender name used for server-originated notices
pub const SYSTEM_SENDER: &str = "System";

/// Kind of chat event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Delivered to everyone except the sender
    Broadcast,
    /// Delivered to exactly one recipient
    Private,
    /// Join/leave notice delivered to everyone
    System,
}

/// One chat event
///
/// Built through the constructors below; the recipient is present
/// exactly when the kind is `Private`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    kind: MessageKind,
    sender: String,
    recipient: Option<String>,
    text: String,
    created_at: DateTime<Local>,
}

impl Message {
    /// Create a broadcast chat message
    pub fn broadcast(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self::build(MessageKind::Broadcast, sender.into(), None, text.into())
    }

    /// Create a private message to `recipient`
    pub fn private(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self::build(
            MessageKind::Private,
            sender.into(),
            Some(recipient.into()),
            text.into(),
        )
    }

    /// Create a system notice
    pub fn system(text: impl Into<String>) -> Self {
        Self::build(MessageKind::System, SYSTEM_SENDER.to_string(), None, text.into())
    }

    fn build(kind: MessageKind, sender: String, recipient: Option<String>, text: String) -> Self {
        Self {
            kind,
            sender,
            recipient,
            text,
            created_at: Local::now(),
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn recipient(&self) -> Option<&str> {
        self.recipient.as_deref()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let time = self.created_at.format("%H:%M:%S");
        match (self.kind, self.recipient.as_deref()) {
            (MessageKind::Private, Some(recipient)) => {
                write!(f, "[{}] [{} -> {}]: {}", time, self.sender, recipient, self.text)
            }
            (MessageKind::System, _) => write!(f, "[{}] [System]: {}", time, self.text),
            _ => write!(f, "[{}] [{} -> ALL]: {}", time, self.sender, self.text),
        }
    }
}

/// Server → Client line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// A routed chat event
    Chat(Message),
    /// Free-form server text (welcome, user list, confirmations)
    Notice(String),
    /// Rejection or failure, rendered with the `ERROR:` prefix
    Error(String),
}

impl ServerMessage {
    pub fn notice(text: impl Into<String>) -> Self {
        Self::Notice(text.into())
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::Error(text.into())
    }

    /// Whether this line signals a rejection
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl From<Message> for ServerMessage {
    fn from(msg: Message) -> Self {
        Self::Chat(msg)
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chat(msg) => fmt::Display::fmt(msg, f),
            Self::Notice(text) => f.write_str(text),
            Self::Error(text) => write!(f, "ERROR: {}", text),
        }
    }
}
