//! Per-connection protocol state machine
//!
//! `AwaitingNickname → Active → Terminated`. The dispatcher turns each
//! input line into registry and router calls and returns the lines that
//! should go straight back to its own client. Routed traffic for this
//! client arrives separately through the session mailbox.

use std::mem;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::command::Command;
use crate::message::{Message, ServerMessage, SYSTEM_SENDER};
use crate::router::Router;
use crate::session::Session;
use crate::types::ConnectionId;

const HELP: &str =
    "Commands: /users - list users, /private <nickname> <text> - private message, /exit - quit";

/// Observable protocol state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolState {
    AwaitingNickname,
    Active,
    Terminated,
}

enum State {
    AwaitingNickname,
    Active(Session),
    Terminated,
}

/// Protocol driver for one connection
///
/// Owns the connection's `Session` once joined. Dropping the dispatcher
/// terminates it.
pub struct Dispatcher {
    id: ConnectionId,
    router: Router,
    outbound: mpsc::Sender<ServerMessage>,
    max_nickname_len: usize,
    state: State,
}

impl Dispatcher {
    /// Create a dispatcher awaiting a nickname
    ///
    /// `outbound` becomes the session mailbox once the client joins.
    pub fn new(
        id: ConnectionId,
        router: Router,
        outbound: mpsc::Sender<ServerMessage>,
        max_nickname_len: usize,
    ) -> Self {
        Self {
            id,
            router,
            outbound,
            max_nickname_len,
            state: State::AwaitingNickname,
        }
    }

    pub fn state(&self) -> ProtocolState {
        match self.state {
            State::AwaitingNickname => ProtocolState::AwaitingNickname,
            State::Active(_) => ProtocolState::Active,
            State::Terminated => ProtocolState::Terminated,
        }
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self.state, State::Terminated)
    }

    /// Nickname of the joined session, if any
    pub fn nickname(&self) -> Option<&str> {
        match &self.state {
            State::Active(session) => Some(session.nickname()),
            _ => None,
        }
    }

    /// Process one input line
    ///
    /// Returns the replies for this client, in order. Lines arriving after
    /// termination are ignored.
    pub fn handle_line(&mut self, line: &str) -> Vec<ServerMessage> {
        match &self.state {
            State::AwaitingNickname => self.join(line),
            State::Active(session) => {
                let nickname = session.nickname().to_string();
                self.dispatch(&nickname, line)
            }
            State::Terminated => {
                debug!(connection = %self.id, "Ignoring line after termination");
                Vec::new()
            }
        }
    }

    /// End the connection's protocol
    ///
    /// For a joined session this releases the nickname and announces the
    /// departure. Safe to call any number of times; only the first call
    /// has an effect.
    pub fn terminate(&mut self) {
        let State::Active(session) = mem::replace(&mut self.state, State::Terminated) else {
            return;
        };
        if !session.close() {
            return;
        }

        let nickname = session.nickname();
        self.router.registry().remove(nickname);
        info!(connection = %self.id, nickname, "Client left");
        self.router
            .broadcast_system(format!("{} left the chat", nickname));
    }

    fn join(&mut self, line: &str) -> Vec<ServerMessage> {
        let nickname = match self.validate_nickname(line) {
            Ok(nickname) => nickname,
            Err(reason) => return self.reject(reason),
        };

        let session = Session::new(self.id, nickname.to_string(), self.outbound.clone());
        if !self.router.registry().register(nickname, session.handle()) {
            return self.reject("Nickname already in use");
        }

        info!(connection = %self.id, nickname, "Client joined");
        self.router
            .broadcast_system(format!("{} joined the chat", nickname));

        let welcome = format!("Welcome to the chat, {}!", nickname);
        self.state = State::Active(session);
        vec![ServerMessage::notice(welcome), ServerMessage::notice(HELP)]
    }

    fn validate_nickname<'a>(&self, line: &'a str) -> Result<&'a str, &'static str> {
        let nickname = line.trim();
        if nickname.is_empty() {
            Err("Nickname cannot be empty")
        } else if nickname.contains(char::is_whitespace) {
            Err("Nickname cannot contain spaces")
        } else if nickname.chars().count() > self.max_nickname_len {
            Err("Nickname is too long")
        } else if nickname.eq_ignore_ascii_case(SYSTEM_SENDER) {
            Err("Nickname is reserved")
        } else {
            Ok(nickname)
        }
    }

    fn reject(&mut self, reason: &str) -> Vec<ServerMessage> {
        info!(connection = %self.id, "Rejected nickname: {}", reason);
        self.state = State::Terminated;
        vec![ServerMessage::error(reason)]
    }

    fn dispatch(&mut self, nickname: &str, line: &str) -> Vec<ServerMessage> {
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(e) => return vec![ServerMessage::notice(e.to_string())],
        };

        match command {
            Command::Exit => {
                debug!(connection = %self.id, "Exit requested");
                self.terminate();
                Vec::new()
            }
            Command::Users => {
                let users = self.router.registry().snapshot_users();
                let mut lines = Vec::with_capacity(users.len() + 1);
                lines.push(ServerMessage::notice("Connected users:"));
                lines.extend(users.iter().map(|u| ServerMessage::notice(format!("  - {}", u))));
                lines
            }
            Command::Private { recipient, text } => {
                let message = Message::private(nickname, recipient, text);
                if self.router.send_private(message) {
                    vec![ServerMessage::notice(format!("[You -> {}]: {}", recipient, text))]
                } else {
                    vec![ServerMessage::notice(format!(
                        "User {} not found or disconnected",
                        recipient
                    ))]
                }
            }
            Command::Chat(text) => {
                debug!(connection = %self.id, "Chat from {}: {}", nickname, text);
                self.router.broadcast(Message::broadcast(nickname, text));
                Vec::new()
            }
            Command::Empty => Vec::new(),
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.terminate();
    }
}
