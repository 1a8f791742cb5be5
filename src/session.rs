//! Session struct definition
//!
//! A `Session` is the server-side state of one joined connection. It is
//! owned by that connection's dispatcher; the registry and router only
//! ever see a `SessionHandle`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::types::ConnectionId;

/// Joined connection state
///
/// Not `Clone`: exactly one owner per connection.
#[derive(Debug)]
pub struct Session {
    /// Connection this session belongs to
    id: ConnectionId,
    /// Registered nickname (registry key)
    nickname: String,
    /// Router → connection mailbox
    outbound: mpsc::Sender<ServerMessage>,
    /// Cleared exactly once, on termination
    alive: Arc<AtomicBool>,
}

impl Session {
    /// Create a live session for a registered nickname
    pub fn new(id: ConnectionId, nickname: String, outbound: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            id,
            nickname,
            outbound,
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Non-owning reference for the registry
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            id: self.id,
            nickname: self.nickname.clone(),
            outbound: self.outbound.clone(),
            alive: Arc::clone(&self.alive),
        }
    }

    /// Mark the session dead
    ///
    /// Returns true only for the call that actually flipped the flag, so
    /// cleanup guarded by it runs once no matter how many termination
    /// paths fire.
    pub fn close(&self) -> bool {
        self.alive
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Lookup reference to a session, held by the registry
///
/// Can deliver to the session's mailbox but cannot end the session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: ConnectionId,
    nickname: String,
    outbound: mpsc::Sender<ServerMessage>,
    alive: Arc<AtomicBool>,
}

impl SessionHandle {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Queue a message for this session without waiting
    ///
    /// Fails with `Closed` once the session is dead or its receiver is
    /// gone, and with `Full` when the mailbox is at capacity.
    pub fn deliver(&self, msg: impl Into<ServerMessage>) -> Result<(), SendError> {
        if !self.is_alive() {
            return Err(SendError::Closed);
        }
        self.outbound.try_send(msg.into()).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Full,
            TrySendError::Closed(_) => SendError::Closed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    fn session(name: &str, capacity: usize) -> (Session, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Session::new(ConnectionId::new(), name.to_string(), tx), rx)
    }

    #[tokio::test]
    async fn test_session_creation() {
        let (session, _rx) = session("alice", 8);
        assert_eq!(session.nickname(), "alice");
        assert!(session.is_alive());

        let handle = session.handle();
        assert_eq!(handle.nickname(), "alice");
        assert_eq!(handle.id(), session.id());
        assert!(handle.is_alive());
    }

    #[tokio::test]
    async fn test_handle_delivers_to_mailbox() {
        let (session, mut rx) = session("alice", 8);
        let handle = session.handle();

        handle.deliver(Message::broadcast("bob", "hi")).unwrap();

        match rx.recv().await {
            Some(ServerMessage::Chat(msg)) => assert_eq!(msg.text(), "hi"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_close_flips_once() {
        let (session, _rx) = session("alice", 8);
        let handle = session.handle();

        assert!(session.close());
        assert!(!session.close());
        assert!(!session.is_alive());
        assert!(!handle.is_alive());
    }

    #[test]
    fn test_deliver_after_close() {
        let (session, _rx) = session("alice", 8);
        let handle = session.handle();
        session.close();

        assert_eq!(
            handle.deliver(ServerMessage::notice("late")),
            Err(SendError::Closed)
        );
    }

    #[test]
    fn test_deliver_to_dropped_receiver() {
        let (session, rx) = session("alice", 8);
        drop(rx);

        assert_eq!(
            session.handle().deliver(ServerMessage::notice("x")),
            Err(SendError::Closed)
        );
    }

    #[test]
    fn test_deliver_to_full_mailbox() {
        let (session, _rx) = session("alice", 1);
        let handle = session.handle();

        assert!(handle.deliver(ServerMessage::notice("one")).is_ok());
        assert_eq!(
            handle.deliver(ServerMessage::notice("two")),
            Err(SendError::Full)
        );
    }
}
