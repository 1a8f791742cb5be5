//! Message router
//!
//! Broadcast, private and system delivery on top of the registry. The
//! router copies the handles it needs out of the registry and delivers
//! after the copy, so a slow or dead recipient never holds a registry
//! lock and never stalls the rest of the fan-out.

use std::sync::Arc;

use tracing::{debug, info};

use crate::message::{Message, ServerMessage};
use crate::registry::Registry;
use crate::session::SessionHandle;

/// Routes messages to registered sessions
///
/// Cheap to clone; all clones share one registry.
#[derive(Debug, Clone, Default)]
pub struct Router {
    registry: Arc<Registry>,
}

impl Router {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Deliver to everyone except `message.sender()`
    ///
    /// Returns how many sessions accepted the message.
    pub fn broadcast(&self, message: Message) -> usize {
        let recipients: Vec<SessionHandle> = self
            .registry
            .snapshot_sessions()
            .into_iter()
            .filter(|s| s.nickname() != message.sender())
            .collect();

        debug!(
            sender = message.sender(),
            recipients = recipients.len(),
            "Broadcasting message"
        );
        Self::fan_out(&recipients, ServerMessage::Chat(message))
    }

    /// Deliver to `message.recipient()` only
    ///
    /// False if the recipient is not registered or its mailbox rejected
    /// the message; the caller cannot tell the two apart.
    pub fn send_private(&self, message: Message) -> bool {
        let Some(recipient) = message.recipient() else {
            return false;
        };

        let Some(handle) = self.registry.lookup(recipient) else {
            debug!(recipient, "Private message recipient not registered");
            return false;
        };

        let sender = message.sender().to_string();
        match handle.deliver(message) {
            Ok(()) => {
                debug!(%sender, recipient = handle.nickname(), "Private message delivered");
                true
            }
            Err(e) => {
                debug!(recipient = handle.nickname(), "Private delivery failed: {}", e);
                false
            }
        }
    }

    /// Deliver a System notice to every session, sender included
    pub fn broadcast_system(&self, text: impl Into<String>) -> usize {
        let message = Message::system(text);
        info!("System notice: {}", message.text());

        let recipients = self.registry.snapshot_sessions();
        Self::fan_out(&recipients, ServerMessage::Chat(message))
    }

    fn fan_out(recipients: &[SessionHandle], msg: ServerMessage) -> usize {
        recipients
            .iter()
            .filter(|handle| match handle.deliver(msg.clone()) {
                Ok(()) => true,
                Err(e) => {
                    debug!(recipient = handle.nickname(), "Delivery skipped: {}", e);
                    false
                }
            })
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    use crate::message::MessageKind;
    use crate::session::Session;
    use crate::types::ConnectionId;

    fn join(router: &Router, name: &str) -> (Session, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(8);
        let session = Session::new(ConnectionId::new(), name.to_string(), tx);
        assert!(router.registry().register(name, session.handle()));
        (session, rx)
    }

    fn next_chat(rx: &mut mpsc::Receiver<ServerMessage>) -> Option<Message> {
        match rx.try_recv() {
            Ok(ServerMessage::Chat(msg)) => Some(msg),
            _ => None,
        }
    }

    #[test]
    fn test_broadcast_skips_sender() {
        let router = Router::default();
        let (_alice, mut alice_rx) = join(&router, "alice");
        let (_bob, mut bob_rx) = join(&router, "bob");
        let (_carol, mut carol_rx) = join(&router, "carol");

        let delivered = router.broadcast(Message::broadcast("alice", "hello"));

        assert_eq!(delivered, 2);
        assert!(next_chat(&mut alice_rx).is_none());
        assert_eq!(next_chat(&mut bob_rx).map(|m| m.text().to_string()), Some("hello".into()));
        assert_eq!(next_chat(&mut carol_rx).map(|m| m.text().to_string()), Some("hello".into()));
    }

    #[test]
    fn test_broadcast_survives_dead_recipient() {
        let router = Router::default();
        let (_alice, _alice_rx) = join(&router, "alice");
        let (bob, bob_rx) = join(&router, "bob");
        let (_carol, mut carol_rx) = join(&router, "carol");

        // still registered, connection already gone
        drop(bob_rx);
        bob.close();

        let delivered = router.broadcast(Message::broadcast("alice", "still here"));

        assert_eq!(delivered, 1);
        assert!(next_chat(&mut carol_rx).is_some());
    }

    #[test]
    fn test_send_private_delivers_to_recipient_only() {
        let router = Router::default();
        let (_alice, mut alice_rx) = join(&router, "alice");
        let (_bob, mut bob_rx) = join(&router, "bob");
        let (_carol, mut carol_rx) = join(&router, "carol");

        assert!(router.send_private(Message::private("alice", "bob", "hi")));

        let msg = next_chat(&mut bob_rx).unwrap();
        assert_eq!(msg.kind(), MessageKind::Private);
        assert_eq!(msg.recipient(), Some("bob"));
        assert!(alice_rx.try_recv().is_err());
        assert!(carol_rx.try_recv().is_err());
    }

    #[test]
    fn test_send_private_unknown_recipient() {
        let router = Router::default();
        let (_alice, mut alice_rx) = join(&router, "alice");
        let (_bob, mut bob_rx) = join(&router, "bob");

        assert!(!router.send_private(Message::private("alice", "carol", "hi")));
        assert!(alice_rx.try_recv().is_err());
        assert!(bob_rx.try_recv().is_err());
    }

    #[test]
    fn test_send_private_closed_recipient() {
        let router = Router::default();
        let (_alice, _alice_rx) = join(&router, "alice");
        let (bob, _bob_rx) = join(&router, "bob");
        bob.close();

        assert!(!router.send_private(Message::private("alice", "bob", "hi")));
    }

    #[test]
    fn test_broadcast_system_reaches_everyone() {
        let router = Router::default();
        let (_alice, mut alice_rx) = join(&router, "alice");
        let (_bob, mut bob_rx) = join(&router, "bob");

        assert_eq!(router.broadcast_system("alice joined the chat"), 2);

        for rx in [&mut alice_rx, &mut bob_rx] {
            let msg = next_chat(rx).unwrap();
            assert_eq!(msg.kind(), MessageKind::System);
            assert_eq!(msg.text(), "alice joined the chat");
        }
    }

    #[test]
    fn test_empty_registry() {
        let router = Router::default();
        assert_eq!(router.broadcast(Message::broadcast("ghost", "anyone?")), 0);
        assert_eq!(router.broadcast_system("nobody here"), 0);
    }
}
