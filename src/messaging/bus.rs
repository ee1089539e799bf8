//! Message bus between the chat loop and the renderer.

use tokio::sync::broadcast;
use tracing::trace;

use super::Message;
use crate::config::RenderMode;
use crate::session::SessionId;
use crate::stream::RenderedThought;

/// Capacity of the broadcast channel. A long reasoning trace plus a few
/// hundred scrape log lines fit without lagging.
const BUS_CAPACITY: usize = 512;

/// Sender half of the message bus.
#[derive(Clone)]
pub struct MessageSender {
    tx: broadcast::Sender<Message>,
}

impl MessageSender {
    /// Send a message.
    pub fn send(&self, message: Message) -> Result<(), BusError> {
        self.tx.send(message).map_err(|_| BusError::Closed)?;
        Ok(())
    }

    /// Send, ignoring a bus without subscribers.
    fn publish(&self, message: Message) {
        if self.send(message).is_err() {
            trace!("Message dropped: no subscribers");
        }
    }

    pub fn info(&self, text: impl Into<String>) {
        self.publish(Message::info(text));
    }

    pub fn success(&self, text: impl Into<String>) {
        self.publish(Message::success(text));
    }

    pub fn warning(&self, text: impl Into<String>) {
        self.publish(Message::warning(text));
    }

    pub fn error(&self, text: impl Into<String>) {
        self.publish(Message::error(text));
    }

    /// Publish one reasoning log entry for `session`.
    pub fn thought(&self, session: SessionId, entry: &RenderedThought) {
        self.publish(Message::thought(session, entry.clone()));
    }

    /// Publish a model answer for `session`.
    pub fn answer(&self, session: SessionId, raw: &str, render: RenderMode) {
        self.publish(Message::answer(session, raw, render));
    }

    /// Publish a maintenance job log line.
    pub fn process(&self, process: &str, line: impl Into<String>) {
        self.publish(Message::process(process, line));
    }

    pub fn divider(&self) {
        self.publish(Message::Divider);
    }
}

/// Receiver half of the message bus.
pub struct MessageReceiver {
    rx: broadcast::Receiver<Message>,
}

impl MessageReceiver {
    /// Receive the next message.
    #[cfg(test)]
    pub async fn recv(&mut self) -> Result<Message, BusError> {
        self.rx.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => BusError::Closed,
            broadcast::error::RecvError::Lagged(n) => BusError::Lagged(n),
        })
    }

    /// Try to receive a message without waiting.
    pub fn try_recv(&mut self) -> Result<Option<Message>, BusError> {
        match self.rx.try_recv() {
            Ok(msg) => Ok(Some(msg)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(broadcast::error::TryRecvError::Closed) => Err(BusError::Closed),
            Err(broadcast::error::TryRecvError::Lagged(n)) => Err(BusError::Lagged(n)),
        }
    }
}

/// Broadcast bus for display messages.
pub struct MessageBus {
    tx: broadcast::Sender<Message>,
}

impl MessageBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    pub fn sender(&self) -> MessageSender {
        MessageSender {
            tx: self.tx.clone(),
        }
    }

    pub fn subscribe(&self) -> MessageReceiver {
        MessageReceiver {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Bus errors.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Channel closed")]
    Closed,
    #[error("Lagged behind by {0} messages")]
    Lagged(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::MessageLevel;
    use crate::stream::{StepKind, ThoughtEvent};

    // =========================================================================
    // Sender Tests
    // =========================================================================

    #[test]
    fn test_send_without_subscribers_is_closed() {
        let bus = MessageBus::new();
        let result = bus.sender().send(Message::info("nobody listens"));
        assert!(matches!(result, Err(BusError::Closed)));
    }

    #[test]
    fn test_helpers_ignore_missing_subscribers() {
        let bus = MessageBus::new();
        let sender = bus.sender();
        sender.info("a");
        sender.error("b");
        sender.divider();
    }

    #[test]
    fn test_level_helpers() {
        let bus = MessageBus::new();
        let sender = bus.sender();
        let mut receiver = bus.subscribe();

        sender.success("ok");
        sender.warning("hmm");
        let levels: Vec<MessageLevel> = std::iter::from_fn(|| receiver.try_recv().unwrap())
            .map(|m| match m {
                Message::Text(t) => t.level,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(levels, vec![MessageLevel::Success, MessageLevel::Warning]);
    }

    #[test]
    fn test_thought_and_answer_are_tagged() {
        let bus = MessageBus::new();
        let sender = bus.sender();
        let mut receiver = bus.subscribe();
        let session = SessionId::new();

        let entry = RenderedThought::render(&ThoughtEvent::text(StepKind::Retrieval, "cari"));
        sender.thought(session, &entry);
        sender.answer(session, "Jawaban", RenderMode::Terminal);

        let first = receiver.try_recv().unwrap().unwrap();
        let second = receiver.try_recv().unwrap().unwrap();
        assert_eq!(first.session(), Some(session));
        assert_eq!(second.session(), Some(session));
        assert!(matches!(second, Message::Answer(ref a) if a.content == "Jawaban"));
    }

    #[test]
    fn test_multiple_subscribers() {
        let bus = MessageBus::new();
        let sender = bus.sender();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        sender.process("Indexing", "Loading documents...");
        assert!(a.try_recv().unwrap().is_some());
        assert!(b.try_recv().unwrap().is_some());
    }

    // =========================================================================
    // Receiver Tests
    // =========================================================================

    #[test]
    fn test_try_recv_empty() {
        let bus = MessageBus::new();
        let mut receiver = bus.subscribe();
        assert!(receiver.try_recv().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recv_preserves_order_across_tasks() {
        let bus = MessageBus::new();
        let sender = bus.sender();
        let mut receiver = bus.subscribe();

        tokio::spawn(async move {
            for i in 0..5 {
                sender.info(format!("line {}", i));
            }
        })
        .await
        .unwrap();

        for i in 0..5 {
            match receiver.recv().await.unwrap() {
                Message::Text(t) => assert_eq!(t.text, format!("line {}", i)),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_recv_closed_after_bus_dropped() {
        let bus = MessageBus::new();
        let mut receiver = bus.subscribe();
        drop(bus);
        assert!(matches!(receiver.recv().await, Err(BusError::Closed)));
    }

    #[test]
    fn test_try_recv_lagged() {
        let bus = MessageBus::new();
        let sender = bus.sender();
        let mut receiver = bus.subscribe();

        for i in 0..(BUS_CAPACITY + 3) {
            sender.info(format!("{}", i));
        }
        assert!(matches!(receiver.try_recv(), Err(BusError::Lagged(3))));
        // Continues with the oldest retained message.
        assert!(receiver.try_recv().unwrap().is_some());
    }

    #[test]
    fn test_bus_error_display() {
        assert_eq!(BusError::Closed.to_string(), "Channel closed");
        assert_eq!(BusError::Lagged(7).to_string(), "Lagged behind by 7 messages");
    }
}
