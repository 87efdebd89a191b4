//! In-process broadcast bus.
//!
//! [`BroadcastBus`] fans every envelope out to all live subscriptions through a
//! `tokio::sync::broadcast` channel. It keeps the guarantees of the
//! [`MessageBus`] contract and nothing more:
//!
//! - subscribers never see their own envelopes
//! - a subscription only sees envelopes published after it was opened
//! - a subscriber that falls more than `capacity` envelopes behind loses the
//!   oldest ones (logged, counted, never surfaced as an error)

use crate::metrics::BusMetrics;
use queue_relay_core::message_bus::{
    Envelope, MessageBus, MessageBusError, MessageStream, ParticipantId,
};
use tokio::sync::broadcast::{self, error::RecvError};

/// Default number of envelopes buffered per subscriber.
pub const DEFAULT_CAPACITY: usize = 64;

/// Lossy, broadcast-only, in-process message bus.
#[derive(Debug, Clone)]
pub struct BroadcastBus {
    sender: broadcast::Sender<Envelope>,
}

impl BroadcastBus {
    /// Create a bus buffering at most `capacity` envelopes per subscriber.
    ///
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Number of currently open subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl MessageBus for BroadcastBus {
    fn publish(&self, envelope: Envelope) -> Result<(), MessageBusError> {
        let message_type = envelope.message_type.clone();
        let origin = envelope.origin;

        // No receivers is not an error: the message is simply never heard.
        let receivers = self.sender.send(envelope).unwrap_or(0);
        BusMetrics::record_publish(receivers);

        tracing::trace!(%origin, message_type, receivers, "Envelope published");
        Ok(())
    }

    fn subscribe(&self, participant: ParticipantId) -> Result<MessageStream, MessageBusError> {
        let mut receiver = self.sender.subscribe();
        tracing::debug!(%participant, "Subscription opened");

        let stream = async_stream::stream! {
            loop {
                match receiver.recv().await {
                    Ok(envelope) => {
                        if envelope.origin == participant {
                            continue;
                        }
                        BusMetrics::record_delivery();
                        yield envelope;
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        BusMetrics::record_lost(skipped);
                        tracing::warn!(%participant, skipped, "Subscriber lagged, envelopes lost");
                    },
                    Err(RecvError::Closed) => {
                        tracing::debug!(%participant, "Bus closed, subscription ended");
                        break;
                    },
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::time::Duration;

    fn envelope(origin: ParticipantId, tag: &str) -> Envelope {
        Envelope::new(origin, tag.to_string(), tag.as_bytes().to_vec())
    }

    #[tokio::test]
    #[allow(clippy::unwrap_used)]
    async fn test_publisher_does_not_hear_itself() {
        let bus = BroadcastBus::default();
        let me = ParticipantId::new();
        let other = ParticipantId::new();
        let mut mine = bus.subscribe(me).unwrap();

        bus.publish(envelope(me, "SELF")).unwrap();
        bus.publish(envelope(other, "OTHER")).unwrap();

        let received = mine.next().await.unwrap();
        assert_eq!(received.message_type, "OTHER");
    }

    #[tokio::test]
    #[allow(clippy::unwrap_used)]
    async fn test_publish_without_subscribers_is_dropped() {
        let bus = BroadcastBus::default();
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.publish(envelope(ParticipantId::new(), "LOST")).is_ok());

        // A late subscriber does not see earlier traffic.
        let mut late = bus.subscribe(ParticipantId::new()).unwrap();
        let next = tokio::time::timeout(Duration::from_millis(20), late.next()).await;
        assert!(next.is_err());
    }

    #[tokio::test]
    #[allow(clippy::unwrap_used)]
    async fn test_lagging_subscriber_loses_oldest() {
        let bus = BroadcastBus::new(2);
        let sender = ParticipantId::new();
        let mut slow = bus.subscribe(ParticipantId::new()).unwrap();

        for tag in ["A", "B", "C", "D"] {
            bus.publish(envelope(sender, tag)).unwrap();
        }

        assert_eq!(slow.next().await.unwrap().message_type, "C");
        assert_eq!(slow.next().await.unwrap().message_type, "D");
    }

    #[tokio::test]
    #[allow(clippy::unwrap_used)]
    async fn test_stream_ends_when_bus_dropped() {
        let bus = BroadcastBus::default();
        let mut stream = bus.subscribe(ParticipantId::new()).unwrap();
        drop(bus);

        assert!(stream.next().await.is_none());
    }
}
