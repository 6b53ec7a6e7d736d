use common::event::{Event, GenericEvent};
use tokio::sync::broadcast;
use tracing::trace;

/// A published event together with the channel it was sent to.
#[derive(Debug, Clone)]
pub struct ChannelEvent {
    pub channel: String,
    pub event: GenericEvent,
}

/// Fire-and-forget event delivery. Publishing never waits for receivers.
pub trait EventSink: Send + Sync {
    fn publish(&self, channel: &str, event: GenericEvent);
}

pub trait EventSinkExt: EventSink {
    fn publish_event<E: Event>(&self, channel: &str, event: &E) {
        self.publish(channel, event.to_generic_event());
    }
}

impl<T: ?Sized + EventSink> EventSinkExt for T {}

/// In-process sink backed by a tokio broadcast channel.
///
/// Slow subscribers lag and lose the oldest events instead of blocking publishers.
pub struct BroadcastSink {
    tx: broadcast::Sender<ChannelEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.tx.subscribe()
    }
}

impl EventSink for BroadcastSink {
    fn publish(&self, channel: &str, event: GenericEvent) {
        let topic = event.topic.clone();
        let delivered = self
            .tx
            .send(ChannelEvent {
                channel: channel.to_string(),
                event,
            })
            .unwrap_or(0);
        trace!(channel, topic = %topic, delivered, "Event published");
    }
}
