//! Per-room broadcast hubs backing the SSE push streams.

use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::dto::sse::ServerEvent;

/// Registry of broadcast channels keyed by room code.
///
/// A hub is created lazily on first subscription and dropped once the race
/// finishes, so abandoned rooms do not accumulate channels. Broadcasting into
/// a room nobody listens to is a no-op.
pub struct RoomChannels {
    hubs: DashMap<String, broadcast::Sender<ServerEvent>>,
    capacity: usize,
}

impl RoomChannels {
    /// Build the registry with a per-room channel capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            hubs: DashMap::new(),
            capacity,
        }
    }

    /// Register a subscriber for the given room, creating its hub if needed.
    pub fn subscribe(&self, code: &str) -> broadcast::Receiver<ServerEvent> {
        let sender = self
            .hubs
            .entry(code.to_owned())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        sender.subscribe()
    }

    /// Send an event to all current subscribers of the room, ignoring delivery errors.
    pub fn broadcast(&self, code: &str, event: ServerEvent) {
        if let Some(sender) = self.hubs.get(code) {
            let _ = sender.send(event);
        }
    }

    /// Drop the room's hub; pending subscribers observe a closed channel.
    pub fn close(&self, code: &str) {
        self.hubs.remove(code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_room_subscribers() {
        let rooms = RoomChannels::new(4);
        let mut receiver = rooms.subscribe("ABC123");

        rooms.broadcast("ABC123", ServerEvent::new(Some("ping".into()), "{}".into()));
        let event = receiver.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some("ping"));
    }

    #[tokio::test]
    async fn broadcast_to_other_room_is_isolated() {
        let rooms = RoomChannels::new(4);
        let mut receiver = rooms.subscribe("ABC123");

        rooms.broadcast("XYZ789", ServerEvent::new(None, "{}".into()));
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn close_terminates_the_stream() {
        let rooms = RoomChannels::new(4);
        let mut receiver = rooms.subscribe("ABC123");

        rooms.close("ABC123");
        assert!(matches!(
            receiver.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }
}
