use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::{BookingEvent, RoomId};

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for booking events, one channel per room.
pub struct NotifyHub {
    channels: DashMap<RoomId, broadcast::Sender<BookingEvent>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to a room's events. Creates the channel if needed.
    pub fn subscribe(&self, room_id: &str) -> broadcast::Receiver<BookingEvent> {
        if let Some(sender) = self.channels.get(room_id) {
            return sender.subscribe();
        }
        let sender = self
            .channels
            .entry(room_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send an event. No-op if nobody is listening.
    pub fn send(&self, room_id: &str, event: &BookingEvent) {
        if let Some(sender) = self.channels.get(room_id) {
            let _ = sender.send(event.clone());
        }
    }

    /// Drop a room's channel once its last receiver is gone. Returns whether
    /// the channel was removed.
    pub fn release(&self, room_id: &str) -> bool {
        self.channels
            .remove_if(room_id, |_, sender| sender.receiver_count() == 0)
            .is_some()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn subscriber_count(&self, room_id: &str) -> usize {
        self.channels
            .get(room_id)
            .map_or(0, |s| s.receiver_count())
    }
}
