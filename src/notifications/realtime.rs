use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::notifications::NotificationKind;

/// Event pushed to a user's live connections
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeEvent {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub payload: serde_json::Value,
}

/// Best-effort fan-out to connected clients
pub trait RealtimePublisher: Send + Sync {
    fn publish(&self, event: RealtimeEvent);
}

/// Publisher on a tokio broadcast channel; each live connection subscribes
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<RealtimeEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}

impl RealtimePublisher for BroadcastPublisher {
    fn publish(&self, event: RealtimeEvent) {
        // An error only means nobody is listening right now
        if self.sender.send(event).is_err() {
            tracing::trace!("realtime event dropped, no live connections");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(user_id: Uuid) -> RealtimeEvent {
        RealtimeEvent {
            user_id,
            kind: NotificationKind::BookingRequested,
            title: "New booking request".to_string(),
            payload: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let publisher = BroadcastPublisher::new(8);
        let mut rx = publisher.subscribe();
        let user = Uuid::new_v4();

        publisher.publish(event(user));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.user_id, user);
        assert_eq!(received.kind, NotificationKind::BookingRequested);
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        BroadcastPublisher::default().publish(event(Uuid::new_v4()));
    }
}
