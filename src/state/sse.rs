use std::sync::{Arc, Weak};

use dashmap::DashMap;
use futures::{FutureExt, future::BoxFuture};
use tokio::sync::broadcast;
use tracing::debug;

use crate::{
    dto::sse::ServerEvent,
    services::sse_events,
    state::{
        broadcast::{BroadcastTransport, PublishError, QuizEvent, SessionChannel},
        game::SessionId,
    },
};

/// Simple broadcast hub wrapper used by the SSE services.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers. Having no subscriber is not an error.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }
}

/// In-process broadcast transport: one [`SseHub`] per session id.
pub struct SessionHubs {
    hubs: DashMap<SessionId, Arc<SseHub>>,
    capacity: usize,
}

impl SessionHubs {
    /// Create an empty set of hubs whose channels buffer `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            hubs: DashMap::new(),
            capacity,
        }
    }

    /// Subscribe to the events of `session_id`, if its channel is open.
    pub fn subscribe(&self, session_id: &str) -> Option<broadcast::Receiver<ServerEvent>> {
        self.hubs.get(session_id).map(|hub| hub.subscribe())
    }

    /// Number of channels currently open.
    pub fn open_channels(&self) -> usize {
        self.hubs.len()
    }
}

impl BroadcastTransport for SessionHubs {
    fn open(&self, session_id: &str) -> Arc<dyn SessionChannel> {
        let hub = self
            .hubs
            .entry(session_id.to_owned())
            .or_insert_with(|| Arc::new(SseHub::new(self.capacity)))
            .clone();
        debug!(%session_id, "opened session channel");

        Arc::new(HubChannel {
            session_id: session_id.to_owned(),
            hub: Arc::downgrade(&hub),
        })
    }

    fn close(&self, session_id: &str) {
        if self.hubs.remove(session_id).is_some() {
            debug!(%session_id, "closed session channel");
        }
    }
}

/// Publishing handle for one hub. Holds a weak reference so a closed channel
/// reports [`PublishError::ChannelClosed`] instead of keeping the hub alive.
struct HubChannel {
    session_id: SessionId,
    hub: Weak<SseHub>,
}

impl SessionChannel for HubChannel {
    fn publish(&self, event: QuizEvent) -> BoxFuture<'static, Result<(), PublishError>> {
        let result = match self.hub.upgrade() {
            Some(hub) => sse_events::to_server_event(&event)
                .map(|payload| hub.broadcast(payload))
                .map_err(PublishError::from),
            None => Err(PublishError::ChannelClosed {
                session_id: self.session_id.clone(),
            }),
        };

        futures::future::ready(result).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let hubs = SessionHubs::new(8);
        let channel = hubs.open("s1");
        let mut receiver = hubs.subscribe("s1").unwrap();

        channel.publish(QuizEvent::status("hello")).await.unwrap();

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.event.as_deref(), Some("quiz-update"));
        assert_eq!(received.data, "\"hello\"");
    }

    #[tokio::test]
    async fn publishing_without_subscribers_succeeds() {
        let hubs = SessionHubs::new(8);
        let channel = hubs.open("s1");
        assert!(channel.publish(QuizEvent::End("bye".into())).await.is_ok());
    }

    #[tokio::test]
    async fn publishing_after_close_fails() {
        let hubs = SessionHubs::new(8);
        let channel = hubs.open("s1");
        hubs.close("s1");

        let err = channel.publish(QuizEvent::status("late")).await.unwrap_err();
        assert!(matches!(err, PublishError::ChannelClosed { session_id } if session_id == "s1"));
        assert!(hubs.subscribe("s1").is_none());
        assert_eq!(hubs.open_channels(), 0);
    }

    #[tokio::test]
    async fn channels_are_isolated_per_session() {
        let hubs = SessionHubs::new(8);
        let first = hubs.open("s1");
        let _second = hubs.open("s2");
        let mut other = hubs.subscribe("s2").unwrap();

        first.publish(QuizEvent::status("only s1")).await.unwrap();

        assert!(matches!(
            other.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn closing_ends_subscriber_stream_after_buffered_events() {
        let hubs = SessionHubs::new(8);
        let channel = hubs.open("s1");
        let mut receiver = hubs.subscribe("s1").unwrap();

        channel.publish(QuizEvent::End("done".into())).await.unwrap();
        hubs.close("s1");

        assert_eq!(receiver.recv().await.unwrap().event.as_deref(), Some("quiz-end"));
        assert!(matches!(
            receiver.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }
}
