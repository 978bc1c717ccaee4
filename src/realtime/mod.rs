//! Post change notifications pushed to WebSocket clients.
//!
//! Every successful create, update or delete publishes a [`PostEvent`] on
//! the [`EventBus`]. Each connection on `/socket` holds its own receiver
//! and forwards events as JSON text frames.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use crate::api::format::PostView;
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum PostEvent {
    Create { post: PostView },
    Update { post: PostView },
    Delete { post: Uuid },
}

impl PostEvent {
    pub fn action(&self) -> &'static str {
        match self {
            PostEvent::Create { .. } => "create",
            PostEvent::Update { .. } => "update",
            PostEvent::Delete { .. } => "delete",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PostEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Returns the number of connected subscribers; zero is not an error.
    pub fn publish(&self, event: PostEvent) -> usize {
        let action = event.action();
        match self.tx.send(event) {
            Ok(count) => {
                tracing::debug!("Post {} event sent to {} subscribers", action, count);
                count
            }
            Err(_) => {
                tracing::debug!("Post {} event dropped, no subscribers", action);
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PostEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// GET /socket
pub async fn socket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let rx = state.events.subscribe();
    ws.on_upgrade(move |socket: WebSocket| {
        let (sender, receiver) = socket.split();
        forward_events(sender, receiver, rx)
    })
}

async fn forward_events<S, R>(mut sender: S, mut receiver: R, mut rx: broadcast::Receiver<PostEvent>)
where
    S: Sink<Message> + Unpin,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    tracing::info!("Socket client connected");

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => {
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::error!("Failed to serialize post event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Socket client lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                // Clients have nothing to say on this channel.
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::info!("Socket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::format::CreatorView;
    use chrono::Utc;

    fn view() -> PostView {
        PostView {
            id: Uuid::new_v4(),
            title: "Hello world".into(),
            content: "Some content".into(),
            image_url: "images/a.png".into(),
            creator: CreatorView {
                id: Uuid::new_v4(),
                name: "Max".into(),
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn events_serialize_with_action_tag() {
        let post = view();
        let value = serde_json::to_value(PostEvent::Create { post: post.clone() }).unwrap();
        assert_eq!(value["action"], "create");
        assert_eq!(value["post"]["title"], "Hello world");

        let value = serde_json::to_value(PostEvent::Delete { post: post.id }).unwrap();
        assert_eq!(value["action"], "delete");
        assert_eq!(value["post"], post.id.to_string());
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let bus = EventBus::new(8);
        assert_eq!(bus.publish(PostEvent::Delete { post: Uuid::new_v4() }), 0);
    }

    #[tokio::test]
    async fn subscribers_receive_events() {
        let bus = EventBus::new(8);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let post = view();
        assert_eq!(bus.publish(PostEvent::Update { post: post.clone() }), 2);

        assert_eq!(a.recv().await.unwrap(), PostEvent::Update { post: post.clone() });
        assert_eq!(b.recv().await.unwrap().action(), "update");
    }

    fn text_event(frame: Option<Message>) -> PostEvent {
        match frame {
            Some(Message::Text(text)) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected a text frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn lagging_client_skips_to_latest_events() {
        let bus = EventBus::new(1);
        let rx = bus.subscribe();
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            bus.publish(PostEvent::Delete { post: *id });
        }

        let (out_tx, mut out_rx) = futures::channel::mpsc::unbounded::<Message>();
        let (in_tx, in_rx) = futures::channel::mpsc::unbounded::<Result<Message, axum::Error>>();
        let task = tokio::spawn(forward_events(out_tx, in_rx, rx));

        assert_eq!(text_event(out_rx.next().await), PostEvent::Delete { post: ids[2] });

        let post = view();
        bus.publish(PostEvent::Create { post: post.clone() });
        assert_eq!(text_event(out_rx.next().await), PostEvent::Create { post });

        drop(in_tx);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn close_frame_ends_the_session() {
        let bus = EventBus::new(8);
        let (out_tx, _out_rx) = futures::channel::mpsc::unbounded::<Message>();
        let (in_tx, in_rx) = futures::channel::mpsc::unbounded::<Result<Message, axum::Error>>();
        let task = tokio::spawn(forward_events(out_tx, in_rx, bus.subscribe()));
        assert_eq!(bus.subscriber_count(), 1);

        in_tx.unbounded_send(Ok(Message::Text("ignored".into()))).unwrap();
        in_tx.unbounded_send(Ok(Message::Close(None))).unwrap();
        task.await.unwrap();
        assert_eq!(bus.subscriber_count(), 0);
    }
}
