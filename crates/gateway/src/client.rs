//! Per-connection client state.

use crate::error::{GatewayError, Result};
use crate::protocol::ServerPush;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Capacity of each client's outbound push queue. Small on purpose: a slow
/// client loses intermediate broadcasts rather than stalling the broker, and
/// every push is a full snapshot so gaps are harmless.
pub const CLIENT_QUEUE_CAPACITY: usize = 5;

/// Context key for the question the connection is currently viewing.
pub const CTX_SELECTED_QUESTION: &str = "question";

/// State for a single connected client.
///
/// Owned by the session pipeline that created it; the broker registry and
/// in-flight request handlers hold `Arc` references only. The paired
/// receiver returned by [`ActiveClient::new`] is consumed by the writer
/// loop and dies with the connection.
pub struct ActiveClient {
    /// Opaque identifier for this connection, used in logs.
    pub request_id: Uuid,
    /// Session identifier, stable across reconnects for the same participant.
    pub session: String,
    /// Bounded outbound queue of pending pushes.
    tx: mpsc::Sender<Arc<ServerPush>>,
    /// Free-form context scoped to this connection's lifetime.
    context: DashMap<String, String>,
    /// Unix millis when the connection was established.
    pub connected_at: i64,
}

impl ActiveClient {
    /// Create a client and the receiving end of its outbound queue.
    pub fn new(session: String) -> (Arc<Self>, mpsc::Receiver<Arc<ServerPush>>) {
        let (tx, rx) = mpsc::channel(CLIENT_QUEUE_CAPACITY);
        let client = Arc::new(Self {
            request_id: Uuid::new_v4(),
            session,
            tx,
            context: DashMap::new(),
            connected_at: Utc::now().timestamp_millis(),
        });
        (client, rx)
    }

    /// Queue a unicast push, waiting for capacity if the queue is full.
    /// Fails only once the connection is torn down.
    pub async fn send(&self, push: ServerPush) -> Result<()> {
        self.tx
            .send(Arc::new(push))
            .await
            .map_err(|_| GatewayError::ChannelSend)
    }

    /// Non-blocking enqueue used by broadcasts. Returns false when the
    /// queue is full or closed; the push is dropped for this client only.
    pub fn try_send(&self, push: Arc<ServerPush>) -> bool {
        self.tx.try_send(push).is_ok()
    }

    /// Question this connection is currently viewing, if any.
    pub fn selected_question(&self) -> Option<String> {
        self.context.get(CTX_SELECTED_QUESTION).map(|q| q.clone())
    }

    /// Record the question this connection is viewing.
    pub fn set_selected_question(&self, question: &str) {
        self.context
            .insert(CTX_SELECTED_QUESTION.to_string(), question.to_string());
    }

    /// Seconds this connection has been open.
    pub fn uptime_secs(&self) -> i64 {
        (Utc::now().timestamp_millis() - self.connected_at) / 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_send_drops_when_full() {
        let (client, mut rx) = ActiveClient::new("s1".into());
        let push = Arc::new(ServerPush::Error { error: "x".into() });

        for _ in 0..CLIENT_QUEUE_CAPACITY {
            assert!(client.try_send(push.clone()));
        }
        // Queue is full: the next enqueue is refused, nothing blocks.
        assert!(!client.try_send(push.clone()));

        let mut drained = 0;
        while rx.try_recv().is_ok() {
            drained += 1;
        }
        assert_eq!(drained, CLIENT_QUEUE_CAPACITY);
    }

    #[test]
    fn test_selected_question_roundtrip() {
        let (client, _rx) = ActiveClient::new("s1".into());
        assert_eq!(client.selected_question(), None);
        client.set_selected_question("best editor?");
        assert_eq!(client.selected_question().as_deref(), Some("best editor?"));
    }
}
