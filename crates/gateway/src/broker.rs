//! Connection broker: single authority over the live client registry.
//!
//! The registry is confined to one control-loop task and is reached only
//! through the command channel, so registry mutations are strictly ordered
//! and need no locks. Aggregate throughput counters are atomics because the
//! per-connection writer loops and the stat reporter touch them concurrently
//! and only need monotonic reads.

use crate::client::ActiveClient;
use crate::protocol::ServerPush;
use metrics::{counter, gauge};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Capacity of the broker's command channel.
const COMMAND_QUEUE_CAPACITY: usize = 100;

/// Commands accepted by the control loop.
pub(crate) enum BrokerCommand {
    Register(Arc<ActiveClient>),
    Deregister(Arc<ActiveClient>),
    Broadcast(Arc<ServerPush>),
}

/// Aggregate counters shared across writer loops and the stat reporter.
#[derive(Default)]
pub struct BrokerStats {
    active_clients: AtomicI64,
    messages_sent: AtomicU64,
    bytes_sent: AtomicU64,
}

impl BrokerStats {
    pub fn active_clients(&self) -> i64 {
        self.active_clients.load(Ordering::Relaxed)
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    /// Called from writer loops after each successful transport write.
    pub fn record_send(&self, bytes: usize) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    fn client_added(&self) {
        self.active_clients.fetch_add(1, Ordering::Relaxed);
    }

    fn client_removed(&self) {
        self.active_clients.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Handle to the broker's control loop. Cheap to clone.
#[derive(Clone)]
pub struct Broker {
    tx: mpsc::Sender<BrokerCommand>,
    stats: Arc<BrokerStats>,
}

impl Broker {
    /// Spawn the control loop and return a handle to it.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let stats = Arc::new(BrokerStats::default());
        tokio::spawn(control_loop(rx, stats.clone()));
        Self { tx, stats }
    }

    /// Insert or replace the registry entry for the client's session.
    /// Always succeeds.
    pub async fn register(&self, client: Arc<ActiveClient>) {
        let _ = self.tx.send(BrokerCommand::Register(client)).await;
    }

    /// Remove the registry entry for the client's session if present.
    /// Deregistering an unknown session is a no-op.
    pub async fn deregister(&self, client: Arc<ActiveClient>) {
        let _ = self.tx.send(BrokerCommand::Deregister(client)).await;
    }

    /// Queue a push for every registered client. Delivery is best-effort
    /// per client: a full queue drops the push for that client only.
    pub async fn broadcast(&self, push: ServerPush) {
        let _ = self.tx.send(BrokerCommand::Broadcast(Arc::new(push))).await;
    }

    /// Aggregate throughput counters.
    pub fn stats(&self) -> &Arc<BrokerStats> {
        &self.stats
    }
}

async fn control_loop(mut rx: mpsc::Receiver<BrokerCommand>, stats: Arc<BrokerStats>) {
    let mut registry = Registry::new(stats);
    while let Some(cmd) = rx.recv().await {
        registry.apply(cmd);
    }
    info!("broker control loop stopped");
}

/// Registry state owned exclusively by the control loop.
pub(crate) struct Registry {
    clients: HashMap<String, Arc<ActiveClient>>,
    stats: Arc<BrokerStats>,
}

impl Registry {
    pub(crate) fn new(stats: Arc<BrokerStats>) -> Self {
        Self {
            clients: HashMap::new(),
            stats,
        }
    }

    pub(crate) fn apply(&mut self, cmd: BrokerCommand) {
        match cmd {
            BrokerCommand::Register(client) => {
                let session = client.session.clone();
                let request_id = client.request_id;
                if let Some(prev) = self.clients.insert(session.clone(), client) {
                    // Same-session reconnect evicts the previous slot; the
                    // count stays in step with the registry size.
                    debug!(
                        "session {} replaced connection {} with {}",
                        session, prev.request_id, request_id
                    );
                } else {
                    self.stats.client_added();
                }
                info!("client {} registered for session {}", request_id, session);
                gauge!("gateway_active_connections").set(self.clients.len() as f64);
            }
            BrokerCommand::Deregister(client) => {
                if self.clients.remove(&client.session).is_some() {
                    self.stats.client_removed();
                    info!(
                        "client {} deregistered after {}s",
                        client.request_id,
                        client.uptime_secs()
                    );
                }
                gauge!("gateway_active_connections").set(self.clients.len() as f64);
            }
            BrokerCommand::Broadcast(push) => {
                for client in self.clients.values() {
                    if !client.try_send(push.clone()) {
                        counter!("gateway_broadcast_dropped_total").increment(1);
                        debug!("dropped broadcast for slow client {}", client.request_id);
                    }
                }
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.clients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::CLIENT_QUEUE_CAPACITY;

    fn registry() -> Registry {
        Registry::new(Arc::new(BrokerStats::default()))
    }

    fn error_push(msg: &str) -> Arc<ServerPush> {
        Arc::new(ServerPush::Error { error: msg.into() })
    }

    #[test]
    fn test_active_count_tracks_registry_size() {
        let mut reg = registry();
        let (a, _rx_a) = ActiveClient::new("s1".into());
        let (b, _rx_b) = ActiveClient::new("s2".into());
        let (a2, _rx_a2) = ActiveClient::new("s1".into());

        reg.apply(BrokerCommand::Register(a.clone()));
        reg.apply(BrokerCommand::Register(b.clone()));
        assert_eq!(reg.stats.active_clients(), 2);
        assert_eq!(reg.len(), 2);

        // Same-session reconnect replaces, never appends.
        reg.apply(BrokerCommand::Register(a2.clone()));
        assert_eq!(reg.stats.active_clients(), 2);
        assert_eq!(reg.len(), 2);

        reg.apply(BrokerCommand::Deregister(a2));
        assert_eq!(reg.stats.active_clients(), 1);
        assert_eq!(reg.len(), 1);

        // Deregistering an unknown session is a no-op.
        reg.apply(BrokerCommand::Deregister(a));
        assert_eq!(reg.stats.active_clients(), 1);
        assert_eq!(reg.len(), 1);

        reg.apply(BrokerCommand::Deregister(b));
        assert_eq!(reg.stats.active_clients(), 0);
        assert_eq!(reg.len(), 0);
    }

    #[test]
    fn test_broadcast_preserves_order_per_client() {
        let mut reg = registry();
        let (a, mut rx_a) = ActiveClient::new("s1".into());
        let (b, mut rx_b) = ActiveClient::new("s2".into());
        reg.apply(BrokerCommand::Register(a));
        reg.apply(BrokerCommand::Register(b));

        reg.apply(BrokerCommand::Broadcast(error_push("first")));
        reg.apply(BrokerCommand::Broadcast(error_push("second")));

        for rx in [&mut rx_a, &mut rx_b] {
            for expected in ["first", "second"] {
                match rx.try_recv().unwrap().as_ref() {
                    ServerPush::Error { error } => assert_eq!(error, expected),
                    other => panic!("unexpected push: {other:?}"),
                }
            }
        }
    }

    #[test]
    fn test_full_queue_drops_for_that_client_only() {
        let mut reg = registry();
        let (fast, mut rx_fast) = ActiveClient::new("s1".into());
        let (slow, mut rx_slow) = ActiveClient::new("s2".into());
        reg.apply(BrokerCommand::Register(fast));
        reg.apply(BrokerCommand::Register(slow.clone()));

        // Jam the slow client's queue.
        for _ in 0..CLIENT_QUEUE_CAPACITY {
            assert!(slow.try_send(error_push("filler")));
        }

        reg.apply(BrokerCommand::Broadcast(error_push("live")));

        match rx_fast.try_recv().unwrap().as_ref() {
            ServerPush::Error { error } => assert_eq!(error, "live"),
            other => panic!("unexpected push: {other:?}"),
        }

        // The slow client sees only its backlog; the broadcast was dropped.
        let mut seen = 0;
        while let Ok(push) = rx_slow.try_recv() {
            match push.as_ref() {
                ServerPush::Error { error } => assert_eq!(error, "filler"),
                other => panic!("unexpected push: {other:?}"),
            }
            seen += 1;
        }
        assert_eq!(seen, CLIENT_QUEUE_CAPACITY);
    }

    #[tokio::test]
    async fn test_spawned_broker_processes_commands() {
        let broker = Broker::spawn();
        let (client, mut rx) = ActiveClient::new("s1".into());
        broker.register(client.clone()).await;
        broker
            .broadcast(ServerPush::Error { error: "hello".into() })
            .await;

        let push = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .expect("broker did not deliver in time")
            .expect("queue closed");
        match push.as_ref() {
            ServerPush::Error { error } => assert_eq!(error, "hello"),
            other => panic!("unexpected push: {other:?}"),
        }
        assert_eq!(broker.stats().active_clients(), 1);
    }
}
