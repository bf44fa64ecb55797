//! Live socket connection tracking & forced disconnection.
//!
//! Each upgraded socket is registered with a lightweight record keeping its
//! namespace and age. During gateway close every live connection receives a
//! disconnect signal through a broadcast channel before the endpoints are
//! disposed.
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use scc::HashMap;
use tokio::sync::broadcast;

/// Unique identifier for a live socket connection
pub type SocketId = u64;

/// Information about an active socket connection.
#[derive(Debug, Clone)]
pub struct SocketInfo {
    pub id: SocketId,
    pub namespace: String,
    pub connected_at: Instant,
}

impl SocketInfo {
    pub fn new(id: SocketId, namespace: impl Into<String>) -> Self {
        Self {
            id,
            namespace: namespace.into(),
            connected_at: Instant::now(),
        }
    }

    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

/// Tracks live socket connections and broadcasts forced disconnects.
#[derive(Clone)]
pub struct SocketTracker {
    sockets: Arc<HashMap<SocketId, Arc<SocketInfo>>>,
    next_id: Arc<AtomicU64>,
    disconnect_tx: broadcast::Sender<()>,
}

impl Default for SocketTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SocketTracker {
    /// Create a new empty tracker.
    pub fn new() -> Self {
        let (disconnect_tx, _) = broadcast::channel(16);
        Self {
            sockets: Arc::new(HashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
            disconnect_tx,
        }
    }

    /// Register a new connection. Returns its info record plus a receiver
    /// that fires when a forced disconnect is requested.
    pub fn register(&self, namespace: &str) -> (Arc<SocketInfo>, broadcast::Receiver<()>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let info = Arc::new(SocketInfo::new(id, namespace));

        let _ = self.sockets.insert(id, info.clone());

        tracing::debug!(
            "Socket registered: id={}, namespace={}, total_sockets={}",
            id,
            namespace,
            self.sockets.len()
        );

        (info, self.disconnect_tx.subscribe())
    }

    /// Remove (unregister) a connection by id.
    pub fn unregister(&self, socket_id: SocketId) {
        if let Some((_, info)) = self.sockets.remove(&socket_id) {
            tracing::debug!(
                "Socket unregistered: id={}, age={:?}, total_sockets={}",
                socket_id,
                info.age(),
                self.sockets.len()
            );
        }
    }

    /// Number of currently tracked connections.
    pub fn active_count(&self) -> usize {
        self.sockets.len()
    }

    /// Signal every live connection to close. Connections unregister
    /// themselves once their task observes the signal.
    pub fn disconnect_all(&self) {
        let live = self.sockets.len();
        if live > 0 {
            tracing::info!("Disconnecting {} live socket connection(s)", live);
        }
        let _ = self.disconnect_tx.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_and_unregister_update_count() {
        let tracker = SocketTracker::new();
        assert_eq!(tracker.active_count(), 0);

        let (info_a, _rx_a) = tracker.register("/chat");
        let (info_b, _rx_b) = tracker.register("/");
        assert_eq!(tracker.active_count(), 2);
        assert_ne!(info_a.id, info_b.id);

        tracker.unregister(info_a.id);
        assert_eq!(tracker.active_count(), 1);

        // Unregistering twice is harmless.
        tracker.unregister(info_a.id);
        assert_eq!(tracker.active_count(), 1);
    }

    #[tokio::test]
    async fn disconnect_all_reaches_every_subscriber() {
        let tracker = SocketTracker::new();
        let (_info_a, mut rx_a) = tracker.register("/chat");
        let (_info_b, mut rx_b) = tracker.register("/chat");

        tracker.disconnect_all();

        assert!(rx_a.recv().await.is_ok());
        assert!(rx_b.recv().await.is_ok());
    }

    #[tokio::test]
    async fn disconnect_all_without_connections_is_a_noop() {
        let tracker = SocketTracker::new();
        tracker.disconnect_all();
        assert_eq!(tracker.active_count(), 0);
    }
}
