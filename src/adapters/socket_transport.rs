//! In-process realtime socket transport over axum WebSockets.
//!
//! The transport partitions event traffic into named namespaces. Socket
//! endpoints obtain a [`NamespaceHandle`] during activation, register connect
//! and message callbacks on it and keep it around for broadcasting. Clients
//! connect to `GET /ws` (default namespace) or `GET /ws/{namespace}`;
//! connections to namespaces no endpoint activated are refused.
use std::sync::{Arc, RwLock};

use axum::{
    Router,
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use futures_util::future::BoxFuture;
use scc::HashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};

use crate::utils::socket_tracker::{SocketId, SocketTracker};

/// Namespace used by endpoints that do not declare one of their own.
pub const DEFAULT_SOCKET_NAMESPACE: &str = "/";

const BROADCAST_BUFFER: usize = 256;

/// A single event frame on the wire (JSON text messages).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SocketMessage {
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl SocketMessage {
    pub fn new(event: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            payload,
        }
    }
}

/// Sender half of one live connection, handed to namespace callbacks.
#[derive(Clone)]
pub struct SocketConnection {
    id: SocketId,
    namespace: String,
    tx: mpsc::UnboundedSender<SocketMessage>,
}

impl SocketConnection {
    pub fn id(&self) -> SocketId {
        self.id
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Queue a message to this connection only. Returns false once the
    /// connection is gone.
    pub fn send(&self, message: SocketMessage) -> bool {
        self.tx.send(message).is_ok()
    }
}

type ConnectCallback = Arc<dyn Fn(SocketConnection) -> BoxFuture<'static, ()> + Send + Sync>;
type MessageCallback =
    Arc<dyn Fn(SocketConnection, SocketMessage) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Default)]
struct NamespaceCallbacks {
    on_connect: Option<ConnectCallback>,
    on_message: Option<MessageCallback>,
}

struct NamespaceInner {
    name: String,
    broadcast_tx: broadcast::Sender<SocketMessage>,
    callbacks: RwLock<NamespaceCallbacks>,
}

/// Handle to one namespace of the transport. Cheap to clone; endpoints keep
/// one for the lifetime of the gateway.
#[derive(Clone)]
pub struct NamespaceHandle(Arc<NamespaceInner>);

impl NamespaceHandle {
    fn new(name: String) -> Self {
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_BUFFER);
        Self(Arc::new(NamespaceInner {
            name,
            broadcast_tx,
            callbacks: RwLock::new(NamespaceCallbacks::default()),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Register the callback invoked for every new connection.
    pub fn on_connect<F>(&self, callback: F)
    where
        F: Fn(SocketConnection) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        if let Ok(mut callbacks) = self.0.callbacks.write() {
            callbacks.on_connect = Some(Arc::new(callback));
        }
    }

    /// Register the callback invoked for every inbound event frame.
    pub fn on_message<F>(&self, callback: F)
    where
        F: Fn(SocketConnection, SocketMessage) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        if let Ok(mut callbacks) = self.0.callbacks.write() {
            callbacks.on_message = Some(Arc::new(callback));
        }
    }

    /// Broadcast an event to every connection in this namespace. Returns the
    /// number of connections reached.
    pub fn broadcast(&self, message: SocketMessage) -> usize {
        self.0.broadcast_tx.send(message).unwrap_or(0)
    }

    fn subscribe(&self) -> broadcast::Receiver<SocketMessage> {
        self.0.broadcast_tx.subscribe()
    }

    fn connect_callback(&self) -> Option<ConnectCallback> {
        self.0.callbacks.read().ok()?.on_connect.clone()
    }

    fn message_callback(&self) -> Option<MessageCallback> {
        self.0.callbacks.read().ok()?.on_message.clone()
    }
}

/// The realtime transport singleton owned by the gateway extension.
pub struct SocketTransport {
    namespaces: HashMap<String, NamespaceHandle>,
    tracker: SocketTracker,
}

impl Default for SocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SocketTransport {
    pub fn new() -> Self {
        Self {
            namespaces: HashMap::new(),
            tracker: SocketTracker::new(),
        }
    }

    /// Get or create the namespace with the given name. Names are normalized
    /// to a leading slash, matching what clients put in the URL path.
    pub fn of(&self, name: &str) -> NamespaceHandle {
        let name = normalize_namespace(name);
        match self.namespaces.entry(name.clone()) {
            scc::hash_map::Entry::Occupied(entry) => entry.get().clone(),
            scc::hash_map::Entry::Vacant(entry) => {
                tracing::debug!("Creating socket namespace '{}'", name);
                let handle = NamespaceHandle::new(name);
                entry.insert_entry(handle.clone());
                handle
            }
        }
    }

    /// Look up an already-activated namespace.
    pub fn get(&self, name: &str) -> Option<NamespaceHandle> {
        self.namespaces
            .read(&normalize_namespace(name), |_, handle| handle.clone())
    }

    /// Number of live connections across all namespaces.
    pub fn connection_count(&self) -> usize {
        self.tracker.active_count()
    }

    /// Force-disconnect every live connection across all namespaces.
    pub fn disconnect_all(&self) {
        self.tracker.disconnect_all();
    }

    /// Build the transport's routes, mounted at the pipeline root.
    pub fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .route("/ws", get(default_namespace_handler))
            .route("/ws/{namespace}", get(namespace_handler))
            .with_state(self.clone())
    }
}

fn normalize_namespace(name: &str) -> String {
    if name.starts_with('/') {
        name.to_string()
    } else {
        format!("/{name}")
    }
}

async fn default_namespace_handler(
    State(transport): State<Arc<SocketTransport>>,
    ws: WebSocketUpgrade,
) -> Response {
    upgrade_into_namespace(transport, DEFAULT_SOCKET_NAMESPACE, ws)
}

async fn namespace_handler(
    State(transport): State<Arc<SocketTransport>>,
    Path(namespace): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    upgrade_into_namespace(transport, &namespace, ws)
}

fn upgrade_into_namespace(
    transport: Arc<SocketTransport>,
    namespace: &str,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(handle) = transport.get(namespace) else {
        return (StatusCode::NOT_FOUND, "unknown namespace").into_response();
    };

    let tracker = transport.tracker.clone();
    ws.on_upgrade(move |socket| serve_connection(handle, tracker, socket))
}

// One task per connection. Pumps direct sends and namespace broadcasts out,
// dispatches inbound frames to the namespace's message callback, and closes
// on the tracker's forced-disconnect signal.
async fn serve_connection(namespace: NamespaceHandle, tracker: SocketTracker, mut socket: WebSocket) {
    let (info, mut disconnect_rx) = tracker.register(namespace.name());
    let (direct_tx, mut direct_rx) = mpsc::unbounded_channel();
    let mut broadcast_rx = namespace.subscribe();

    let connection = SocketConnection {
        id: info.id,
        namespace: namespace.name().to_string(),
        tx: direct_tx,
    };

    if let Some(callback) = namespace.connect_callback() {
        callback(connection.clone()).await;
    }

    loop {
        tokio::select! {
            _ = disconnect_rx.recv() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
            direct = direct_rx.recv() => {
                match direct {
                    Some(message) => {
                        if send_frame(&mut socket, &message).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            broadcast = broadcast_rx.recv() => {
                match broadcast {
                    Ok(message) => {
                        if send_frame(&mut socket, &message).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            "Socket {} lagged behind, {} broadcast(s) dropped",
                            info.id,
                            skipped
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<SocketMessage>(text.as_str()) {
                            Ok(message) => {
                                if let Some(callback) = namespace.message_callback() {
                                    callback(connection.clone(), message).await;
                                }
                            }
                            Err(e) => {
                                tracing::debug!("Discarding malformed socket frame: {}", e);
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // binary/ping/pong frames are ignored
                    Some(Err(e)) => {
                        tracing::debug!("Socket {} errored: {}", info.id, e);
                        break;
                    }
                }
            }
        }
    }

    tracker.unregister(info.id);
}

async fn send_frame(socket: &mut WebSocket, message: &SocketMessage) -> Result<(), axum::Error> {
    let text = serde_json::to_string(message)
        .map_err(|e| axum::Error::new(std::io::Error::other(e.to_string())))?;
    socket.send(Message::Text(text.into())).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaces_are_normalized_and_cached() {
        let transport = SocketTransport::new();
        let a = transport.of("chat");
        let b = transport.of("/chat");

        assert_eq!(a.name(), "/chat");
        // Both spellings resolve to the same namespace.
        assert!(Arc::ptr_eq(&a.0, &b.0));
    }

    #[test]
    fn unknown_namespace_is_not_created_by_lookup() {
        let transport = SocketTransport::new();
        assert!(transport.get("/phantom").is_none());

        transport.of("/phantom");
        assert!(transport.get("/phantom").is_some());
        assert!(transport.get("phantom").is_some());
    }

    #[tokio::test]
    async fn broadcast_reaches_subscribers() {
        let transport = SocketTransport::new();
        let namespace = transport.of("/chat");
        let mut rx = namespace.subscribe();

        let reached = namespace.broadcast(SocketMessage::new(
            "greeting",
            serde_json::json!({ "text": "hi" }),
        ));
        assert_eq!(reached, 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event, "greeting");
        assert_eq!(received.payload["text"], "hi");
    }

    #[tokio::test]
    async fn connection_send_fails_after_receiver_drops() {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = SocketConnection {
            id: 1,
            namespace: "/chat".to_string(),
            tx,
        };

        assert!(connection.send(SocketMessage::new("ping", serde_json::Value::Null)));
        drop(rx);
        assert!(!connection.send(SocketMessage::new("ping", serde_json::Value::Null)));
    }

    #[test]
    fn socket_message_round_trips_through_json() {
        let message = SocketMessage::new("order.created", serde_json::json!({ "id": 7 }));
        let encoded = serde_json::to_string(&message).unwrap();
        let decoded: SocketMessage = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, message);
    }
}
