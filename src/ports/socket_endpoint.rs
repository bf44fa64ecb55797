use async_trait::async_trait;

use crate::adapters::socket_transport::NamespaceHandle;

/// SocketEndpoint defines the port for a realtime socket endpoint.
///
/// Endpoints are discovered by tag, handed the namespace they asked for (or
/// the default one) and activated exactly once during initialization.
#[async_trait]
pub trait SocketEndpoint: Send + Sync {
    /// The namespace this endpoint wants to own. `None` or an empty string
    /// fall back to the process-wide default namespace.
    fn namespace(&self) -> Option<&str> {
        None
    }

    /// Activate the endpoint on its namespace. Typically registers connect
    /// and message callbacks and keeps the handle around for broadcasting.
    async fn initialize_endpoint(&self, namespace: NamespaceHandle) -> eyre::Result<()>;

    /// Release resources held by the endpoint. Invoked during gateway close,
    /// after all live connections were force-disconnected.
    async fn dispose(&self) -> eyre::Result<()> {
        Ok(())
    }
}
