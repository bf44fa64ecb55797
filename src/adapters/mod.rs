pub mod auth;
pub mod error_translator;
pub mod middleware;
pub mod socket_transport;

/// Re-export commonly used types from adapters
pub use auth::AuthenticationGate;
pub use error_translator::translate;
pub use middleware::MiddlewarePipeline;
pub use socket_transport::{
    DEFAULT_SOCKET_NAMESPACE, NamespaceHandle, SocketConnection, SocketMessage, SocketTransport,
};
