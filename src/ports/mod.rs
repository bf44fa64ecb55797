pub mod container;
pub mod identity;
pub mod router;
pub mod socket_endpoint;

/// Re-export commonly used types from ports
pub use container::{ComponentContainer, ContainerError, ROUTER_TAG, SOCKET_ENDPOINT_TAG};
pub use identity::{CredentialKind, ExecutionContext, IdentityError, IdentityResolver};
pub use router::{GatewayRouter, HandlerError};
pub use socket_endpoint::SocketEndpoint;
