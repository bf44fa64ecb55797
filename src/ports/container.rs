use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::ports::{router::GatewayRouter, socket_endpoint::SocketEndpoint};

/// Tag carried by registrations that provide an HTTP router.
pub const ROUTER_TAG: &str = "router";

/// Tag carried by registrations that provide a realtime socket endpoint.
pub const SOCKET_ENDPOINT_TAG: &str = "socket-endpoint";

/// Error type for container lookups and resolution
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ContainerError {
    /// A tagged key has no backing registration
    #[error("there is no component registered for key '{name}'")]
    Unregistered { name: String },

    /// A registration declares a dependency that is not registered
    #[error("component '{component}' depends on unregistered component '{dependency}'")]
    MissingDependency {
        component: String,
        dependency: String,
    },

    /// The key exists but its provider yields a different component kind
    #[error("component '{name}' is not resolvable as a {expected}")]
    WrongKind { name: String, expected: &'static str },

    /// The provider itself failed while producing the instance
    #[error("failed to resolve component '{name}': {source}")]
    Resolution {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

/// ComponentContainer defines the port (interface) the gateway uses to look up
/// tagged components.
///
/// The gateway never controls component lifetimes; it only queries keys by tag
/// and resolves instances by name during initialization.
#[async_trait]
pub trait ComponentContainer: Send + Sync {
    /// Return all registered keys carrying the given tag, in a stable order.
    ///
    /// Order stability within a single run matters: router binding follows it,
    /// which makes route shadowing reproducible when two routers mount
    /// overlapping paths.
    fn keys_by_tag(&self, tag: &str) -> Vec<String>;

    /// Whether a registration exists under the given name.
    fn is_registered(&self, name: &str) -> bool;

    /// Verify every declared dependency of every registration is itself
    /// registered. Called once before any router is resolved.
    fn validate_dependencies(&self) -> Result<(), ContainerError>;

    /// Resolve a router instance by name.
    async fn resolve_router(&self, name: &str) -> Result<Arc<dyn GatewayRouter>, ContainerError>;

    /// Resolve a socket endpoint instance by name.
    async fn resolve_socket_endpoint(
        &self,
        name: &str,
    ) -> Result<Arc<dyn SocketEndpoint>, ContainerError>;
}
