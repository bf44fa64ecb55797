//! Synapse - a pluggable HTTP + realtime-socket gateway bootstrapper.
//!
//! Synapse sits between a component container and application-specific
//! routers / socket endpoints. It implements a **hexagonal architecture**:
//! the container, identity resolver, routers and socket endpoints are ports,
//! and the crate's own job is the extension lifecycle: ordered middleware
//! assembly, tag-based component discovery and binding, a token-based
//! authentication gate, and ordered startup/shutdown.
//!
//! # Features
//! - Strictly ordered initialization: server construction → app extension
//!   hooks → base middleware → pre-router middleware → router discovery and
//!   binding → post-router middleware → socket endpoint activation
//! - Declarative tag-based discovery through a typed component registry
//! - Shielding mounts: every router lives under its own base route prefix,
//!   so colliding internal paths never collide globally
//! - Token-based authentication gate with per-route redirect-vs-reject policy
//! - Realtime socket namespaces over axum WebSockets with forced disconnect
//!   on close
//! - Error translation into structured JSON / text responses
//! - Configuration loading (TOML / YAML / JSON) & validation
//! - Structured tracing via `tracing`
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use synapse::{ComponentRegistry, HttpGatewayExtension, config::ExtensionConfig};
//! # use synapse::ports::{CredentialKind, ExecutionContext, IdentityError, IdentityResolver};
//! # struct NullResolver;
//! # #[async_trait::async_trait]
//! # impl IdentityResolver for NullResolver {
//! #     async fn resolve(&self, _: Option<&str>, _: CredentialKind)
//! #         -> Result<ExecutionContext, IdentityError> { Ok(ExecutionContext::new("anonymous")) }
//! # }
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! let config = Arc::new(ExtensionConfig::default());
//! let registry = Arc::new(ComponentRegistry::new());
//! let resolver = Arc::new(NullResolver);
//!
//! let mut extension = HttpGatewayExtension::new(config, registry, resolver);
//! extension.initialize().await?;
//! extension.start().await?;
//! // ... serve until shutdown ...
//! extension.close().await?;
//! # Ok(()) }
//! ```
//!
//! # Error Handling
//! Lifecycle transitions return [`core::ExtensionError`]; request-time
//! failures are never fatal; authentication failures resolve into a
//! redirect-or-reject response per route policy, and handler errors are
//! translated into structured responses.
//!
//! # License
//! Licensed under Apache-2.0.
pub mod config;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

// These modules are implementation details and should not be directly used by users
pub mod adapters;
pub mod core;

// Re-export the specific types needed by the binary crate
pub use crate::{
    adapters::{AuthenticationGate, SocketTransport},
    core::{ComponentRegistry, ExtensionError, ExtensionHooks, HttpGatewayExtension},
    ports::{ComponentContainer, GatewayRouter, IdentityResolver, SocketEndpoint},
};
