//! Typed component registry backing the container port.
//!
//! Tag-based discovery is modelled as an explicit registry instead of runtime
//! reflection: each registration pairs a name with tags, declared dependency
//! names and an async provider closure. Registration order is preserved, which
//! makes tag queries (and therefore router binding order) stable within a run.
use std::{future::Future, sync::Arc};

use async_trait::async_trait;
use futures_util::future::BoxFuture;

use crate::ports::{
    container::{ComponentContainer, ContainerError, ROUTER_TAG, SOCKET_ENDPOINT_TAG},
    router::GatewayRouter,
    socket_endpoint::SocketEndpoint,
};

type RouterFactory =
    Box<dyn Fn() -> BoxFuture<'static, eyre::Result<Arc<dyn GatewayRouter>>> + Send + Sync>;
type SocketEndpointFactory =
    Box<dyn Fn() -> BoxFuture<'static, eyre::Result<Arc<dyn SocketEndpoint>>> + Send + Sync>;

enum Provider {
    Router(RouterFactory),
    SocketEndpoint(SocketEndpointFactory),
}

struct Registration {
    name: String,
    tags: Vec<&'static str>,
    dependencies: Vec<String>,
    provider: Provider,
}

/// In-process component registry. Implements [`ComponentContainer`].
#[derive(Default)]
pub struct ComponentRegistry {
    entries: Vec<Registration>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a router provider under the `router` tag.
    pub fn register_router<F, Fut>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = eyre::Result<Arc<dyn GatewayRouter>>> + Send + 'static,
    {
        self.register_router_with_dependencies(name, &[], factory)
    }

    /// Register a router provider that declares dependencies on other
    /// registrations. `validate_dependencies` checks them before any resolve.
    pub fn register_router_with_dependencies<F, Fut>(
        &mut self,
        name: impl Into<String>,
        dependencies: &[&str],
        factory: F,
    ) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = eyre::Result<Arc<dyn GatewayRouter>>> + Send + 'static,
    {
        self.insert(Registration {
            name: name.into(),
            tags: vec![ROUTER_TAG],
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            provider: Provider::Router(Box::new(move || Box::pin(factory()))),
        });
        self
    }

    /// Register a socket endpoint provider under the `socket-endpoint` tag.
    pub fn register_socket_endpoint<F, Fut>(
        &mut self,
        name: impl Into<String>,
        factory: F,
    ) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = eyre::Result<Arc<dyn SocketEndpoint>>> + Send + 'static,
    {
        self.insert(Registration {
            name: name.into(),
            tags: vec![SOCKET_ENDPOINT_TAG],
            dependencies: Vec::new(),
            provider: Provider::SocketEndpoint(Box::new(move || Box::pin(factory()))),
        });
        self
    }

    /// Number of registrations held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // Re-registering an existing name replaces the previous provider in place,
    // keeping its position in the query order.
    fn insert(&mut self, registration: Registration) {
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|e| e.name == registration.name)
        {
            *existing = registration;
        } else {
            self.entries.push(registration);
        }
    }

    fn find(&self, name: &str) -> Option<&Registration> {
        self.entries.iter().find(|e| e.name == name)
    }
}

#[async_trait]
impl ComponentContainer for ComponentRegistry {
    fn keys_by_tag(&self, tag: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.tags.contains(&tag))
            .map(|e| e.name.clone())
            .collect()
    }

    fn is_registered(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    fn validate_dependencies(&self) -> Result<(), ContainerError> {
        for entry in &self.entries {
            for dependency in &entry.dependencies {
                if !self.is_registered(dependency) {
                    return Err(ContainerError::MissingDependency {
                        component: entry.name.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    async fn resolve_router(&self, name: &str) -> Result<Arc<dyn GatewayRouter>, ContainerError> {
        let entry = self.find(name).ok_or_else(|| ContainerError::Unregistered {
            name: name.to_string(),
        })?;

        match &entry.provider {
            Provider::Router(factory) => {
                factory().await.map_err(|e| ContainerError::Resolution {
                    name: name.to_string(),
                    source: e.into(),
                })
            }
            Provider::SocketEndpoint(_) => Err(ContainerError::WrongKind {
                name: name.to_string(),
                expected: "router",
            }),
        }
    }

    async fn resolve_socket_endpoint(
        &self,
        name: &str,
    ) -> Result<Arc<dyn SocketEndpoint>, ContainerError> {
        let entry = self.find(name).ok_or_else(|| ContainerError::Unregistered {
            name: name.to_string(),
        })?;

        match &entry.provider {
            Provider::SocketEndpoint(factory) => {
                factory().await.map_err(|e| ContainerError::Resolution {
                    name: name.to_string(),
                    source: e.into(),
                })
            }
            Provider::Router(_) => Err(ContainerError::WrongKind {
                name: name.to_string(),
                expected: "socket endpoint",
            }),
        }
    }
}
