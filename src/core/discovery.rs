//! Tag-based component discovery and binding.
//!
//! Discovery runs once, during initialization. Routers are looked up by the
//! `router` tag, socket endpoints by the `socket-endpoint` tag; each category
//! is resolved fully before the lifecycle proceeds. Binding wraps every router
//! in a shielding sub-router mounted under its declared base route so internal
//! paths of two routers never collide globally.
use std::sync::Arc;

use axum::Router;

use crate::{
    core::extension::{ExtensionError, RouterFilterHook},
    ports::{
        container::{ComponentContainer, ContainerError, ROUTER_TAG, SOCKET_ENDPOINT_TAG},
        router::GatewayRouter,
        socket_endpoint::SocketEndpoint,
    },
};

/// Discovers tagged components through the container port.
pub struct ComponentDiscoverer<'a> {
    container: &'a dyn ComponentContainer,
}

impl<'a> ComponentDiscoverer<'a> {
    pub fn new(container: &'a dyn ComponentContainer) -> Self {
        Self { container }
    }

    /// Discover and resolve all router components, in the container's stable
    /// tag-query order.
    ///
    /// The dependency graph is validated before anything is resolved. An
    /// optional filter hook can restrict the discovered name list; an absent
    /// hook binds everything discovered. A filter returning a name that was
    /// never discovered is a hard error.
    pub async fn discover_routers(
        &self,
        filter: Option<&RouterFilterHook>,
    ) -> Result<Vec<(String, Arc<dyn GatewayRouter>)>, ExtensionError> {
        let discovered = self.container.keys_by_tag(ROUTER_TAG);

        self.container.validate_dependencies()?;

        let names = match filter {
            Some(hook) => {
                let filtered =
                    hook(discovered.clone())
                        .await
                        .map_err(|cause| ExtensionError::Hook {
                            hook: "filter_routers",
                            cause,
                        })?;
                if let Some(unknown) = filtered.iter().find(|name| !discovered.contains(name)) {
                    return Err(ExtensionError::InvalidFilterResult {
                        name: unknown.clone(),
                    });
                }
                filtered
            }
            None => discovered,
        };

        let mut routers = Vec::with_capacity(names.len());
        for name in names {
            if !self.container.is_registered(&name) {
                return Err(ContainerError::Unregistered { name }.into());
            }
            let instance = self.container.resolve_router(&name).await?;
            tracing::debug!(
                "Discovered router '{}' with base route '/{}'",
                name,
                instance.base_route().trim_matches('/')
            );
            routers.push((name, instance));
        }

        Ok(routers)
    }

    /// Discover and resolve all socket endpoint components. No filter hook
    /// applies to this category.
    pub async fn discover_socket_endpoints(
        &self,
    ) -> Result<Vec<(String, Arc<dyn SocketEndpoint>)>, ExtensionError> {
        let names = self.container.keys_by_tag(SOCKET_ENDPOINT_TAG);

        let mut endpoints = Vec::with_capacity(names.len());
        for name in names {
            if !self.container.is_registered(&name) {
                return Err(ContainerError::Unregistered { name }.into());
            }
            let instance = self.container.resolve_socket_endpoint(&name).await?;
            endpoints.push((name, instance));
        }

        Ok(endpoints)
    }
}

/// Build the shielding sub-router for a resolved router instance: its handler
/// nested under `/{base_route}`, ready to be merged at the pipeline root.
///
/// An empty (or slash-only) base route yields the handler unwrapped, to be
/// merged at the root; axum rejects nesting at `/`.
pub fn shield(instance: &dyn GatewayRouter) -> Router {
    let base = instance.base_route().trim_matches('/');
    if base.is_empty() {
        instance.router()
    } else {
        Router::new().nest(&format!("/{base}"), instance.router())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::routing::get;

    use super::*;
    use crate::core::registry::ComponentRegistry;

    struct FixedRouter(&'static str);

    #[async_trait]
    impl GatewayRouter for FixedRouter {
        fn base_route(&self) -> &str {
            self.0
        }

        fn router(&self) -> Router {
            Router::new().route("/x", get(|| async { "ok" }))
        }
    }

    fn registry(names: &[&'static str]) -> ComponentRegistry {
        let mut registry = ComponentRegistry::new();
        for name in names {
            let base = *name;
            registry.register_router(base, move || async move {
                Ok(Arc::new(FixedRouter(base)) as Arc<dyn GatewayRouter>)
            });
        }
        registry
    }

    #[tokio::test]
    async fn discovery_follows_registration_order() {
        let registry = registry(&["orders", "orders-archive"]);
        let discoverer = ComponentDiscoverer::new(&registry);

        let routers = discoverer.discover_routers(None).await.unwrap();
        let names: Vec<_> = routers.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["orders", "orders-archive"]);
    }

    #[tokio::test]
    async fn filter_hook_restricts_bound_routers() {
        let registry = registry(&["orders", "billing"]);
        let discoverer = ComponentDiscoverer::new(&registry);

        let filter: RouterFilterHook = Box::new(|names| {
            Box::pin(async move {
                Ok(names
                    .into_iter()
                    .filter(|n| n == "orders")
                    .collect::<Vec<_>>())
            })
        });

        let routers = discoverer.discover_routers(Some(&filter)).await.unwrap();
        assert_eq!(routers.len(), 1);
        assert_eq!(routers[0].0, "orders");
    }

    #[tokio::test]
    async fn filter_hook_returning_unknown_name_is_rejected() {
        let registry = registry(&["orders"]);
        let discoverer = ComponentDiscoverer::new(&registry);

        let filter: RouterFilterHook =
            Box::new(|_| Box::pin(async { Ok(vec!["phantom".to_string()]) }));

        let err = discoverer
            .discover_routers(Some(&filter))
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ExtensionError::InvalidFilterResult { name } if name == "phantom"
        ));
    }

    #[tokio::test]
    async fn empty_base_route_shields_at_the_root() {
        use axum::{
            body::Body,
            http::{Request, StatusCode},
        };
        use tower::ServiceExt;

        for base in ["", "/"] {
            let app = shield(&FixedRouter(base));
            let response = app
                .oneshot(Request::builder().uri("/x").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn dependency_validation_runs_before_resolution() {
        let mut registry = ComponentRegistry::new();
        registry.register_router_with_dependencies("orders", &["inventory"], || async {
            panic!("must not be resolved when the graph is invalid")
        });
        let discoverer = ComponentDiscoverer::new(&registry);

        let err = discoverer.discover_routers(None).await.err().unwrap();
        assert!(matches!(
            err,
            ExtensionError::Container(ContainerError::MissingDependency { .. })
        ));
    }
}
