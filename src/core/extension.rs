//! Gateway extension lifecycle orchestration.
//!
//! `HttpGatewayExtension` turns a container's tagged components into a running
//! HTTP + realtime-socket server. `initialize` builds the middleware pipeline
//! and binds discovered components in a strict phase order, `start` binds the
//! listener and spawns the serve task, `close` tears everything down in
//! reverse dependency order. Extension points are plain optional callbacks:
//! an absent hook is a successful no-op, a failing hook aborts the current
//! lifecycle transition before any further step runs.
use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use axum::Router;
use futures_util::future::BoxFuture;
use thiserror::Error;
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};

use crate::{
    adapters::{
        auth::AuthenticationGate,
        middleware::{
            MiddlewarePipeline, install_base_middleware, install_post_router_middleware,
            install_pre_router_middleware,
        },
        socket_transport::{DEFAULT_SOCKET_NAMESPACE, SocketTransport},
    },
    config::models::ExtensionConfig,
    core::{
        discovery::{ComponentDiscoverer, shield},
        policy::RoutePolicyMatcher,
    },
    ports::{
        container::{ComponentContainer, ContainerError},
        identity::IdentityResolver,
        router::GatewayRouter,
        socket_endpoint::SocketEndpoint,
    },
};

/// Error type for lifecycle transitions
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ExtensionError {
    /// Required configuration is missing or unusable at initialize time
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A container lookup or resolution failed
    #[error(transparent)]
    Container(#[from] ContainerError),

    /// The router filter hook returned a name that was never discovered
    #[error("router filter returned unknown component '{name}'")]
    InvalidFilterResult { name: String },

    /// Two resolved routers declared the same base route
    #[error("routers '{first}' and '{second}' both declare base route '/{base}'")]
    DuplicateBaseRoute {
        base: String,
        first: String,
        second: String,
    },

    /// An extension hook itself failed
    #[error("extension hook '{hook}' failed: {cause}")]
    Hook {
        hook: &'static str,
        cause: eyre::Report,
    },

    /// A socket endpoint failed to activate on its namespace
    #[error("socket endpoint '{name}' failed to activate: {cause}")]
    SocketEndpoint { name: String, cause: eyre::Report },

    /// Binding the listener failed (port in use, permission denied, ...)
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The serve task ended with an error
    #[error("server task failed: {0}")]
    Server(String),

    /// `start` was called before `initialize` completed
    #[error("extension is not initialized")]
    NotInitialized,
}

/// Hook mutating the middleware pipeline during initialization.
pub type PipelineHook = Box<
    dyn for<'a> Fn(&'a mut MiddlewarePipeline, &'a ExtensionConfig) -> BoxFuture<'a, eyre::Result<()>>
        + Send
        + Sync,
>;

/// Hook restricting which discovered router names get bound.
pub type RouterFilterHook =
    Box<dyn Fn(Vec<String>) -> BoxFuture<'static, eyre::Result<Vec<String>>> + Send + Sync>;

/// Hook invoked once the listener is bound and serving.
pub type StartedHook = Box<dyn Fn() -> BoxFuture<'static, eyre::Result<()>> + Send + Sync>;

/// Optional extension points, each defaulting to a no-op (or the documented
/// default assembly for the two middleware phases).
#[derive(Default)]
pub struct ExtensionHooks {
    /// Runs right after server construction, before any middleware.
    pub initialize_app_extensions: Option<PipelineHook>,
    /// Replaces the default pre-router assembly (CORS, security headers,
    /// authentication gate) when present.
    pub initialize_middleware_before_routers: Option<PipelineHook>,
    /// Replaces the default post-router assembly (error translation layer)
    /// when present.
    pub initialize_middleware_after_routers: Option<PipelineHook>,
    /// Restricts which discovered routers get bound. Absent = bind everything.
    pub filter_routers: Option<RouterFilterHook>,
    /// Runs once the listener is bound; its failure rejects `start`.
    pub on_started: Option<StartedHook>,
}

struct ServerHandle {
    local_addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<Result<(), std::io::Error>>,
}

/// Orchestrates the gateway lifecycle: Initialize, Start, Close.
///
/// Callers serialize lifecycle transitions; Close must not run concurrently
/// with Initialize or Start. The bound component maps are populated during
/// Initialize and read-only afterwards.
pub struct HttpGatewayExtension {
    config: Arc<ExtensionConfig>,
    container: Arc<dyn ComponentContainer>,
    identity: Arc<dyn IdentityResolver>,
    hooks: ExtensionHooks,
    routers: HashMap<String, Arc<dyn GatewayRouter>>,
    socket_endpoints: HashMap<String, Arc<dyn SocketEndpoint>>,
    socket_transport: Option<Arc<SocketTransport>>,
    app: Option<Router>,
    server: Option<ServerHandle>,
}

impl HttpGatewayExtension {
    pub fn new(
        config: Arc<ExtensionConfig>,
        container: Arc<dyn ComponentContainer>,
        identity: Arc<dyn IdentityResolver>,
    ) -> Self {
        Self {
            config,
            container,
            identity,
            hooks: ExtensionHooks::default(),
            routers: HashMap::new(),
            socket_endpoints: HashMap::new(),
            socket_transport: None,
            app: None,
            server: None,
        }
    }

    /// Replace the extension points wholesale.
    pub fn with_hooks(mut self, hooks: ExtensionHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// The routers bound during initialization, keyed by component name.
    pub fn routers(&self) -> &HashMap<String, Arc<dyn GatewayRouter>> {
        &self.routers
    }

    /// The socket endpoints activated during initialization.
    pub fn socket_endpoints(&self) -> &HashMap<String, Arc<dyn SocketEndpoint>> {
        &self.socket_endpoints
    }

    /// The realtime transport, available after initialization.
    pub fn socket_transport(&self) -> Option<&Arc<SocketTransport>> {
        self.socket_transport.as_ref()
    }

    /// A clone of the assembled request pipeline, available after
    /// initialization. Mainly useful for in-process testing.
    pub fn app(&self) -> Option<Router> {
        self.app.clone()
    }

    /// The bound listen address, available after a successful start.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.as_ref().map(|s| s.local_addr)
    }

    /// Build the request pipeline and bind all discovered components.
    ///
    /// Phases run strictly in order; any failure aborts the whole call and no
    /// further phase runs.
    pub async fn initialize(&mut self) -> Result<(), ExtensionError> {
        // (1) server construction: pipeline scaffold + socket transport bound
        // to it through its /ws routes
        let transport = Arc::new(SocketTransport::new());
        let mut pipeline = MiddlewarePipeline::new();
        pipeline.merge_routes(transport.router());

        // (2) app-level extensions
        run_pipeline_hook(
            &self.hooks.initialize_app_extensions,
            "initialize_app_extensions",
            &mut pipeline,
            &self.config,
        )
        .await?;

        // (3) base middleware
        install_base_middleware(&mut pipeline, &self.config);

        // (4) pre-router middleware
        match &self.hooks.initialize_middleware_before_routers {
            Some(_) => {
                run_pipeline_hook(
                    &self.hooks.initialize_middleware_before_routers,
                    "initialize_middleware_before_routers",
                    &mut pipeline,
                    &self.config,
                )
                .await?;
            }
            None => {
                let policies = RoutePolicyMatcher::new(&self.config.route_configuration)
                    .map_err(|e| {
                        ExtensionError::Configuration(format!("invalid route pattern: {e}"))
                    })?;
                let gate = Arc::new(AuthenticationGate::new(self.identity.clone(), policies));
                install_pre_router_middleware(&mut pipeline, &self.config, gate);
            }
        }

        // (5) router discovery and binding
        let container = Arc::clone(&self.container);
        let discoverer = ComponentDiscoverer::new(container.as_ref());
        let bound = discoverer
            .discover_routers(self.hooks.filter_routers.as_ref())
            .await?;
        // Colliding base routes would make the route merge panic; surface
        // them as a rejected initialize naming both components instead.
        let mut claimed_bases: HashMap<String, String> = HashMap::new();
        for (name, instance) in bound {
            let base = instance.base_route().trim_matches('/').to_string();
            if let Some(first) = claimed_bases.get(&base) {
                return Err(ExtensionError::DuplicateBaseRoute {
                    base,
                    first: first.clone(),
                    second: name,
                });
            }
            claimed_bases.insert(base, name.clone());
            pipeline.merge_routes(shield(instance.as_ref()));
            tracing::info!(
                "Bound router '{}' at '/{}'",
                name,
                instance.base_route().trim_matches('/')
            );
            self.routers.insert(name, instance);
        }

        // (6) post-router middleware
        match &self.hooks.initialize_middleware_after_routers {
            Some(_) => {
                run_pipeline_hook(
                    &self.hooks.initialize_middleware_after_routers,
                    "initialize_middleware_after_routers",
                    &mut pipeline,
                    &self.config,
                )
                .await?;
            }
            None => install_post_router_middleware(&mut pipeline),
        }

        // (7) socket endpoint activation
        let endpoints = discoverer.discover_socket_endpoints().await?;
        for (name, instance) in endpoints {
            let namespace = match instance.namespace() {
                Some(ns) if !ns.is_empty() => ns,
                _ => DEFAULT_SOCKET_NAMESPACE,
            };
            let handle = transport.of(namespace);
            instance
                .initialize_endpoint(handle)
                .await
                .map_err(|cause| ExtensionError::SocketEndpoint {
                    name: name.clone(),
                    cause,
                })?;
            tracing::info!("Activated socket endpoint '{}' on '{}'", name, namespace);
            self.socket_endpoints.insert(name, instance);
        }

        self.app = Some(pipeline.assemble());
        self.socket_transport = Some(transport);

        tracing::info!(
            "Gateway extension initialized: {} router(s), {} socket endpoint(s)",
            self.routers.len(),
            self.socket_endpoints.len()
        );
        Ok(())
    }

    /// Bind the configured address and start serving. Resolves once the
    /// listener is bound and the optional post-start hook completed.
    pub async fn start(&mut self) -> Result<(), ExtensionError> {
        let app = self.app.clone().ok_or(ExtensionError::NotInitialized)?;

        let addr = self.config.listen_addr();
        let listener =
            TcpListener::bind(&addr)
                .await
                .map_err(|source| ExtensionError::Bind {
                    addr: addr.clone(),
                    source,
                })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ExtensionError::Bind { addr, source })?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        self.server = Some(ServerHandle {
            local_addr,
            shutdown_tx,
            task,
        });
        tracing::info!("Gateway listening on {}", local_addr);

        if let Some(hook) = &self.hooks.on_started {
            hook().await.map_err(|cause| ExtensionError::Hook {
                hook: "on_started",
                cause,
            })?;
        }

        Ok(())
    }

    /// Tear down in three ordered phases: socket connections + endpoints,
    /// then routers, then the listening server. Safe to call when `start`
    /// never ran, and safe to call twice; missing resources are skipped.
    ///
    /// Dispose failures are logged and do not stop later phases: teardown
    /// always releases everything it can.
    pub async fn close(&mut self) -> Result<(), ExtensionError> {
        if let Some(transport) = &self.socket_transport {
            transport.disconnect_all();
        }
        for (name, endpoint) in self.socket_endpoints.drain() {
            if let Err(e) = endpoint.dispose().await {
                tracing::warn!("Socket endpoint '{}' failed to dispose: {}", name, e);
            }
        }

        for (name, router) in self.routers.drain() {
            if let Err(e) = router.dispose().await {
                tracing::warn!("Router '{}' failed to dispose: {}", name, e);
            }
        }

        self.socket_transport = None;
        self.app = None;

        if let Some(server) = self.server.take() {
            let _ = server.shutdown_tx.send(());
            match server.task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(ExtensionError::Server(e.to_string())),
                Err(e) => return Err(ExtensionError::Server(e.to_string())),
            }
            tracing::info!("Gateway server closed");
        }

        Ok(())
    }
}

async fn run_pipeline_hook(
    hook: &Option<PipelineHook>,
    name: &'static str,
    pipeline: &mut MiddlewarePipeline,
    config: &ExtensionConfig,
) -> Result<(), ExtensionError> {
    if let Some(hook) = hook {
        hook(pipeline, config)
            .await
            .map_err(|cause| ExtensionError::Hook { hook: name, cause })?;
    }
    Ok(())
}
