// Router binding semantics: every discovered router is mounted under its own
// base route, and one router's internal paths never leak into another's.
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
    routing::get,
};
use synapse::{
    ComponentRegistry, ExtensionError, ExtensionHooks, HttpGatewayExtension,
    config::ExtensionConfig,
    ports::{CredentialKind, ExecutionContext, GatewayRouter, IdentityError, IdentityResolver},
};
use tower::ServiceExt;

struct AllowAllResolver;

#[async_trait]
impl IdentityResolver for AllowAllResolver {
    async fn resolve(
        &self,
        _credential: Option<&str>,
        _kind: CredentialKind,
    ) -> Result<ExecutionContext, IdentityError> {
        Ok(ExecutionContext::new("anonymous"))
    }
}

struct OrdersRouter;

#[async_trait]
impl GatewayRouter for OrdersRouter {
    fn base_route(&self) -> &str {
        "orders"
    }

    fn router(&self) -> Router {
        Router::new().route("/list", get(|| async { "orders:list" }))
    }
}

struct OrdersArchiveRouter;

#[async_trait]
impl GatewayRouter for OrdersArchiveRouter {
    fn base_route(&self) -> &str {
        "orders-archive"
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/list", get(|| async { "archive:list" }))
            .route("/purge", get(|| async { "archive:purge" }))
    }
}

fn registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();
    registry.register_router("orders", || async {
        Ok(Arc::new(OrdersRouter) as Arc<dyn GatewayRouter>)
    });
    registry.register_router("orders-archive", || async {
        Ok(Arc::new(OrdersArchiveRouter) as Arc<dyn GatewayRouter>)
    });
    registry
}

async fn initialized(hooks: ExtensionHooks) -> HttpGatewayExtension {
    let mut extension = HttpGatewayExtension::new(
        Arc::new(ExtensionConfig::default()),
        Arc::new(registry()),
        Arc::new(AllowAllResolver),
    )
    .with_hooks(hooks);
    extension.initialize().await.unwrap();
    extension
}

async fn fetch(app: &Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn prefix_sharing_base_routes_stay_distinct() {
    let extension = initialized(ExtensionHooks::default()).await;
    let app = extension.app().unwrap();

    let (status, body) = fetch(&app, "/orders/list").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "orders:list");

    let (status, body) = fetch(&app, "/orders-archive/list").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "archive:list");
}

#[tokio::test]
async fn internal_paths_never_leak_across_mounts() {
    let extension = initialized(ExtensionHooks::default()).await;
    let app = extension.app().unwrap();

    // /purge exists only inside the archive router.
    let (status, _) = fetch(&app, "/orders/purge").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = fetch(&app, "/orders-archive/purge").await;
    assert_eq!(status, StatusCode::OK);
}

/// Competes with [`OrdersRouter`] for the same base route.
struct LegacyOrdersRouter;

#[async_trait]
impl GatewayRouter for LegacyOrdersRouter {
    fn base_route(&self) -> &str {
        "orders"
    }

    fn router(&self) -> Router {
        Router::new().route("/list", get(|| async { "legacy:list" }))
    }
}

#[tokio::test]
async fn duplicate_base_routes_abort_initialization() {
    let mut registry = ComponentRegistry::new();
    registry.register_router("orders", || async {
        Ok(Arc::new(OrdersRouter) as Arc<dyn GatewayRouter>)
    });
    registry.register_router("orders-legacy", || async {
        Ok(Arc::new(LegacyOrdersRouter) as Arc<dyn GatewayRouter>)
    });

    let mut extension = HttpGatewayExtension::new(
        Arc::new(ExtensionConfig::default()),
        Arc::new(registry),
        Arc::new(AllowAllResolver),
    );

    let err = extension.initialize().await.unwrap_err();
    assert!(matches!(
        err,
        ExtensionError::DuplicateBaseRoute { ref base, .. } if base == "orders"
    ));
    // The error names both competing components.
    let message = err.to_string();
    assert!(message.contains("'orders'"));
    assert!(message.contains("'orders-legacy'"));
}

struct RootRouter;

#[async_trait]
impl GatewayRouter for RootRouter {
    fn base_route(&self) -> &str {
        ""
    }

    fn router(&self) -> Router {
        Router::new().route("/landing", get(|| async { "root:landing" }))
    }
}

#[tokio::test]
async fn empty_base_route_serves_from_the_root() {
    let mut registry = ComponentRegistry::new();
    registry.register_router("root", || async {
        Ok(Arc::new(RootRouter) as Arc<dyn GatewayRouter>)
    });

    let mut extension = HttpGatewayExtension::new(
        Arc::new(ExtensionConfig::default()),
        Arc::new(registry),
        Arc::new(AllowAllResolver),
    );
    extension.initialize().await.unwrap();
    let app = extension.app().unwrap();

    let (status, body) = fetch(&app, "/landing").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "root:landing");
}

#[tokio::test]
async fn filter_hook_limits_what_gets_mounted() {
    let hooks = ExtensionHooks {
        filter_routers: Some(Box::new(|names| {
            Box::pin(async move {
                Ok(names
                    .into_iter()
                    .filter(|n| n == "orders")
                    .collect::<Vec<_>>())
            })
        })),
        ..Default::default()
    };
    let extension = initialized(hooks).await;
    let app = extension.app().unwrap();

    assert_eq!(extension.routers().len(), 1);

    let (status, _) = fetch(&app, "/orders/list").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = fetch(&app, "/orders-archive/list").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
