//! Middleware assembly for the gateway pipeline.
//!
//! The pipeline is built in three phases with strict ordering: base layers
//! (request tracing, body-size limit, compression), pre-router layers (CORS,
//! security headers, the authentication gate) and post-router layers (error
//! translation). Routes are collected while the phases fill up; `assemble`
//! composes everything so that, at request time, base layers run first,
//! pre-router layers second and post-router layers wrap the bound routes.
use std::{sync::Arc, time::Instant};

use axum::{
    Router,
    extract::{DefaultBodyLimit, Request},
    http::{HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use tower_http::compression::CompressionLayer;
use tracing::Instrument;

use crate::{
    adapters::{auth::AuthenticationGate, error_translator},
    config::models::{CorsOptions, ExtensionConfig},
};

type LayerFn = Box<dyn FnOnce(Router) -> Router + Send>;

/// Ordered three-phase middleware pipeline under construction.
///
/// Within a phase, layers run in the order they were installed.
#[derive(Default)]
pub struct MiddlewarePipeline {
    routes: Router,
    base: Vec<LayerFn>,
    pre_router: Vec<LayerFn>,
    post_router: Vec<LayerFn>,
}

impl MiddlewarePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge routes (bound routers, the socket transport route) into the
    /// pipeline root.
    pub fn merge_routes(&mut self, router: Router) {
        let routes = std::mem::take(&mut self.routes);
        self.routes = routes.merge(router);
    }

    /// Install a base-phase layer (parsing, tracing, compression).
    pub fn layer_base(&mut self, layer: impl FnOnce(Router) -> Router + Send + 'static) {
        self.base.push(Box::new(layer));
    }

    /// Install a pre-router layer (runs after base, before any bound router).
    pub fn layer_pre_router(&mut self, layer: impl FnOnce(Router) -> Router + Send + 'static) {
        self.pre_router.push(Box::new(layer));
    }

    /// Install a post-router layer (wraps the bound routes innermost).
    pub fn layer_post_router(&mut self, layer: impl FnOnce(Router) -> Router + Send + 'static) {
        self.post_router.push(Box::new(layer));
    }

    /// Compose the final router. Post-router layers are applied first so they
    /// sit closest to the routes; base layers are applied last so they are
    /// outermost and run first on the request path.
    pub fn assemble(self) -> Router {
        let mut app = self.routes;
        for layer in self.post_router.into_iter().rev() {
            app = layer(app);
        }
        for layer in self.pre_router.into_iter().rev() {
            app = layer(app);
        }
        for layer in self.base.into_iter().rev() {
            app = layer(app);
        }
        app
    }
}

/// Install the base middleware phase: request tracing, the configured body
/// size limit and response compression.
pub fn install_base_middleware(pipeline: &mut MiddlewarePipeline, config: &ExtensionConfig) {
    pipeline.layer_base(|router| router.layer(middleware::from_fn(request_trace_middleware)));

    if let Some(limit) = config.parse_limit {
        pipeline.layer_base(move |router| router.layer(DefaultBodyLimit::max(limit)));
    }

    pipeline.layer_base(|router| router.layer(CompressionLayer::new()));
}

/// Install the default pre-router phase: CORS when enabled, security headers
/// and the authentication gate.
///
/// The gate goes last so preflight requests are answered by the CORS layer
/// without a credential.
pub fn install_pre_router_middleware(
    pipeline: &mut MiddlewarePipeline,
    config: &ExtensionConfig,
    gate: Arc<AuthenticationGate>,
) {
    if config.cors_enabled() {
        let options = Arc::new(config.cors.options.clone());
        pipeline.layer_pre_router(move |router| {
            router.layer(middleware::from_fn(move |req, next| {
                let options = options.clone();
                async move { cors_middleware(req, next, options).await }
            }))
        });
    }

    let security = Arc::new(SecurityHeaders::from_config(config));
    pipeline.layer_pre_router(move |router| {
        router.layer(middleware::from_fn(move |req, next| {
            let security = security.clone();
            async move { security_headers_middleware(req, next, security).await }
        }))
    });

    pipeline.layer_pre_router(move |router| {
        router.layer(middleware::from_fn(move |req, next| {
            let gate = gate.clone();
            async move { gate.handle(req, next).await }
        }))
    });
}

/// Install the default post-router phase: the error translation layer.
pub fn install_post_router_middleware(pipeline: &mut MiddlewarePipeline) {
    pipeline.layer_post_router(|router| {
        router.layer(middleware::from_fn(
            error_translator::error_translation_middleware,
        ))
    });
}

/// Log start/end of a request including a generated request id and latency.
pub async fn request_trace_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let request_id = uuid::Uuid::new_v4().to_string();
    let method = req.method().clone();
    let uri = req.uri().clone();

    let span = tracing::info_span!("request", request_id = %request_id);
    let mut response = async {
        tracing::debug!("Started processing {} {}", method, uri);
        let response = next.run(req).await;
        tracing::info!(
            "Completed {} {} - {} in {:?}",
            method,
            uri,
            response.status(),
            start.elapsed()
        );
        response
    }
    .instrument(span)
    .await;

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("X-Request-ID", header_value);
    }

    response
}

/// Security header values resolved once from configuration.
pub struct SecurityHeaders {
    frame_options: HeaderValue,
    csp: Option<HeaderValue>,
}

impl SecurityHeaders {
    pub fn from_config(config: &ExtensionConfig) -> Self {
        let csp = config.csp.as_ref().and_then(|csp| {
            let value = csp.header_value();
            match HeaderValue::from_str(&value) {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!("Invalid Content-Security-Policy value: {}", value);
                    None
                }
            }
        });

        Self {
            frame_options: HeaderValue::from_static(config.frameguard.action.header_value()),
            csp,
        }
    }
}

/// Add security hardening headers from the configured policy.
pub async fn security_headers_middleware(
    req: Request,
    next: Next,
    security: Arc<SecurityHeaders>,
) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("X-Frame-Options", security.frame_options.clone());
    headers.insert(
        "X-XSS-Protection",
        HeaderValue::from_static("1; mode=block"),
    );
    if let Some(csp) = &security.csp {
        headers.insert("Content-Security-Policy", csp.clone());
    }

    response
}

/// Apply the configured CORS policy. Preflight requests are answered directly
/// with 204 and never reach the bound routers; a plain OPTIONS request
/// without `Origin` and `Access-Control-Request-Method` is not a preflight
/// and passes through.
pub async fn cors_middleware(req: Request, next: Next, options: Arc<CorsOptions>) -> Response {
    let origin = req.headers().get(header::ORIGIN).cloned();
    let is_preflight = req.method() == Method::OPTIONS
        && origin.is_some()
        && req
            .headers()
            .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD);

    let mut response = if is_preflight {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(req).await
    };
    let headers = response.headers_mut();

    let allowed_origin = match origin {
        Some(origin) if options.allowed_origins.is_empty() => Some(origin),
        Some(origin) => {
            let matches = origin
                .to_str()
                .map(|o| options.allowed_origins.iter().any(|allowed| allowed == o))
                .unwrap_or(false);
            matches.then_some(origin)
        }
        None => None,
    };

    if let Some(origin) = allowed_origin {
        headers.insert("Access-Control-Allow-Origin", origin);
    }
    if let Ok(methods) = HeaderValue::from_str(&options.allowed_methods.join(", ")) {
        headers.insert("Access-Control-Allow-Methods", methods);
    }
    if let Ok(allowed) = HeaderValue::from_str(&options.allowed_headers.join(", ")) {
        headers.insert("Access-Control-Allow-Headers", allowed);
    }
    if let Ok(max_age) = HeaderValue::from_str(&options.max_age_secs.to_string()) {
        headers.insert("Access-Control-Max-Age", max_age);
    }

    response
}
