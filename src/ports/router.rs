use async_trait::async_trait;
use axum::Router;
use hyper::StatusCode;
use thiserror::Error;

/// GatewayRouter defines the port for a mountable HTTP router.
///
/// Implementations declare a base route; the gateway mounts their handler
/// inside a shielding sub-router under that prefix so internal paths of two
/// routers never collide globally.
#[async_trait]
pub trait GatewayRouter: Send + Sync {
    /// The path prefix this router is mounted under, without slashes
    /// (e.g. `"orders"` mounts at `/orders`).
    fn base_route(&self) -> &str;

    /// Build the inner axum router. Called once during initialization.
    fn router(&self) -> Router;

    /// Release resources held by the router. Invoked during gateway close,
    /// after all socket endpoints were disposed.
    async fn dispose(&self) -> eyre::Result<()> {
        Ok(())
    }
}

/// Error type for failures inside bound router handlers.
///
/// A structured error carries an explicit status code and optional
/// machine-readable details; a generic one only carries a message and is
/// translated to an internal-error response. Either way the error is
/// recovered into a response and never crashes the process.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
    status: Option<StatusCode>,
    additional_information: Option<serde_json::Value>,
}

impl HandlerError {
    /// A generic error without a recognized status code.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            additional_information: None,
        }
    }

    /// A structured error with an explicit status code.
    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
            additional_information: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Attach machine-readable details serialized alongside the message.
    pub fn with_additional_information(mut self, info: serde_json::Value) -> Self {
        self.additional_information = Some(info);
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn additional_information(&self) -> Option<&serde_json::Value> {
        self.additional_information.as_ref()
    }
}
