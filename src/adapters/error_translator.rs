//! Translation of handler errors into HTTP responses.
//!
//! `translate` is the pure mapping: a structured error keeps its status code
//! and is serialized as JSON with `message` and any attached
//! `additionalInformation`; a generic error becomes an internal-error response
//! carrying the bare message text. Clients never see stack traces.
use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::ports::router::HandlerError;

/// Marker left in response extensions by translated errors so the
/// post-router layer can observe and log them.
#[derive(Debug, Clone)]
pub(crate) struct TranslatedError {
    pub status: StatusCode,
    pub message: String,
}

/// Map a handler error to an HTTP response.
pub fn translate(error: &HandlerError) -> Response {
    match error.status() {
        Some(status) => {
            let mut body = json!({ "message": error.message() });
            if let Some(info) = error.additional_information() {
                body["additionalInformation"] = info.clone();
            }
            (status, Json(body)).into_response()
        }
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error.message().to_string(),
        )
            .into_response(),
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let mut response = translate(&self);
        let status = response.status();
        response.extensions_mut().insert(TranslatedError {
            status,
            message: self.message().to_string(),
        });
        response
    }
}

/// Post-router layer: observes translated errors coming back from any bound
/// router and logs them. Mounted last so every earlier stage's error response
/// passes through it.
pub async fn error_translation_middleware(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();

    let response = next.run(req).await;

    if let Some(error) = response.extensions().get::<TranslatedError>() {
        tracing::warn!(
            status = %error.status,
            "Handler error on {} {}: {}",
            method,
            uri,
            error.message
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use axum::{Router, body::Body, middleware, routing::get};
    use tower::ServiceExt; // for oneshot

    use super::*;

    async fn read_body(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn structured_error_keeps_status_and_serializes_details() {
        let error = HandlerError::not_found("order not found")
            .with_additional_information(json!({ "orderId": 42 }));

        let response = translate(&error);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body: serde_json::Value = serde_json::from_str(&read_body(response).await).unwrap();
        assert_eq!(body["message"], "order not found");
        assert_eq!(body["additionalInformation"]["orderId"], 42);
    }

    #[tokio::test]
    async fn generic_error_becomes_internal_error_with_bare_message() {
        let response = translate(&HandlerError::new("something broke"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(read_body(response).await, "something broke");
    }

    #[tokio::test]
    async fn failing_handler_is_recovered_through_the_layer() {
        let app = Router::new()
            .route(
                "/fail",
                get(|| async {
                    Err::<Response, _>(HandlerError::bad_request("missing parameter"))
                }),
            )
            .layer(middleware::from_fn(error_translation_middleware));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/fail")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = serde_json::from_str(&read_body(response).await).unwrap();
        assert_eq!(body["message"], "missing parameter");
    }
}
