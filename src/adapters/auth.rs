//! Request-time authentication gate.
//!
//! Runs before any bound router. Extracts a bearer credential (Authorization
//! header, else `token` cookie), resolves it through the identity resolver
//! port and either attaches the execution context to the request or finalizes
//! a redirect/reject response according to the route policy. The continuation
//! runs at most once per request; rejected requests never reach router logic.
use std::sync::Arc;

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::{
    core::policy::RoutePolicyMatcher,
    ports::identity::{CredentialKind, IdentityError, IdentityResolver},
};

/// Short-circuiting authentication middleware state.
pub struct AuthenticationGate {
    resolver: Arc<dyn IdentityResolver>,
    policies: RoutePolicyMatcher,
}

impl AuthenticationGate {
    pub fn new(resolver: Arc<dyn IdentityResolver>, policies: RoutePolicyMatcher) -> Self {
        Self { resolver, policies }
    }

    /// Gate a single request.
    pub async fn handle(&self, mut req: Request, next: Next) -> Response {
        let credential = extract_credential(req.headers());

        match self
            .resolver
            .resolve(credential.as_deref(), CredentialKind::Jwt)
            .await
        {
            Ok(context) => {
                req.extensions_mut().insert(context);
                next.run(req).await
            }
            Err(error) => {
                let url = req.uri().to_string();
                tracing::debug!("Execution context can not be resolved for {}: {}", url, error);
                self.failure_response(&url, &error)
            }
        }
    }

    // On failure the stored token cookie is always cleared; the route policy
    // decides between a soft refresh (redirect back to the same URL) and a
    // hard reject carrying the resolver's message.
    fn failure_response(&self, url: &str, error: &IdentityError) -> Response {
        let mut response = if self.policies.refresh_on_invalid(url) {
            let mut response = StatusCode::TEMPORARY_REDIRECT.into_response();
            match HeaderValue::from_str(&format!("0;url={url}")) {
                Ok(value) => {
                    response.headers_mut().insert("Refresh", value);
                }
                Err(_) => {
                    tracing::warn!("Request URL not representable in Refresh header: {}", url);
                }
            }
            response
        } else {
            (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": error.to_string() })),
            )
                .into_response()
        };

        response.headers_mut().insert(
            header::SET_COOKIE,
            HeaderValue::from_static("token=; Path=/"),
        );
        response
    }
}

/// Extract the candidate credential: `Authorization: Bearer <token>` header
/// preferred, `token` cookie as fallback.
fn extract_credential(headers: &HeaderMap) -> Option<String> {
    bearer_token(headers).or_else(|| cookie_token(headers))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token.to_string())
    } else {
        None
    }
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == "token" && !value.is_empty()).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(name: header::HeaderName, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_header_is_preferred_over_cookie() {
        let mut headers = headers_with(header::AUTHORIZATION, "Bearer header-token");
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("token=cookie-token"),
        );
        assert_eq!(
            extract_credential(&headers).as_deref(),
            Some("header-token")
        );
    }

    #[test]
    fn cookie_is_used_when_header_is_absent() {
        let headers = headers_with(header::COOKIE, "session=abc; token=cookie-token");
        assert_eq!(
            extract_credential(&headers).as_deref(),
            Some("cookie-token")
        );
    }

    #[test]
    fn non_bearer_scheme_is_ignored() {
        let headers = headers_with(header::AUTHORIZATION, "Basic dXNlcjpwdw==");
        assert_eq!(extract_credential(&headers), None);
    }

    #[test]
    fn empty_cookie_value_is_ignored() {
        let headers = headers_with(header::COOKIE, "token=");
        assert_eq!(extract_credential(&headers), None);
    }

    #[test]
    fn missing_credential_is_none() {
        assert_eq!(extract_credential(&HeaderMap::new()), None);
    }
}
