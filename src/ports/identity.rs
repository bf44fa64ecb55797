use async_trait::async_trait;
use thiserror::Error;

/// The kind of credential handed to the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    /// A JSON Web Token carried as a bearer credential or `token` cookie.
    Jwt,
}

/// The identity a request executes under once its credential resolved.
///
/// Attached to the request extensions for the duration of that request only;
/// the gateway never persists it.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Stable identifier of the resolved principal.
    pub subject: String,
    /// Resolver-specific claims attached to the identity.
    pub claims: serde_json::Value,
}

impl ExecutionContext {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            claims: serde_json::Value::Null,
        }
    }

    pub fn with_claims(mut self, claims: serde_json::Value) -> Self {
        self.claims = claims;
        self
    }
}

/// Error type for credential resolution failures.
///
/// These are per-request and never fatal: the authentication gate turns them
/// into a redirect-or-reject response according to the route policy.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum IdentityError {
    #[error("no credential supplied")]
    MissingCredential,

    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error("credential expired")]
    ExpiredCredential,
}

/// IdentityResolver defines the port for turning a candidate credential into
/// an execution identity.
///
/// The validation algorithm itself lives behind this trait; the gateway only
/// invokes it.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolve a possibly-absent credential into an execution context.
    async fn resolve(
        &self,
        credential: Option<&str>,
        kind: CredentialKind,
    ) -> Result<ExecutionContext, IdentityError>;
}
