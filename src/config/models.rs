//! Configuration data structures for Synapse.
//!
//! These types map directly to TOML (also JSON / YAML) configuration files. They are
//! intentionally serde-friendly and include defaults so that minimal configs remain concise.
//! The whole tree is supplied before `initialize` and immutable for the lifetime of the
//! extension instance.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Top-level gateway extension configuration.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ExtensionConfig {
    /// Bind address for the listening server
    pub server: ServerAddressConfig,
    /// Request body size cap in bytes (None = transport default)
    pub parse_limit: Option<usize>,
    /// CORS behaviour
    pub cors: CorsConfig,
    /// Legacy kill switch that overrides `cors.enabled`
    pub disable_cors: bool,
    /// Content-Security-Policy directives (header omitted when absent)
    pub csp: Option<CspConfig>,
    /// X-Frame-Options behaviour
    pub frameguard: FrameguardConfig,
    /// URL-pattern (glob) to per-route authentication failure policy
    pub route_configuration: HashMap<String, RoutePolicy>,
}

impl ExtensionConfig {
    /// Effective CORS switch: `cors.enabled` unless `disable_cors` overrides it.
    pub fn cors_enabled(&self) -> bool {
        self.cors.enabled && !self.disable_cors
    }

    /// The `host:port` string the server binds to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Host and port the transport server binds to.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServerAddressConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerAddressConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// CORS enable flag plus response header options.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CorsConfig {
    pub enabled: bool,
    pub options: CorsOptions,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            options: CorsOptions::default(),
        }
    }
}

/// Options reflected into CORS response headers.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CorsOptions {
    /// Origins allowed to call the gateway. Empty list reflects the caller origin.
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub max_age_secs: u64,
}

impl Default for CorsOptions {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allowed_methods: vec![
                "GET".to_string(),
                "POST".to_string(),
                "PUT".to_string(),
                "DELETE".to_string(),
                "OPTIONS".to_string(),
            ],
            allowed_headers: vec![
                "Content-Type".to_string(),
                "Authorization".to_string(),
                "X-Requested-With".to_string(),
            ],
            max_age_secs: 86_400,
        }
    }
}

/// Content-Security-Policy directives, e.g. `default-src = ["'self'"]`.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct CspConfig {
    pub directives: HashMap<String, Vec<String>>,
}

impl CspConfig {
    /// Render the directive map into a `Content-Security-Policy` header value.
    /// Directives are sorted so the rendered header is stable across runs.
    pub fn header_value(&self) -> String {
        let mut directives: Vec<_> = self.directives.iter().collect();
        directives.sort_by(|(a, _), (b, _)| a.cmp(b));
        directives
            .into_iter()
            .map(|(name, sources)| format!("{} {}", name, sources.join(" ")))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// X-Frame-Options behaviour.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct FrameguardConfig {
    pub action: FrameguardAction,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FrameguardAction {
    Deny,
    #[default]
    SameOrigin,
}

impl FrameguardAction {
    pub fn header_value(&self) -> &'static str {
        match self {
            FrameguardAction::Deny => "DENY",
            FrameguardAction::SameOrigin => "SAMEORIGIN",
        }
    }
}

/// Per-route-pattern policy applied when credential resolution fails.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default)]
#[serde(default)]
pub struct RoutePolicy {
    /// Redirect the client back to the same URL (soft retry) instead of
    /// rejecting outright.
    pub refresh_on_invalid_token: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_enabled_respects_legacy_override() {
        let mut config = ExtensionConfig::default();
        assert!(config.cors_enabled());

        config.disable_cors = true;
        assert!(!config.cors_enabled());

        config.disable_cors = false;
        config.cors.enabled = false;
        assert!(!config.cors_enabled());
    }

    #[test]
    fn csp_header_value_is_sorted_and_joined() {
        let mut csp = CspConfig::default();
        csp.directives
            .insert("script-src".to_string(), vec!["'self'".to_string()]);
        csp.directives.insert(
            "default-src".to_string(),
            vec!["'self'".to_string(), "https:".to_string()],
        );

        assert_eq!(
            csp.header_value(),
            "default-src 'self' https:; script-src 'self'"
        );
    }

    #[test]
    fn listen_addr_combines_host_and_port() {
        let mut config = ExtensionConfig::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 3000;
        assert_eq!(config.listen_addr(), "127.0.0.1:3000");
    }
}
