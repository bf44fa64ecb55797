use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use axum::{Json, Router, routing::get};
use clap::Parser;
use color_eyre::{Result, eyre::Context};
use serde_json::json;
use synapse::{
    ComponentRegistry, GatewayRouter, HttpGatewayExtension,
    config::{ExtensionConfig, ExtensionConfigValidator, load_config},
    ports::{CredentialKind, ExecutionContext, IdentityError, IdentityResolver},
    tracing_setup,
};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(short, long, default_value = "synapse.toml")]
    config: String,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Validate configuration file
    Validate {
        /// Configuration file to validate
        #[clap(short, long, default_value = "synapse.toml")]
        config: String,
    },
    /// Initialize a new configuration file
    Init {
        /// Output path for the new config file
        #[clap(short, long, default_value = "synapse.toml")]
        config: String,
    },
    /// Start the gateway (default)
    Serve {
        /// Configuration file to use
        #[clap(short, long, default_value = "synapse.toml")]
        config: String,
    },
}

/// Built-in status router, always bound so a fresh gateway answers something.
struct StatusRouter;

#[async_trait]
impl GatewayRouter for StatusRouter {
    fn base_route(&self) -> &str {
        "status"
    }

    fn router(&self) -> Router {
        Router::new().route(
            "/",
            get(|| async {
                Json(json!({
                    "status": "ok",
                    "version": env!("CARGO_PKG_VERSION"),
                }))
            }),
        )
    }
}

/// Stand-in resolver until a real IAM adapter is wired in: every request
/// executes as the anonymous identity, so the authentication gate always
/// passes. Replace through `HttpGatewayExtension::new` when embedding.
struct AnonymousResolver;

#[async_trait]
impl IdentityResolver for AnonymousResolver {
    async fn resolve(
        &self,
        _credential: Option<&str>,
        _kind: CredentialKind,
    ) -> Result<ExecutionContext, IdentityError> {
        Ok(ExecutionContext::new("anonymous"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    let (command, config_path) = match args.command {
        Some(Commands::Validate { config }) => ("validate", config),
        Some(Commands::Init { config }) => ("init", config),
        Some(Commands::Serve { config }) => ("serve", config),
        None => ("serve", args.config), // Default to serve with config from args
    };

    match command {
        "validate" => {
            return validate_config_command(&config_path).await;
        }
        "init" => {
            return init_config_command(&config_path).await;
        }
        "serve" => {
            // Continue with normal server startup
        }
        _ => unreachable!(),
    }

    tracing_setup::init_tracing()?;

    tracing::info!("Loading configuration from {config_path}");
    let config: ExtensionConfig = load_config(&config_path)
        .await
        .with_context(|| format!("Failed to load config from {config_path}"))?;
    ExtensionConfigValidator::validate(&config).context("Configuration is invalid")?;

    let mut registry = ComponentRegistry::new();
    registry.register_router("status", || async {
        Ok(Arc::new(StatusRouter) as Arc<dyn GatewayRouter>)
    });

    let mut extension = HttpGatewayExtension::new(
        Arc::new(config),
        Arc::new(registry),
        Arc::new(AnonymousResolver),
    );

    extension
        .initialize()
        .await
        .context("Gateway initialization failed")?;
    extension.start().await.context("Gateway start failed")?;

    if let Some(addr) = extension.local_addr() {
        println!("Synapse gateway listening on {addr}");
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received, closing gateway");

    extension.close().await.context("Gateway close failed")?;
    tracing::info!("Graceful shutdown completed");

    Ok(())
}

/// Validate configuration file and exit
async fn validate_config_command(config_path: &str) -> Result<()> {
    println!("🔍 Validating configuration file: {config_path}");

    if !Path::new(config_path).exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' not found");
        std::process::exit(1);
    }

    let config = match load_config(config_path).await {
        Ok(config) => {
            println!("✅ Configuration parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("❌ Configuration parsing failed:");
            eprintln!("   {e}");
            std::process::exit(1);
        }
    };

    match ExtensionConfigValidator::validate(&config) {
        Ok(()) => {
            println!("✅ Configuration validation: OK");
            println!();
            println!("📋 Configuration Summary:");
            println!("   • Listen Address: {}", config.listen_addr());
            println!("   • CORS Enabled: {}", config.cors_enabled());
            println!(
                "   • Body Limit: {}",
                config
                    .parse_limit
                    .map(|l| format!("{l} bytes"))
                    .unwrap_or_else(|| "transport default".to_string())
            );
            println!("   • Route Policies: {}", config.route_configuration.len());
            println!();
            println!("🎉 Configuration is valid and ready to use!");
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed:");
            eprintln!("{e}");
            println!();
            println!("💡 Common fixes:");
            println!("   • Ensure server.host is a bindable address (e.g. '0.0.0.0')");
            println!("   • Route patterns use '/' segments and '*' wildcards only");
            println!("   • parse_limit must be greater than zero when set");
            std::process::exit(1);
        }
    }
}

/// Initialize a new configuration file
async fn init_config_command(config_path: &str) -> Result<()> {
    let path = Path::new(config_path);
    if path.exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' already exists");
        std::process::exit(1);
    }

    let default_config = r#"# Synapse Gateway Configuration

# Request body size cap in bytes
parse_limit = 1048576

[server]
host = "0.0.0.0"
port = 8000

[cors]
enabled = true

# [cors.options]
# allowed_origins = ["https://app.example.com"]

[frameguard]
action = "same_origin"

# Content-Security-Policy directives (header omitted when absent)
# [csp.directives]
# default-src = ["'self'"]

# Per-route authentication failure policy: redirect-and-retry instead of 403
# [route_configuration."/admin/*"]
# refresh_on_invalid_token = true
"#;

    tokio::fs::write(path, default_config)
        .await
        .context("Failed to write config file")?;
    println!("✅ Created default configuration at: {config_path}");
    println!("   Run 'synapse serve --config {config_path}' to start the gateway");
    Ok(())
}
