//! # Model Connector
//!
//! gRPC service exposing one `Prompt`/`StreamPrompt` contract over a single
//! configured model provider.
//!
//! ## Usage
//!
//! ```bash
//! # Serve OpenAI on the default port
//! OPENAI_API_KEY=sk-... model-connector
//!
//! # Serve Cohere with a config file
//! CONNECTOR_CONFIG=/etc/connector.yaml CONNECTOR_PROVIDER=cohere model-connector
//!
//! # Environment overrides
//! PORT=9000 LOG_FORMAT=json model-connector
//! ```

use gateway_config::{load_config, ConnectorConfig};
use gateway_core::ProviderId;
use gateway_providers::{cohere, openai, ConnectorRegistry, ProviderSettings};
use gateway_server::{Server, ServerConfig};
use gateway_telemetry::{init_tracing, TracingConfig};
use tracing::{error, info};

/// Application entry point
#[tokio::main]
async fn main() {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = init_tracing(&TracingConfig::default().with_logging(&config.logging)) {
        eprintln!("Failed to initialize logging: {e}");
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        provider = %config.provider,
        "Starting model connector"
    );

    if let Err(e) = run(config).await {
        error!(error = %e, "Connector failed");
        std::process::exit(1);
    }
}

/// Main application logic
async fn run(config: ConnectorConfig) -> Result<(), Box<dyn std::error::Error>> {
    let registry = ConnectorRegistry::with_builtin(|provider| provider_settings(&config, provider));
    let connector = registry.get(config.provider)?;

    info!(
        host = %config.server.host,
        port = config.server.port,
        shutdown_timeout = ?config.server.shutdown_timeout,
        "Configuration loaded"
    );

    Server::new(ServerConfig::from(&config.server), connector)
        .run()
        .await?;

    Ok(())
}

/// Built-in endpoint settings with configured overrides applied
fn provider_settings(config: &ConnectorConfig, provider: ProviderId) -> ProviderSettings {
    let defaults = match provider {
        ProviderId::OpenAI => openai::default_settings(),
        ProviderId::Cohere => cohere::default_settings(),
    };
    let overrides = config.providers.get(provider);
    defaults
        .with_base_url(overrides.base_url.as_deref())
        .with_api_key_env(overrides.api_key_env.as_deref())
}
