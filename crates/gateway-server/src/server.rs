//! gRPC server host.

use crate::handlers::PromptHandler;
use crate::health::HealthState;
use crate::shutdown::{shutdown_signal, ShutdownCoordinator};
use gateway_config::{ServerSettings, DEFAULT_HOST, DEFAULT_PORT};
use gateway_core::Connector;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tracing::{info, warn};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Drain budget for in-flight RPCs on shutdown
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    /// Create a new server configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the host
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the shutdown drain budget
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// `host:port` to bind
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(settings: &ServerSettings) -> Self {
        Self::new()
            .with_host(&settings.host)
            .with_port(settings.port)
            .with_shutdown_timeout(settings.shutdown_timeout)
    }
}

/// Server errors
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening socket could not be bound
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// Address that was requested
        address: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Transport failure while serving
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
}

/// Connector server: the RPC service plus health, bound to one connector
pub struct Server {
    config: ServerConfig,
    connector: Arc<dyn Connector>,
    coordinator: Arc<ShutdownCoordinator>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("provider", &self.connector.provider())
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Create a new server
    #[must_use]
    pub fn new(config: ServerConfig, connector: Arc<dyn Connector>) -> Self {
        let coordinator = Arc::new(ShutdownCoordinator::new(config.shutdown_timeout));
        Self {
            config,
            connector,
            coordinator,
        }
    }

    /// Shutdown coordinator shared with the handlers
    #[must_use]
    pub fn coordinator(&self) -> Arc<ShutdownCoordinator> {
        self.coordinator.clone()
    }

    /// Bind the configured address and serve until a process signal arrives
    ///
    /// # Errors
    /// Returns an error if binding fails or the transport fails
    pub async fn run(self) -> Result<(), ServerError> {
        let address = self.config.bind_address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| ServerError::Bind { address, source })?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `signal` resolves.
    ///
    /// The resolved value is logged as the shutdown reason. Health flips to
    /// `NOT_SERVING`, new RPCs are refused, and in-flight RPCs get the drain
    /// budget. Once the budget runs out the server returns without waiting
    /// for the remaining connections.
    ///
    /// # Errors
    /// Returns an error if the transport fails
    pub async fn serve<F>(self, listener: TcpListener, signal: F) -> Result<(), ServerError>
    where
        F: Future<Output = String> + Send,
    {
        let local_addr = listener.local_addr().ok();
        let (health, health_service) = HealthState::new();
        health.set_serving().await;
        let handler = PromptHandler::new(self.connector.clone(), self.coordinator.clone());

        let coordinator = self.coordinator.clone();
        let shutdown = async move {
            let reason = signal.await;
            health.set_not_serving().await;
            coordinator.trigger_shutdown(&reason).await;
        };

        info!(
            address = ?local_addr,
            provider = %self.connector.provider(),
            "Connector server listening"
        );

        let serve = tonic::transport::Server::builder()
            .add_service(health_service)
            .add_service(handler.into_service())
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown);

        tokio::select! {
            result = serve => result?,
            () = self.coordinator.force_closed() => {
                warn!("Drain budget exhausted, abandoning open connections");
            }
        }

        info!("Connector server stopped");
        Ok(())
    }
}
