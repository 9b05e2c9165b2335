//! Client construction and the lazy per-provider client slot.
//!
//! A [`ClientSlot`] holds the settings for one provider, one HTTP connection
//! pool, and a once-only cell for its process-wide client. The default client
//! is built the first time it is asked for, from the credential named by
//! [`ProviderSettings::api_key_env`]. A client built from an explicit
//! credential is request-scoped and never stored in the slot, but it shares
//! the slot's connection pool.

use gateway_core::{GatewayError, GatewayResult, ProviderId};
use once_cell::sync::OnceCell;
use reqwest::{Client, Response};
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Default connect timeout for upstream calls
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Where and how to reach one provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    /// Provider these settings belong to
    pub provider: ProviderId,
    /// API base URL, without a trailing slash
    pub base_url: String,
    /// Environment variable holding the default credential
    pub api_key_env: String,
    /// TCP connect timeout. There is no total request timeout: streams may
    /// legitimately stay open for a long time.
    pub connect_timeout: Duration,
}

impl ProviderSettings {
    /// Create settings
    #[must_use]
    pub fn new(
        provider: ProviderId,
        base_url: impl Into<String>,
        api_key_env: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key_env: api_key_env.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Replace the base URL when an override is present
    #[must_use]
    pub fn with_base_url(mut self, base_url: Option<&str>) -> Self {
        if let Some(url) = base_url {
            self.base_url = url.trim_end_matches('/').to_string();
        }
        self
    }

    /// Replace the credential variable name when an override is present
    #[must_use]
    pub fn with_api_key_env(mut self, api_key_env: Option<&str>) -> Self {
        if let Some(name) = api_key_env {
            self.api_key_env = name.to_string();
        }
        self
    }

    /// Full URL for an API path
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Build the shared HTTP client for these settings
    pub(crate) fn http_client(&self) -> GatewayResult<Client> {
        Client::builder()
            .connect_timeout(self.connect_timeout)
            .pool_max_idle_per_host(100)
            .build()
            .map_err(|e| GatewayError::internal(format!("Failed to create HTTP client: {e}")))
    }
}

/// Constructs a provider client from a credential
pub trait ClientFactory: Sized + Send + Sync + 'static {
    /// Build a client that sends through `http` and authenticates with `api_key`
    fn from_credential(http: Client, api_key: SecretString, settings: &ProviderSettings) -> Self;
}

type EnvLookup = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Lazily initialised, process-wide client for one provider
pub struct ClientSlot<C> {
    settings: ProviderSettings,
    http: OnceCell<Client>,
    cell: OnceCell<Arc<C>>,
    lookup: Box<EnvLookup>,
}

impl<C> std::fmt::Debug for ClientSlot<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSlot")
            .field("settings", &self.settings)
            .field("initialized", &self.cell.get().is_some())
            .finish_non_exhaustive()
    }
}

impl<C: ClientFactory> ClientSlot<C> {
    /// Slot reading its credential from the process environment
    #[must_use]
    pub fn new(settings: ProviderSettings) -> Self {
        Self::with_lookup(settings, |key| std::env::var(key).ok())
    }

    /// Slot reading its credential through `lookup`
    #[must_use]
    pub fn with_lookup<F>(settings: ProviderSettings, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            settings,
            http: OnceCell::new(),
            cell: OnceCell::new(),
            lookup: Box::new(lookup),
        }
    }

    /// Settings this slot builds clients with
    #[must_use]
    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    /// Whether the default client has been built
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Whether the connection pool has been built
    #[must_use]
    pub fn has_http_pool(&self) -> bool {
        self.http.get().is_some()
    }

    /// Connection pool shared by every client this slot hands out
    fn http(&self) -> GatewayResult<Client> {
        self.http.get_or_try_init(|| self.settings.http_client()).cloned()
    }

    /// Return the process-wide client, building it on first use.
    ///
    /// A missing credential is a configuration error. Failures are not
    /// cached, so a later call can still succeed.
    pub fn get_or_create_default(&self) -> GatewayResult<Arc<C>> {
        self.cell
            .get_or_try_init(|| {
                let env = &self.settings.api_key_env;
                let api_key = (self.lookup)(env)
                    .filter(|value| !value.trim().is_empty())
                    .ok_or_else(|| {
                        GatewayError::configuration(format!(
                            "{env} is not set; cannot create the {} client",
                            self.settings.provider
                        ))
                    })?;

                let client = C::from_credential(self.http()?, SecretString::new(api_key), &self.settings);
                info!(provider = %self.settings.provider, "Created default provider client");
                Ok(Arc::new(client))
            })
            .map(Arc::clone)
    }

    /// Build a fresh client for one caller-supplied credential.
    ///
    /// Only the connection pool is shared; the default client cell is neither
    /// read nor written.
    pub fn with_credential(&self, api_key: &str) -> GatewayResult<Arc<C>> {
        if api_key.trim().is_empty() {
            return Err(GatewayError::configuration(format!(
                "empty credential supplied for {}",
                self.settings.provider
            )));
        }
        debug!(provider = %self.settings.provider, "Creating request-scoped provider client");
        let client = C::from_credential(self.http()?, SecretString::new(api_key.to_string()), &self.settings);
        Ok(Arc::new(client))
    }

    /// Request-scoped client when a credential is given, else the default one
    pub fn create_or_default(&self, api_key: Option<&str>) -> GatewayResult<Arc<C>> {
        match api_key {
            Some(key) => self.with_credential(key),
            None => self.get_or_create_default(),
        }
    }
}

/// Turn a non-2xx response into an upstream error carrying the body text
pub(crate) async fn error_from_response(provider: ProviderId, response: Response) -> GatewayError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    upstream_error(provider, status, &body)
}

pub(crate) fn upstream_error(
    provider: ProviderId,
    status: reqwest::StatusCode,
    body: &str,
) -> GatewayError {
    let body = body.trim();
    let message = if body.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status} - {body}")
    };
    GatewayError::upstream(provider, Some(status.as_u16()), message)
}
