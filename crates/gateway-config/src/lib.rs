//! # Gateway Config
//!
//! Configuration management for the model connector.
//!
//! Configuration is environment-first: every setting has a documented
//! default and an environment variable that overrides it. An optional YAML or
//! TOML file (named by `CONNECTOR_CONFIG`) can provide a base layer that the
//! environment then overrides.
//!
//! Provider credentials are deliberately absent here. They are read lazily by
//! the provider client slots the first time a client is built.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use gateway_core::ProviderId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Path of an optional configuration file
pub const ENV_CONFIG_FILE: &str = "CONNECTOR_CONFIG";
/// Provider served by this process
pub const ENV_PROVIDER: &str = "CONNECTOR_PROVIDER";
/// Bind host
pub const ENV_HOST: &str = "HOST";
/// Listening port
pub const ENV_PORT: &str = "PORT";
/// Graceful shutdown budget
pub const ENV_SHUTDOWN_TIMEOUT: &str = "SHUTDOWN_TIMEOUT";
/// Log filter directive
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
/// Log output format
pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";
/// OpenAI base URL override
pub const ENV_OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";
/// Cohere base URL override
pub const ENV_COHERE_BASE_URL: &str = "COHERE_BASE_URL";

/// Default listening port
pub const DEFAULT_PORT: u16 = 50051;
/// Default bind host
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Complete connector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    /// Provider this process serves
    pub provider: ProviderId,
    /// Listener and shutdown settings
    pub server: ServerSettings,
    /// Logging settings
    pub logging: LoggingSettings,
    /// Per-provider endpoint overrides
    pub providers: ProviderOverrides,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            provider: ProviderId::OpenAI,
            server: ServerSettings::default(),
            logging: LoggingSettings::default(),
            providers: ProviderOverrides::default(),
        }
    }
}

/// Listener settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind host
    pub host: String,
    /// Listening port
    pub port: u16,
    /// How long in-flight RPCs may take to drain on shutdown
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directive, e.g. `info` or `gateway_server=debug`
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Endpoint overrides for every provider
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderOverrides {
    /// OpenAI overrides
    pub openai: EndpointOverride,
    /// Cohere overrides
    pub cohere: EndpointOverride,
}

impl ProviderOverrides {
    /// Overrides for one provider
    #[must_use]
    pub fn get(&self, provider: ProviderId) -> &EndpointOverride {
        match provider {
            ProviderId::OpenAI => &self.openai,
            ProviderId::Cohere => &self.cohere,
        }
    }

    fn get_mut(&mut self, provider: ProviderId) -> &mut EndpointOverride {
        match provider {
            ProviderId::OpenAI => &mut self.openai,
            ProviderId::Cohere => &mut self.cohere,
        }
    }
}

/// Optional endpoint override; unset fields keep the provider defaults
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointOverride {
    /// Base URL of the provider API
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Name of the environment variable holding the credential
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

/// Configuration loading error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file could not be parsed
    #[error("Failed to parse config file {path}: {message}")]
    Parse {
        /// File path
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// Config file extension is not supported
    #[error("Unsupported config file format: {0} (expected .yaml, .yml or .toml)")]
    UnsupportedFormat(PathBuf),

    /// A setting has an invalid value
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue {
        /// Setting name
        key: String,
        /// Why it was rejected
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl ConnectorConfig {
    /// Load configuration using an arbitrary variable lookup.
    ///
    /// Order: defaults, then the file named by `CONNECTOR_CONFIG`, then
    /// individual environment variables.
    pub fn load<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match non_empty(lookup(ENV_CONFIG_FILE)) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_env(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML or TOML file, chosen by extension
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        let parse_error = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };

        let config = match extension.as_deref() {
            Some("yaml" | "yml") => {
                serde_yaml::from_str(&raw).map_err(|e| parse_error(e.to_string()))?
            }
            Some("toml") => toml::from_str(&raw).map_err(|e| parse_error(e.to_string()))?,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };

        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    fn apply_env<F>(&mut self, lookup: &F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = non_empty(lookup(ENV_PROVIDER)) {
            self.provider = value
                .parse()
                .map_err(|reason: String| ConfigError::invalid(ENV_PROVIDER, reason))?;
        }

        if let Some(value) = non_empty(lookup(ENV_HOST)) {
            self.server.host = value;
        }

        if let Some(value) = non_empty(lookup(ENV_PORT)) {
            self.server.port = value
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid(ENV_PORT, format!("'{value}': {e}")))?;
        }

        if let Some(value) = non_empty(lookup(ENV_SHUTDOWN_TIMEOUT)) {
            self.server.shutdown_timeout = humantime::parse_duration(value.trim())
                .map_err(|e| ConfigError::invalid(ENV_SHUTDOWN_TIMEOUT, format!("'{value}': {e}")))?;
        }

        if let Some(value) = non_empty(lookup(ENV_LOG_LEVEL)) {
            self.logging.level = value;
        }

        if let Some(value) = non_empty(lookup(ENV_LOG_FORMAT)) {
            self.logging.format = value
                .parse()
                .map_err(|reason: String| ConfigError::invalid(ENV_LOG_FORMAT, reason))?;
        }

        for (provider, key) in [
            (ProviderId::OpenAI, ENV_OPENAI_BASE_URL),
            (ProviderId::Cohere, ENV_COHERE_BASE_URL),
        ] {
            if let Some(value) = non_empty(lookup(key)) {
                self.providers.get_mut(provider).base_url = Some(value);
            }
        }

        Ok(())
    }

    /// Reject settings the server could not start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::invalid("server.host", "must not be empty"));
        }
        if self.server.port == 0 {
            return Err(ConfigError::invalid("server.port", "must be non-zero"));
        }
        for provider in ProviderId::ALL {
            if let Some(url) = &self.providers.get(provider).base_url {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(ConfigError::invalid(
                        &format!("providers.{provider}.base_url"),
                        format!("'{url}' is not an http(s) URL"),
                    ));
                }
            }
        }
        Ok(())
    }

    /// `host:port` string for binding
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Load configuration from the process environment
pub fn load_config() -> Result<ConnectorConfig, ConfigError> {
    ConnectorConfig::load(|key| std::env::var(key).ok())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ConnectorConfig::load(lookup(&[])).unwrap();
        assert_eq!(config.provider, ProviderId::OpenAI);
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.bind_address(), "0.0.0.0:50051");
        assert_eq!(config.server.shutdown_timeout, Duration::from_secs(30));
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_env_overrides() {
        let config = ConnectorConfig::load(lookup(&[
            (ENV_PROVIDER, "cohere"),
            (ENV_PORT, "9000"),
            (ENV_HOST, "127.0.0.1"),
            (ENV_SHUTDOWN_TIMEOUT, "5s"),
            (ENV_LOG_FORMAT, "json"),
            (ENV_COHERE_BASE_URL, "http://localhost:1234/v1"),
        ]))
        .unwrap();

        assert_eq!(config.provider, ProviderId::Cohere);
        assert_eq!(config.bind_address(), "127.0.0.1:9000");
        assert_eq!(config.server.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(
            config.providers.cohere.base_url.as_deref(),
            Some("http://localhost:1234/v1")
        );
        assert_eq!(config.providers.openai.base_url, None);
    }

    #[test]
    fn test_empty_values_are_ignored() {
        let config = ConnectorConfig::load(lookup(&[(ENV_PORT, "  ")])).unwrap();
        assert_eq!(config.server.port, DEFAULT_PORT);
    }

    #[test]
    fn test_invalid_port() {
        let err = ConnectorConfig::load(lookup(&[(ENV_PORT, "http")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == ENV_PORT));
    }

    #[test]
    fn test_invalid_provider() {
        let err = ConnectorConfig::load(lookup(&[(ENV_PROVIDER, "llama")])).unwrap_err();
        assert!(err.to_string().contains("llama"));
    }

    #[test]
    fn test_invalid_base_url() {
        let err =
            ConnectorConfig::load(lookup(&[(ENV_OPENAI_BASE_URL, "api.openai.com")])).unwrap_err();
        assert!(err.to_string().contains("providers.openai.base_url"));
    }

    #[test]
    fn test_yaml_file_then_env() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "provider: cohere\nserver:\n  port: 7000\n  shutdown_timeout: 10s\nproviders:\n  cohere:\n    api_key_env: TENANT_COHERE_KEY\n"
        )
        .unwrap();
        let path = file.path().to_string_lossy().to_string();

        let config = ConnectorConfig::load(lookup(&[
            (ENV_CONFIG_FILE, path.as_str()),
            (ENV_PORT, "7001"),
        ]))
        .unwrap();

        assert_eq!(config.provider, ProviderId::Cohere);
        assert_eq!(config.server.port, 7001);
        assert_eq!(config.server.host, DEFAULT_HOST);
        assert_eq!(config.server.shutdown_timeout, Duration::from_secs(10));
        assert_eq!(
            config.providers.cohere.api_key_env.as_deref(),
            Some("TENANT_COHERE_KEY")
        );
    }

    #[test]
    fn test_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "provider = \"openai\"\n\n[logging]\nlevel = \"debug\"\nformat = \"json\"\n"
        )
        .unwrap();

        let config = ConnectorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.server.port, DEFAULT_PORT);
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        let err = ConnectorConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = ConnectorConfig::load(lookup(&[(ENV_CONFIG_FILE, "/nonexistent/connector.yaml")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
