//! Error types for the connector.
//!
//! The taxonomy is intentionally small: a caller must be able to tell a
//! configuration problem from an upstream transport failure from a stream
//! that broke after it started, and the provider's own diagnostic text is
//! always carried through.

use crate::types::ProviderId;
use thiserror::Error;

/// Result type used across the connector crates
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors raised while serving a prompt
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Required configuration (usually a credential) is missing or invalid
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },

    /// The provider rejected the call or could not be reached
    #[error("{provider} request failed: {message}")]
    Upstream {
        /// Provider that produced the failure
        provider: ProviderId,
        /// HTTP status returned by the provider, if any
        status: Option<u16>,
        /// Provider diagnostic text, preserved verbatim
        message: String,
    },

    /// An already-open provider stream failed while being read
    #[error("{provider} stream failed: {message}")]
    Stream {
        /// Provider whose stream failed
        provider: ProviderId,
        /// Error message
        message: String,
    },

    /// Contract violation inside the connector itself
    #[error("Internal error: {message}")]
    Internal {
        /// Error message
        message: String,
    },
}

impl GatewayError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an upstream error
    pub fn upstream(provider: ProviderId, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Upstream {
            provider,
            status,
            message: message.into(),
        }
    }

    /// Create a mid-stream error
    pub fn stream(provider: ProviderId, message: impl Into<String>) -> Self {
        Self::Stream {
            provider,
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Coarse classification used for logging and wire metadata
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Upstream { .. } => ErrorKind::Upstream,
            Self::Stream { .. } => ErrorKind::Stream,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// HTTP status reported by the provider, when there was one
    #[must_use]
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => *status,
            _ => None,
        }
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or invalid configuration
    Configuration,
    /// Upstream transport failure before any output was produced
    Upstream,
    /// Failure of an already-open stream
    Stream,
    /// Connector bug
    Internal,
}

impl ErrorKind {
    /// Stable lowercase name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Upstream => "upstream",
            Self::Stream => "stream",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
