//! Connector registry keyed by provider.
//!
//! The registry is assembled once at startup and is read-only afterwards,
//! so lookups need no locking.

use crate::client::{ClientSlot, ProviderSettings};
use crate::cohere::CohereCodec;
use crate::connector::ProviderConnector;
use crate::openai::OpenAICodec;
use gateway_core::{Connector, GatewayError, GatewayResult, ProviderId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Immutable map from provider to connector
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    connectors: HashMap<ProviderId, Arc<dyn Connector>>,
}

impl std::fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorRegistry")
            .field("providers", &self.providers())
            .finish()
    }
}

impl ConnectorRegistry {
    /// Start building a registry
    #[must_use]
    pub fn builder() -> ConnectorRegistryBuilder {
        ConnectorRegistryBuilder::default()
    }

    /// Registry with every built-in provider.
    ///
    /// `settings_for` supplies the endpoint settings per provider; clients
    /// are not built until first use.
    #[must_use]
    pub fn with_builtin<F>(settings_for: F) -> Self
    where
        F: Fn(ProviderId) -> ProviderSettings,
    {
        Self::builder()
            .register(Arc::new(ProviderConnector::new(
                OpenAICodec,
                ClientSlot::new(settings_for(ProviderId::OpenAI)),
            )))
            .register(Arc::new(ProviderConnector::new(
                CohereCodec,
                ClientSlot::new(settings_for(ProviderId::Cohere)),
            )))
            .build()
    }

    /// Connector for a provider
    pub fn get(&self, provider: ProviderId) -> GatewayResult<Arc<dyn Connector>> {
        self.connectors.get(&provider).cloned().ok_or_else(|| {
            GatewayError::configuration(format!("no connector registered for provider '{provider}'"))
        })
    }

    /// Registered providers, sorted
    #[must_use]
    pub fn providers(&self) -> Vec<ProviderId> {
        let mut providers: Vec<_> = self.connectors.keys().copied().collect();
        providers.sort();
        providers
    }

    /// Number of registered connectors
    #[must_use]
    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    /// Whether no connector is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }
}

/// Builder for [`ConnectorRegistry`]
#[derive(Default)]
pub struct ConnectorRegistryBuilder {
    connectors: HashMap<ProviderId, Arc<dyn Connector>>,
}

impl ConnectorRegistryBuilder {
    /// Add a connector under its own provider id; a later registration for
    /// the same provider replaces the earlier one
    #[must_use]
    pub fn register(mut self, connector: Arc<dyn Connector>) -> Self {
        let provider = connector.provider();
        if self.connectors.insert(provider, connector).is_some() {
            warn!(provider = %provider, "Replacing previously registered connector");
        } else {
            debug!(provider = %provider, "Registered connector");
        }
        self
    }

    /// Freeze the registry
    #[must_use]
    pub fn build(self) -> ConnectorRegistry {
        ConnectorRegistry {
            connectors: self.connectors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cohere, openai};

    fn builtin() -> ConnectorRegistry {
        ConnectorRegistry::with_builtin(|provider| match provider {
            ProviderId::OpenAI => openai::default_settings(),
            ProviderId::Cohere => cohere::default_settings(),
        })
    }

    #[test]
    fn test_builtin_registers_every_provider() {
        let registry = builtin();
        assert_eq!(registry.len(), ProviderId::ALL.len());
        assert_eq!(registry.providers(), vec![ProviderId::OpenAI, ProviderId::Cohere]);
        for provider in ProviderId::ALL {
            assert_eq!(registry.get(provider).unwrap().provider(), provider);
        }
    }

    #[test]
    fn test_missing_provider_is_configuration_error() {
        let registry = ConnectorRegistry::builder().build();
        assert!(registry.is_empty());
        let err = registry.get(ProviderId::Cohere).err().unwrap();
        assert_eq!(err.kind(), gateway_core::ErrorKind::Configuration);
    }

    #[test]
    fn test_lookup_returns_shared_connector() {
        let registry = builtin();
        let a = registry.get(ProviderId::OpenAI).unwrap();
        let b = registry.get(ProviderId::OpenAI).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
