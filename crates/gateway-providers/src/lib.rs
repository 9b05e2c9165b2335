//! # Gateway Providers
//!
//! Provider implementations for the model connector.
//!
//! Each provider supplies a client (network I/O, credentials) and a codec
//! (request translation and response normalization). [`ProviderConnector`]
//! composes the two into a [`gateway_core::Connector`]:
//! - OpenAI-style chat completions, streamed as server-sent events
//! - Cohere-style generate, streamed as newline-delimited JSON

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod cohere;
pub mod connector;
pub mod lines;
pub mod openai;
pub mod registry;

// Re-export main types
pub use client::{ClientFactory, ClientSlot, ProviderSettings};
pub use cohere::{CohereClient, CohereCodec, CohereModel};
pub use connector::ProviderConnector;
pub use openai::{OpenAIClient, OpenAICodec, OpenAIModel};
pub use registry::ConnectorRegistry;

/// Connector for the OpenAI-style provider
pub type OpenAIConnector = ProviderConnector<OpenAICodec>;

/// Connector for the Cohere-style provider
pub type CohereConnector = ProviderConnector<CohereCodec>;
