//! # Gateway Core
//!
//! Core types, traits, and error handling for the model connector.
//!
//! This crate provides the foundational types used throughout the connector:
//! - The canonical prompt request, response, and stream chunk shapes
//! - The finish-reason enumeration shared by every provider
//! - The per-provider client and codec contracts
//! - The provider-agnostic [`Connector`] seam the RPC layer talks to
//! - Error types and handling

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod provider;
pub mod request;
pub mod response;
pub mod types;

// Re-export commonly used types
pub use error::{ErrorKind, GatewayError, GatewayResult};
pub use provider::{ChunkStream, Connector, NativeStream, ProviderClient, ProviderCodec};
pub use request::{ParameterBag, PromptRequest};
pub use response::{FinishReason, PromptResponse, StreamChunk};
pub use types::{ModelId, ProviderId};
