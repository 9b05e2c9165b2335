//! # Gateway Server
//!
//! gRPC host for the model connector.
//!
//! This crate provides:
//! - The `connector.v1.ConnectorService` wire types and tonic service
//! - Unary and server-streaming prompt handlers
//! - Standard gRPC health reporting
//! - Graceful shutdown with a bounded drain

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod handlers;
pub mod health;
pub mod proto;
pub mod server;
pub mod shutdown;

// Re-export main types
pub use error::{error_kind, status_from_error, ERROR_KIND_KEY};
pub use handlers::{credential_from_metadata, relay, PromptHandler, RelayOutcome, API_KEY_HEADER};
pub use health::HealthState;
pub use server::{Server, ServerConfig, ServerError};
pub use shutdown::{shutdown_signal, RequestGuard, ShutdownCoordinator, ShutdownPhase};
