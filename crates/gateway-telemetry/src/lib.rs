//! # Gateway Telemetry
//!
//! Observability for the model connector.
//!
//! This crate provides:
//! - Subscriber setup with pretty or JSON output
//! - Request identifiers
//! - A span helper for RPCs

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod tracing_setup;

pub use tracing_setup::{init_tracing, new_request_id, TracingConfig, TracingError};
