//! Error to gRPC status mapping.
//!
//! Every failure surfaces as `INTERNAL` with the error's display text as the
//! status message. The error class travels in the `x-error-kind` trailer so
//! callers can tell a configuration problem from an upstream rejection from a
//! stream that broke mid-flight.

use gateway_core::GatewayError;
use tonic::metadata::MetadataValue;
use tonic::Status;

/// Metadata key carrying [`gateway_core::ErrorKind`]
pub const ERROR_KIND_KEY: &str = "x-error-kind";

/// Convert a connector error into a gRPC status
#[must_use]
pub fn status_from_error(err: &GatewayError) -> Status {
    let mut status = Status::internal(err.to_string());
    status
        .metadata_mut()
        .insert(ERROR_KIND_KEY, MetadataValue::from_static(err.kind().as_str()));
    status
}

/// Status for RPCs that arrive after shutdown started
#[must_use]
pub fn shutting_down() -> Status {
    Status::unavailable("server is shutting down")
}

/// Error kind carried by a status, if any
#[must_use]
pub fn error_kind(status: &Status) -> Option<&str> {
    status
        .metadata()
        .get(ERROR_KIND_KEY)
        .and_then(|value| value.to_str().ok())
}
