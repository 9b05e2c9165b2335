//! Standard gRPC health reporting.
//!
//! Both the overall server (`""`) and the connector service are reported.
//! They flip to `NOT_SERVING` together once shutdown begins.

use crate::proto::SERVICE_NAME;
use tonic_health::pb::health_server::{Health, HealthServer};
use tonic_health::server::{health_reporter, HealthReporter};
use tonic_health::ServingStatus;
use tracing::info;

/// Names whose status is reported
pub const REPORTED_SERVICES: [&str; 2] = ["", SERVICE_NAME];

/// Handle on the health service's status table
#[derive(Clone)]
pub struct HealthState {
    reporter: HealthReporter,
}

impl std::fmt::Debug for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthState").finish_non_exhaustive()
    }
}

impl HealthState {
    /// Create the health service; call [`Self::set_serving`] before serving
    #[must_use]
    pub fn new() -> (Self, HealthServer<impl Health>) {
        let (reporter, service) = health_reporter();
        (Self { reporter }, service)
    }

    /// Mark everything `SERVING`
    pub async fn set_serving(&self) {
        self.set_all(ServingStatus::Serving).await;
    }

    /// Mark everything `NOT_SERVING`
    pub async fn set_not_serving(&self) {
        info!("Health status set to NOT_SERVING");
        self.set_all(ServingStatus::NotServing).await;
    }

    async fn set_all(&self, status: ServingStatus) {
        let mut reporter = self.reporter.clone();
        for name in REPORTED_SERVICES {
            reporter.set_service_status(name, status).await;
        }
    }
}
