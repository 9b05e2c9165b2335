//! Shutdown coordination for the connector server.
//!
//! The coordinator tracks in-flight RPCs through [`RequestGuard`] and moves
//! through [`ShutdownPhase`]s once a shutdown is triggered: new RPCs are
//! refused, in-flight ones get a bounded drain, and the host is told through
//! [`ShutdownCoordinator::force_closed`] when the drain ran out.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tracing::{info, warn};

/// Drain budget used by [`ShutdownCoordinator::with_defaults`]
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Lifecycle phase of the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    /// Accepting RPCs
    Running,
    /// Refusing new RPCs, waiting for in-flight ones
    Draining,
    /// Drain budget exhausted with RPCs still open
    ForceClose,
    /// Shutdown finished
    Complete,
}

impl ShutdownPhase {
    fn rank(self) -> u8 {
        match self {
            Self::Running => 0,
            Self::Draining => 1,
            Self::ForceClose => 2,
            Self::Complete => 3,
        }
    }
}

impl std::fmt::Display for ShutdownPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Running => "running",
            Self::Draining => "draining",
            Self::ForceClose => "force_close",
            Self::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// Tracks in-flight RPCs and drives the shutdown phases
#[derive(Debug)]
pub struct ShutdownCoordinator {
    drain_timeout: Duration,
    phase: watch::Sender<ShutdownPhase>,
    triggered: AtomicBool,
    forced: AtomicBool,
    in_flight: AtomicU64,
    idle: Notify,
}

impl ShutdownCoordinator {
    /// Create a coordinator that waits at most `drain_timeout` for in-flight RPCs
    #[must_use]
    pub fn new(drain_timeout: Duration) -> Self {
        let (phase, _) = watch::channel(ShutdownPhase::Running);
        Self {
            drain_timeout,
            phase,
            triggered: AtomicBool::new(false),
            forced: AtomicBool::new(false),
            in_flight: AtomicU64::new(0),
            idle: Notify::new(),
        }
    }

    /// Coordinator with [`DEFAULT_DRAIN_TIMEOUT`]
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_DRAIN_TIMEOUT)
    }

    /// Whether a shutdown has been triggered
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Current phase
    #[must_use]
    pub fn current_phase(&self) -> ShutdownPhase {
        *self.phase.borrow()
    }

    /// Number of RPCs currently holding a [`RequestGuard`]
    #[must_use]
    pub fn in_flight_count(&self) -> u64 {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Resolves once the coordinator is at or past `target`
    pub async fn reached(&self, target: ShutdownPhase) {
        let mut rx = self.phase.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|phase| phase.rank() >= target.rank()).await;
    }

    /// Resolves only when shutdown finished with RPCs abandoned
    pub async fn force_closed(&self) {
        self.reached(ShutdownPhase::Complete).await;
        if !self.forced.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
    }

    /// Refuse new RPCs and wait up to the drain budget for in-flight ones.
    ///
    /// Only the first call does anything; later calls return immediately.
    pub async fn trigger_shutdown(&self, reason: &str) {
        if self
            .triggered
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        info!(
            reason,
            in_flight = self.in_flight_count(),
            drain_timeout = ?self.drain_timeout,
            "Shutdown triggered"
        );
        self.phase.send_replace(ShutdownPhase::Draining);

        if tokio::time::timeout(self.drain_timeout, self.drained()).await.is_ok() {
            info!("All in-flight RPCs finished");
        } else {
            warn!(remaining = self.in_flight_count(), "Drain budget exhausted");
            self.forced.store(true, Ordering::SeqCst);
            self.phase.send_replace(ShutdownPhase::ForceClose);
        }

        self.phase.send_replace(ShutdownPhase::Complete);
        info!("Shutdown complete");
    }

    async fn drained(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.in_flight_count() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn release(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Counts one in-flight RPC for as long as it is alive
#[derive(Debug)]
pub struct RequestGuard {
    coordinator: Arc<ShutdownCoordinator>,
}

impl RequestGuard {
    /// Register an RPC, or `None` once shutdown has begun.
    ///
    /// The count is raised before the shutdown flag is read, so a drain that
    /// observed zero in-flight RPCs can never be followed by a new guard.
    #[must_use]
    pub fn new(coordinator: Arc<ShutdownCoordinator>) -> Option<Self> {
        coordinator.in_flight.fetch_add(1, Ordering::SeqCst);
        if coordinator.is_shutting_down() {
            coordinator.release();
            return None;
        }
        Some(Self { coordinator })
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.coordinator.release();
    }
}

/// Resolves with a description of the first termination signal received
#[allow(clippy::expect_used)]
pub async fn shutdown_signal() -> String {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigquit = signal(SignalKind::quit()).expect("failed to install SIGQUIT handler");

        tokio::select! {
            () = ctrl_c => "SIGINT".to_string(),
            _ = sigterm.recv() => "SIGTERM".to_string(),
            _ = sigquit.recv() => "SIGQUIT".to_string(),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
        "Ctrl+C".to_string()
    }
}
