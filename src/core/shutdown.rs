//! Shutdown coordination
//!
//! The signal listener only flips the run state. Teardown happens on the
//! coordinator's own task once it observes the transition.

use crate::core::runtime::RunState;
use crate::subscriptions::{SubscriptionManager, TeardownReport};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Drives `Running -> Stopping -> Stopped` and tears down subscriptions
pub struct ShutdownCoordinator {
    run_state: RunState,
    subscriptions: Arc<SubscriptionManager>,
}

impl ShutdownCoordinator {
    pub fn new(run_state: RunState, subscriptions: Arc<SubscriptionManager>) -> Self {
        Self {
            run_state,
            subscriptions,
        }
    }

    /// Wait until a stop is requested, then tear everything down
    pub async fn run(&self) -> TeardownReport {
        self.run_state.wait_for_stop().await;
        self.teardown().await
    }

    /// Request a stop now and tear everything down
    pub async fn shutdown(&self) -> TeardownReport {
        self.run_state.request_stop();
        self.teardown().await
    }

    async fn teardown(&self) -> TeardownReport {
        info!("Stopping script...");
        let report = self.subscriptions.unsubscribe_all().await;

        if report.is_clean() {
            info!(closed = report.closed.len(), "Shutdown complete: {} subscriptions closed", report.closed.len());
        } else {
            warn!(
                closed = report.closed.len(),
                errors = report.errors.len(),
                "Shutdown complete: {} subscriptions closed with {} errors",
                report.closed.len(),
                report.errors.len()
            );
        }

        self.run_state.mark_stopped();
        report
    }
}

/// Wait for SIGINT (or SIGTERM on unix) and request a stop
///
/// Spawn this on its own task; it performs no teardown itself.
pub async fn listen_for_signals(run_state: RunState) {
    wait_for_signal().await;
    if run_state.request_stop() {
        info!("Shutdown signal received");
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Failed to install SIGTERM handler: {}", e);
            ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    ctrl_c().await;
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}
