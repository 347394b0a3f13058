//! Process-wide run state shared by the screener, subscriptions and shutdown

use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Lifecycle phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Running => "running",
            Phase::Stopping => "stopping",
            Phase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Cooperative cancellation signal
///
/// Cloning shares the same state. Transitions only move forward:
/// `Running -> Stopping -> Stopped`.
#[derive(Clone)]
pub struct RunState {
    phase: Arc<watch::Sender<Phase>>,
}

impl RunState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Phase::Running);
        Self {
            phase: Arc::new(tx),
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.phase() == Phase::Running
    }

    /// True once a stop has been requested, including after teardown finished
    pub fn is_stopping(&self) -> bool {
        !self.is_running()
    }

    /// Move `Running -> Stopping`
    ///
    /// Returns `true` only for the call that performed the transition.
    pub fn request_stop(&self) -> bool {
        let changed = self.phase.send_if_modified(|phase| {
            if *phase == Phase::Running {
                *phase = Phase::Stopping;
                true
            } else {
                false
            }
        });
        if changed {
            info!("RunState: stop requested");
        }
        changed
    }

    /// Move `Stopping -> Stopped`; has no effect from any other phase
    pub fn mark_stopped(&self) -> bool {
        self.phase.send_if_modified(|phase| {
            if *phase == Phase::Stopping {
                *phase = Phase::Stopped;
                true
            } else {
                false
            }
        })
    }

    /// Resolve once the run has left `Running`
    pub async fn wait_for_stop(&self) {
        let mut rx = self.phase.subscribe();
        // The sender lives inside self, so the channel cannot close while we wait
        let _ = rx.wait_for(|phase| *phase != Phase::Running).await;
    }

    /// Resolve once teardown has completed
    pub async fn wait_for_stopped(&self) {
        let mut rx = self.phase.subscribe();
        let _ = rx.wait_for(|phase| *phase == Phase::Stopped).await;
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunState")
            .field("phase", &self.phase())
            .finish()
    }
}
