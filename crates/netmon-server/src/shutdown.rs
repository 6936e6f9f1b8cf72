//! Graceful shutdown coordination via `CancellationToken`.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Default time allowed for tasks to finish.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// How the tracked tasks ended.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Tasks that returned (or panicked) before the deadline.
    pub finished: usize,
    /// Tasks still running at the deadline, left detached.
    pub abandoned: usize,
}

/// One token shared by the listener, the pipeline, the periodic trigger and
/// every session.
#[derive(Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a clone of the cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Initiate shutdown.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether a shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the token, then give `handles` until `timeout` to finish.
    ///
    /// A measurement in flight is never interrupted, so the pipeline task
    /// can outlive the deadline; it is counted as abandoned, not aborted.
    pub async fn graceful_shutdown(
        &self,
        handles: Vec<JoinHandle<()>>,
        timeout: Option<Duration>,
    ) -> ShutdownReport {
        let timeout = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);
        self.shutdown();
        info!(
            task_count = handles.len(),
            timeout_secs = timeout.as_secs(),
            "waiting for tasks to complete"
        );

        let deadline = tokio::time::Instant::now() + timeout;
        let mut report = ShutdownReport::default();
        for handle in handles {
            match tokio::time::timeout_at(deadline, handle).await {
                Ok(_) => report.finished += 1,
                Err(_) => report.abandoned += 1,
            }
        }

        if report.abandoned > 0 {
            warn!(abandoned = report.abandoned, "shutdown timed out after {timeout:?}");
        } else {
            info!(finished = report.finished, "all tasks stopped");
        }
        report
    }
}
