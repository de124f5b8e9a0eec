//! Scoped browser lifetime.

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, instrument, warn};

use super::{BrowserLauncher, BrowserSession, LaunchOptions};
use crate::error::BrowserError;

/// Upper bound on how long teardown may take once the body has finished.
pub const TEARDOWN_GRACE: Duration = Duration::from_secs(10);

/// Launches browsers under a concurrency bound and always closes them.
///
/// `run` acquires a permit, launches, runs the body under the deadline,
/// then closes the session whether the body returned, failed, timed out,
/// or panicked. If the `run` future itself is dropped, the close is
/// handed to a background task holding the permit until it finishes.
#[derive(Clone)]
pub struct BrowserScope {
    launcher: Arc<dyn BrowserLauncher>,
    limiter: Arc<Semaphore>,
}

impl BrowserScope {
    /// Creates a scope allowing `max_concurrent` live browsers.
    pub fn new(launcher: Arc<dyn BrowserLauncher>, max_concurrent: usize) -> Self {
        Self {
            launcher,
            limiter: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Returns the number of browsers that could start right now.
    pub fn available_permits(&self) -> usize {
        self.limiter.available_permits()
    }

    /// Runs `body` against a freshly launched browser.
    ///
    /// # Errors
    ///
    /// Returns the body's error, or a [`BrowserError`] converted into `E`
    /// when the launch fails or the deadline elapses.
    #[instrument(skip_all, fields(headless = options.headless))]
    pub async fn run<T, E, F, Fut>(
        &self,
        options: &LaunchOptions,
        deadline: Instant,
        body: F,
    ) -> Result<T, E>
    where
        E: From<BrowserError>,
        F: FnOnce(Arc<dyn BrowserSession>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = match timeout_at(deadline, Arc::clone(&self.limiter).acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(BrowserError::Launch("browser limiter closed".to_string()).into()),
            Err(_) => {
                debug!("Deadline elapsed waiting for a browser slot");
                return Err(BrowserError::DeadlineElapsed.into());
            }
        };

        let session = match timeout_at(deadline, self.launcher.launch(options)).await {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(BrowserError::DeadlineElapsed.into()),
        };
        debug!("Browser launched");
        let guard = TeardownGuard {
            session: Some(Arc::clone(&session)),
            permit: Some(permit),
        };

        let outcome = AssertUnwindSafe(timeout_at(deadline, body(session)))
            .catch_unwind()
            .await;

        guard.close().await;

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                debug!("Deadline elapsed during browser work");
                Err(BrowserError::DeadlineElapsed.into())
            }
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

/// Owns a live session and its permit until the session is closed.
struct TeardownGuard {
    session: Option<Arc<dyn BrowserSession>>,
    permit: Option<OwnedSemaphorePermit>,
}

impl TeardownGuard {
    async fn close(mut self) {
        if let Some(session) = self.session.take() {
            close_session(session.as_ref()).await;
        }
    }
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let permit = self.permit.take();
        match Handle::try_current() {
            Ok(runtime) => {
                debug!("Browser work cancelled; closing in the background");
                runtime.spawn(async move {
                    close_session(session.as_ref()).await;
                    drop(permit);
                });
            }
            Err(_) => warn!("Browser work cancelled outside a runtime; close skipped"),
        }
    }
}

async fn close_session(session: &dyn BrowserSession) {
    match timeout(TEARDOWN_GRACE, session.close()).await {
        Ok(Ok(())) => debug!("Browser closed"),
        Ok(Err(e)) => warn!(error = %e, "Browser close failed"),
        Err(_) => warn!("Browser close did not finish within the grace period"),
    }
}

impl std::fmt::Debug for BrowserScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserScope")
            .field("available_permits", &self.limiter.available_permits())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
