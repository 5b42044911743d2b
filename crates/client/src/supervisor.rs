//! Outermost restart-forever loop.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use cb_hal::{Indicator, LedColor, LedStatus};

use crate::error::ClientError;
use crate::retry::RetryDelay;
use crate::session::Session;

/// Runs [`Session`]s to completion and restarts the lifecycle after every
/// failure, forever. The loop has no failure exit of its own; cancelling the
/// `shutdown` token is the only way out.
///
/// Create via [`ClientBuilder`](crate::builder::ClientBuilder).
pub struct Supervisor {
    pub(crate) session: Session,
    pub(crate) retry: RetryDelay,
    pub(crate) indicator: Arc<dyn Indicator>,
}

impl Supervisor {
    /// Run until `shutdown` is cancelled. Each iteration builds fresh
    /// per-connection state: no heartbeat interval or observed amplitude
    /// survives a restart.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), ClientError> {
        loop {
            if shutdown.is_cancelled() {
                return Err(ClientError::Shutdown);
            }

            let result = tokio::select! {
                r = self.session.run() => r,
                _ = shutdown.cancelled() => {
                    tracing::info!("shutdown requested");
                    return Err(ClientError::Shutdown);
                }
            };

            match result {
                Ok(()) => tracing::info!("session ended"),
                Err(e) => tracing::warn!(error = %e, "session failed"),
            }

            // Recovering signal while the device is disconnected.
            self.indicator.set_color(LedColor::Red);
            self.indicator.set_status(LedStatus::Blink);

            let delay = self.retry.next_delay();
            tracing::info!(delay_ms = delay.as_millis() as u64, "reconnecting");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.cancelled() => return Err(ClientError::Shutdown),
            }
        }
    }

    /// Same as [`run`](Self::run), but returns a `JoinHandle` for embedding
    /// in a larger runtime.
    pub fn spawn(
        self,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<Result<(), ClientError>> {
        tokio::spawn(async move { self.run(shutdown).await })
    }
}
