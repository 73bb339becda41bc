//! Periodic deletion of expired readings.
//!
//! Every persisted reading carries an `expires_at` marker (epoch seconds);
//! this job deletes the ones whose marker has passed.

use std::sync::Arc;
use std::time::Duration;

use herdwatch_core::clock::Clock;
use herdwatch_core::store::ReadingStore;
use tokio_util::sync::CancellationToken;

/// How often the purge runs.
pub const PURGE_INTERVAL: Duration = Duration::from_secs(3600);

/// Run the retention loop until `cancel` is triggered.
pub async fn run(readings: Arc<dyn ReadingStore>, clock: Arc<dyn Clock>, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = PURGE_INTERVAL.as_secs(),
        "Reading retention job started"
    );

    let mut interval = tokio::time::interval(PURGE_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Reading retention job stopping");
                break;
            }
            _ = interval.tick() => {
                purge_once(readings.as_ref(), clock.as_ref()).await;
            }
        }
    }
}

/// One purge pass. Returns the number of deleted readings (0 on failure).
pub async fn purge_once(readings: &dyn ReadingStore, clock: &dyn Clock) -> u64 {
    match readings.purge_expired(clock.now().timestamp()).await {
        Ok(deleted) => {
            if deleted > 0 {
                tracing::info!(deleted, "Reading retention: purged expired rows");
            } else {
                tracing::debug!("Reading retention: nothing to purge");
            }
            deleted
        }
        Err(e) => {
            tracing::error!(error = %e, "Reading retention: purge failed");
            0
        }
    }
}
