//! Drops ingestion windows of tags that have gone silent.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::engine::AlertPipeline;

/// How often idle windows are swept.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Run the sweeper until `cancel` is triggered.
pub async fn run(pipeline: Arc<AlertPipeline>, max_idle: chrono::Duration, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = SWEEP_INTERVAL.as_secs(),
        max_idle_secs = max_idle.num_seconds(),
        "Window sweeper started"
    );

    let mut interval = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Window sweeper stopping");
                break;
            }
            _ = interval.tick() => {
                let evicted = pipeline.sweep_idle(max_idle).await;
                if evicted > 0 {
                    tracing::info!(evicted, "Window sweeper: dropped idle windows");
                }
            }
        }
    }
}
