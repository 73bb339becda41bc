//! Per-subject display poller.
//!
//! Idle -> Active happens in [`Poller::spawn`]. The hub hands the immediate
//! snapshot to each subscriber itself, so the first tick fires one interval
//! after the spawn. Active -> Idle is
//! [`Poller::stop`], which returns only after the task has finished, so no
//! store query for the subject can happen afterwards.

use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use herdwatch_core::store::Subject;
use herdwatch_core::types::{DbId, Timestamp};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::hub::SubscriptionHub;

pub struct Poller {
    subject_id: DbId,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    last_tick_at: Arc<Mutex<Option<Timestamp>>>,
}

impl Poller {
    pub(crate) fn spawn(subject: Subject, period: Duration, hub: Weak<SubscriptionHub>) -> Self {
        let subject_id = subject.id;
        let cancel = CancellationToken::new();
        let last_tick_at = Arc::new(Mutex::new(None));

        let handle = tokio::spawn(run(
            subject,
            period,
            hub,
            cancel.clone(),
            Arc::clone(&last_tick_at),
        ));

        Self {
            subject_id,
            cancel,
            handle,
            last_tick_at,
        }
    }

    pub fn subject_id(&self) -> DbId {
        self.subject_id
    }

    pub fn last_tick_at(&self) -> Option<Timestamp> {
        *self
            .last_tick_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancel the timer and wait for the task to end.
    pub async fn stop(self) {
        self.cancel.cancel();
        self.handle.abort();
        if let Err(e) = self.handle.await {
            if !e.is_cancelled() {
                tracing::error!(subject_id = self.subject_id, error = %e, "Poller task failed");
            }
        }
        tracing::debug!(subject_id = self.subject_id, "Poller stopped");
    }
}

async fn run(
    subject: Subject,
    period: Duration,
    hub: Weak<SubscriptionHub>,
    cancel: CancellationToken,
    last_tick_at: Arc<Mutex<Option<Timestamp>>>,
) {
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                let Some(hub) = hub.upgrade() else {
                    break;
                };
                hub.poll_once(&subject).await;
                *last_tick_at.lock().unwrap_or_else(PoisonError::into_inner) = Some(hub.now());
            }
        }
    }
}
