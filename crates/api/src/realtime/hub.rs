//! Subscription coordinator.
//!
//! The registry and the poller table sit behind one `tokio::sync::Mutex`, so
//! a subscription change and the poller transition it causes happen as one
//! step: a subject has a live poller exactly while it has at least one
//! observer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use herdwatch_core::clock::Clock;
use herdwatch_core::error::CoreError;
use herdwatch_core::registry::{SubscribeOutcome, SubscriptionRegistry};
use herdwatch_core::store::{AlertStore, ReadingStore, Subject, SubjectDirectory};
use herdwatch_core::types::{DbId, Timestamp};
use serde::Serialize;
use tokio::sync::Mutex;

use super::fanout::{FanoutDispatcher, FanoutReport};
use super::poller::Poller;
use super::snapshot::SnapshotSource;
use crate::ws::{ServerMessage, WsManager};

#[derive(Default)]
struct HubState {
    registry: SubscriptionRegistry,
    pollers: HashMap<DbId, Poller>,
}

/// Per-subject entry of [`HubStatus`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectStatus {
    pub subject_id: DbId,
    pub subscribers: usize,
    pub last_tick_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubStatus {
    pub observers: usize,
    pub active_pollers: usize,
    pub subjects: Vec<SubjectStatus>,
}

pub struct SubscriptionHub {
    state: Mutex<HubState>,
    fanout: FanoutDispatcher,
    snapshots: SnapshotSource,
    subjects: Arc<dyn SubjectDirectory>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
}

impl SubscriptionHub {
    pub fn new(
        ws_manager: Arc<WsManager>,
        subjects: Arc<dyn SubjectDirectory>,
        readings: Arc<dyn ReadingStore>,
        alerts: Arc<dyn AlertStore>,
        clock: Arc<dyn Clock>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            state: Mutex::new(HubState::default()),
            fanout: FanoutDispatcher::new(ws_manager),
            snapshots: SnapshotSource::new(readings, alerts, Arc::clone(&clock)),
            subjects,
            clock,
            poll_interval,
        }
    }

    /// Subscribe `observer` to `subject_id` on behalf of `requester_id`.
    ///
    /// The ownership check runs first; on failure no edge is created and the
    /// error goes back to the caller only. Every new subscriber gets one
    /// immediate snapshot addressed to it alone; the first one also starts
    /// the subject's poller. Concurrent first subscribes are serialized by the
    /// state lock, so only one of them sees `First`.
    pub async fn subscribe(
        self: &Arc<Self>,
        observer: &str,
        subject_id: DbId,
        requester_id: DbId,
    ) -> Result<SubscribeOutcome, CoreError> {
        let subject = self.authorize(subject_id, requester_id).await?;

        let outcome = {
            let mut state = self.state.lock().await;
            let outcome = state.registry.subscribe(observer, subject_id);
            self.fanout
                .send_to(observer, &ServerMessage::Subscribed { subject_id })
                .await;

            if outcome == SubscribeOutcome::First {
                let hub = Arc::downgrade(self);
                let period = self.poll_interval;
                state
                    .pollers
                    .entry(subject_id)
                    .or_insert_with(|| Poller::spawn(subject.clone(), period, hub));
                tracing::info!(subject_id, observer, "Poller started");
            }
            outcome
        };

        match outcome {
            SubscribeOutcome::First | SubscribeOutcome::Joined => {
                self.send_snapshot(observer, &subject).await;
            }
            SubscribeOutcome::AlreadySubscribed => {
                tracing::debug!(subject_id, observer, "Already subscribed");
            }
        }
        Ok(outcome)
    }

    /// Remove one subscription. Returns `true` when the subject has no
    /// observers left (its poller, if any, has stopped by then).
    pub async fn unsubscribe(&self, observer: &str, subject_id: DbId) -> bool {
        let mut state = self.state.lock().await;
        let emptied = state.registry.unsubscribe(observer, subject_id);
        if emptied {
            if let Some(poller) = state.pollers.remove(&subject_id) {
                poller.stop().await;
                tracing::info!(subject_id, "Last observer left, poller stopped");
            }
        }
        self.fanout
            .send_to(observer, &ServerMessage::Unsubscribed { subject_id })
            .await;
        emptied
    }

    /// Drop every subscription of a departed observer. Returns the subjects
    /// whose pollers were stopped as a result.
    pub async fn disconnect(&self, observer: &str) -> Vec<DbId> {
        let mut state = self.state.lock().await;
        let emptied = state.registry.disconnect(observer);
        for subject_id in &emptied {
            if let Some(poller) = state.pollers.remove(subject_id) {
                poller.stop().await;
            }
        }
        if !emptied.is_empty() {
            tracing::info!(observer, stopped = ?emptied, "Observer disconnected, pollers stopped");
        }
        emptied
    }

    /// Send `message` to every observer of `subject_id`, reading the
    /// subscriber set at call time.
    pub async fn publish(&self, subject_id: DbId, message: &ServerMessage) -> FanoutReport {
        let observers = self.state.lock().await.registry.subscribers(subject_id);
        if observers.is_empty() {
            return FanoutReport::default();
        }
        self.fanout.deliver(subject_id, &observers, message).await
    }

    pub async fn status(&self) -> HubStatus {
        let state = self.state.lock().await;
        let subjects = state
            .registry
            .observed_subjects()
            .into_iter()
            .map(|subject_id| SubjectStatus {
                subject_id,
                subscribers: state.registry.subscribers(subject_id).len(),
                last_tick_at: state.pollers.get(&subject_id).and_then(Poller::last_tick_at),
            })
            .collect();
        HubStatus {
            observers: state.registry.observer_count(),
            active_pollers: state.pollers.len(),
            subjects,
        }
    }

    pub async fn is_polling(&self, subject_id: DbId) -> bool {
        self.state.lock().await.pollers.contains_key(&subject_id)
    }

    /// Stop every poller. Subscriptions are left in place.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        let count = state.pollers.len();
        for (_, poller) in state.pollers.drain() {
            poller.stop().await;
        }
        tracing::info!(count, "All pollers stopped");
    }

    /// One display tick: fetch the snapshot and fan it out. A store error is
    /// logged and the poller carries on.
    pub(crate) async fn poll_once(&self, subject: &Subject) {
        match self.snapshots.fetch(subject).await {
            Ok(messages) => {
                for message in &messages {
                    self.publish(subject.id, message).await;
                }
                tracing::trace!(subject_id = subject.id, count = messages.len(), "Poll tick");
            }
            Err(e) => {
                tracing::warn!(subject_id = subject.id, error = %e, "Poll tick failed");
            }
        }
    }

    pub(crate) fn now(&self) -> Timestamp {
        self.clock.now()
    }

    async fn authorize(&self, subject_id: DbId, requester_id: DbId) -> Result<Subject, CoreError> {
        let subject = self
            .subjects
            .find_by_id(subject_id)
            .await?
            .ok_or_else(|| CoreError::not_found("subject", subject_id))?;
        if subject.owner_id != requester_id {
            return Err(CoreError::Unauthorized(format!(
                "requester {requester_id} may not observe subject {subject_id}"
            )));
        }
        Ok(subject)
    }

    async fn send_snapshot(&self, observer: &str, subject: &Subject) {
        match self.snapshots.fetch(subject).await {
            Ok(messages) => {
                for message in &messages {
                    self.fanout.send_to(observer, message).await;
                }
            }
            Err(e) => {
                tracing::warn!(subject_id = subject.id, observer, error = %e, "Immediate snapshot failed");
                self.fanout
                    .send_to(observer, &ServerMessage::error("snapshot temporarily unavailable"))
                    .await;
            }
        }
    }
}
