use std::sync::Arc;

use herdwatch_core::types::{DbId, ObserverId};
use serde::Serialize;

use crate::ws::{ServerMessage, WsManager};

/// Outcome of one fan-out.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FanoutReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Delivers a payload to a set of observers over their WebSocket channels.
///
/// A failed delivery is logged and skipped; the remaining observers still
/// receive the frame.
pub struct FanoutDispatcher {
    ws_manager: Arc<WsManager>,
}

impl FanoutDispatcher {
    pub fn new(ws_manager: Arc<WsManager>) -> Self {
        Self { ws_manager }
    }

    pub async fn deliver(
        &self,
        subject_id: DbId,
        observers: &[ObserverId],
        message: &ServerMessage,
    ) -> FanoutReport {
        let frame = message.to_ws();
        let mut report = FanoutReport::default();
        for observer in observers {
            match self.ws_manager.send_to(observer, frame.clone()).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(subject_id, observer = %observer, error = %e, "Fan-out delivery failed");
                }
            }
        }
        report
    }

    /// Direct message to a single observer (acks, errors, late-join snapshots).
    pub async fn send_to(&self, observer: &str, message: &ServerMessage) -> bool {
        match self.ws_manager.send_to(observer, message.to_ws()).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(observer, error = %e, "Direct delivery failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn one_failed_observer_does_not_block_the_others() {
        let ws = Arc::new(WsManager::new());
        let mut rx_a = ws.add("a".into()).await;
        let rx_b = ws.add("b".into()).await;
        let mut rx_c = ws.add("c".into()).await;
        drop(rx_b);

        let fanout = FanoutDispatcher::new(Arc::clone(&ws));
        let observers = vec!["a".to_string(), "b".to_string(), "ghost".to_string(), "c".to_string()];
        let report = fanout
            .deliver(1, &observers, &ServerMessage::Subscribed { subject_id: 1 })
            .await;

        assert_eq!(report, FanoutReport { delivered: 2, failed: 2 });
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_c.try_recv().is_ok());
    }

    #[tokio::test]
    async fn send_to_unknown_observer_reports_false() {
        let fanout = FanoutDispatcher::new(Arc::new(WsManager::new()));
        assert!(!fanout.send_to("nobody", &ServerMessage::error("x")).await);
    }
}
