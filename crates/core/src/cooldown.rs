//! Cooldown pre-filter in front of the alert writer.
//!
//! The gate is an optimization: it saves a conditional write when the alert
//! history already shows a recent alert of the same type. It is not a lock.
//! Two evaluations for the same subject can both pass it, and uniqueness is
//! then enforced by [`crate::writer::AlertWriter`].

use std::sync::Arc;

use crate::alert::AlertType;
use crate::clock::Clock;
use crate::store::{AlertStore, StoreError};
use crate::types::DbId;

pub struct CooldownGate {
    alerts: Arc<dyn AlertStore>,
    clock: Arc<dyn Clock>,
}

impl CooldownGate {
    pub fn new(alerts: Arc<dyn AlertStore>, clock: Arc<dyn Clock>) -> Self {
        Self { alerts, clock }
    }

    /// `false` when the subject already has an alert of `alert_type` inside
    /// that type's cooldown.
    pub async fn may_alert(
        &self,
        subject_id: DbId,
        alert_type: AlertType,
    ) -> Result<bool, StoreError> {
        let since = self.clock.now() - alert_type.cooldown_chrono();
        let recent = self
            .alerts
            .latest_since(subject_id, alert_type, since)
            .await?;

        if let Some(alert) = &recent {
            tracing::debug!(
                subject_id,
                alert_type = %alert_type,
                last_alert_id = alert.alert_id,
                "Alert suppressed (cooldown)"
            );
        }
        Ok(recent.is_none())
    }
}
