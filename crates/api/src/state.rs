use std::sync::Arc;

use herdwatch_core::clock::Clock;
use herdwatch_core::notify::NotificationDispatcher;
use herdwatch_core::store::{AlertStore, ReadingStore, SubjectDirectory};
use herdwatch_events::EventBus;

use crate::config::ServerConfig;
use crate::engine::AlertPipeline;
use crate::realtime::SubscriptionHub;
use crate::ws::WsManager;

/// External collaborators the server is wired to.
///
/// Production uses `PgStore` for all three stores; tests use `MemoryStore`.
pub struct Collaborators {
    pub subjects: Arc<dyn SubjectDirectory>,
    pub readings: Arc<dyn ReadingStore>,
    pub alerts: Arc<dyn AlertStore>,
    pub dispatcher: Arc<dyn NotificationDispatcher>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// Use one store for the subject directory, readings and alerts.
    pub fn from_store<S>(
        store: Arc<S>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self
    where
        S: SubjectDirectory + ReadingStore + AlertStore + 'static,
    {
        Self {
            subjects: store.clone(),
            readings: store.clone(),
            alerts: store,
            dispatcher,
            clock,
        }
    }
}

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// WebSocket connection manager (observers).
    pub ws_manager: Arc<WsManager>,
    /// Centralized event bus for publishing platform events.
    pub event_bus: Arc<EventBus>,
    /// Alert path.
    pub pipeline: Arc<AlertPipeline>,
    /// Display path: subscriptions and pollers.
    pub hub: Arc<SubscriptionHub>,
    pub subjects: Arc<dyn SubjectDirectory>,
    pub readings: Arc<dyn ReadingStore>,
    pub alerts: Arc<dyn AlertStore>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Wire the alert pipeline, subscription hub and event bus around the
    /// given collaborators.
    pub fn new(config: ServerConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            subjects,
            readings,
            alerts,
            dispatcher,
            clock,
        } = collaborators;

        let ws_manager = Arc::new(WsManager::new());
        let event_bus = Arc::new(EventBus::default());

        let pipeline = Arc::new(AlertPipeline::new(
            Arc::clone(&subjects),
            Arc::clone(&readings),
            Arc::clone(&alerts),
            dispatcher,
            Arc::clone(&event_bus),
            Arc::clone(&clock),
            config.window_capacity,
            config.reading_ttl(),
        ));

        let hub = Arc::new(SubscriptionHub::new(
            Arc::clone(&ws_manager),
            Arc::clone(&subjects),
            Arc::clone(&readings),
            Arc::clone(&alerts),
            Arc::clone(&clock),
            config.poll_interval(),
        ));

        Self {
            config: Arc::new(config),
            ws_manager,
            event_bus,
            pipeline,
            hub,
            subjects,
            readings,
            alerts,
            clock,
        }
    }
}
