use std::net::SocketAddr;
use std::sync::Arc;

use herdwatch_core::clock::SystemClock;
use herdwatch_core::notify::NotificationDispatcher;
use herdwatch_events::{LogDispatcher, WebhookDispatcher};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use herdwatch_api::background::{reading_retention, window_sweeper};
use herdwatch_api::config::ServerConfig;
use herdwatch_api::notifications::AlertRelay;
use herdwatch_api::router::build_app_router;
use herdwatch_api::state::{AppState, Collaborators};
use herdwatch_api::ws;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "herdwatch_api=debug,tower_http=debug".into()),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = herdwatch_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    herdwatch_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    herdwatch_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    let store = Arc::new(herdwatch_db::PgStore::new(pool));

    // --- Notification channel ---
    let dispatcher: Arc<dyn NotificationDispatcher> = match &config.notify_webhook_url {
        Some(url) => {
            tracing::info!(url = %url, "Alert notifications go to webhook");
            Arc::new(WebhookDispatcher::new(url.as_str()).expect("Failed to build webhook client"))
        }
        None => {
            tracing::info!("No NOTIFY_WEBHOOK_URL set, alert notifications are logged only");
            Arc::new(LogDispatcher)
        }
    };

    // --- App state ---
    let state = AppState::new(
        config.clone(),
        Collaborators::from_store(store, dispatcher, Arc::new(SystemClock)),
    );

    // --- Background jobs ---
    let cancel = CancellationToken::new();

    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&state.ws_manager), cancel.clone());

    let relay = AlertRelay::new(Arc::clone(&state.hub));
    let relay_handle = tokio::spawn(relay.run(state.event_bus.subscribe(), cancel.clone()));

    let retention_handle = tokio::spawn(reading_retention::run(
        Arc::clone(&state.readings),
        Arc::clone(&state.clock),
        cancel.clone(),
    ));

    let sweeper_handle = tokio::spawn(window_sweeper::run(
        Arc::clone(&state.pipeline),
        config.window_idle(),
        cancel.clone(),
    ));

    tracing::info!("Background jobs started (heartbeat, alert relay, retention, window sweeper)");

    // --- Router ---
    let hub = Arc::clone(&state.hub);
    let ws_manager = Arc::clone(&state.ws_manager);
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    cancel.cancel();
    let jobs = futures::future::join_all([
        heartbeat_handle,
        relay_handle,
        retention_handle,
        sweeper_handle,
    ]);
    if tokio::time::timeout(config.shutdown_timeout(), jobs).await.is_err() {
        tracing::warn!("Background jobs did not stop within the shutdown timeout");
    }
    tracing::info!("Background jobs stopped");

    hub.shutdown().await;

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
