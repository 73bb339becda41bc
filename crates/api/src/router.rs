//! HTTP surface of the service.
//!
//! [`build_app_router`] is shared by the binary and the integration tests, so
//! both see the same routes and middleware.

use std::time::Duration;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, Method, StatusCode, Uri};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::ServerConfig;
use crate::error::AppError;
use crate::routes;
use crate::state::AppState;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build the application [`Router`]: `/health` at the root, the ingestion,
/// alert and realtime API under `/api/v1`, and a JSON 404 for anything else.
///
/// Layers run outermost first on the way in:
///
/// 1. CORS
/// 2. Request ID assigned (or kept, when a tag gateway already set one)
/// 3. Request/response tracing, spans carry the request ID
/// 4. Request ID copied onto the response
/// 5. Request timeout (the WebSocket upgrade answers before it fires)
/// 6. Panic recovery
pub fn build_app_router(state: AppState, config: &ServerConfig) -> Router {
    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        // Liveness and store health, outside the versioned API.
        .merge(routes::health::router())
        // Readings, alerts, realtime status and the observer socket.
        .nest("/api/v1", routes::api_routes())
        .fallback(unknown_route)
        // -- Middleware (innermost first) --
        // A panicking handler becomes a 500 instead of a dropped connection.
        .layer(CatchPanicLayer::new())
        // Bounds every request, slow store queries included.
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        // Request ID onto the response.
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        // One INFO span per request.
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Keep an upstream ID, otherwise mint a UUID.
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        // Dashboard origins.
        .layer(build_cors_layer(config))
        .with_state(state)
}

/// CORS for the monitoring dashboards listed in `CORS_ORIGINS`.
///
/// The API is read with GET and written with POST only. No cookies are
/// involved, so credentials stay disabled. The request ID is exposed so a
/// browser client can quote it in bug reports.
///
/// Panics at startup if a configured origin is not a valid header value.
pub fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .map(|o| {
            o.parse()
                .unwrap_or_else(|e| panic!("Invalid CORS origin '{o}': {e}"))
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)])
        .max_age(Duration::from_secs(3600))
}

async fn unknown_route(uri: Uri) -> AppError {
    tracing::debug!(path = %uri.path(), "No route matched");
    AppError::UnknownRoute(uri.path().to_string())
}
