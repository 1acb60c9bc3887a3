use axum::{Json, extract::State, http::StatusCode};
use tracing::warn;

use mochiport_types::api::{ComponentHealth, HealthResponse};
use mochiport_types::models::timestamp_now;

use crate::services::run_blocking;
use crate::state::AppState;

/// Liveness plus a database round trip. Answers 503 when the store is down.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = match run_blocking(&state.store, |s| s.ping()).await {
        Ok(()) => ComponentHealth {
            backend: state.store.backend(),
            ok: true,
            error: None,
        },
        Err(e) => {
            warn!("Health check: database unavailable: {}", e);
            ComponentHealth {
                backend: state.store.backend(),
                ok: false,
                error: Some(e.to_string()),
            }
        }
    };

    let (status, label) = if database.ok {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status,
        Json(HealthResponse {
            status: label,
            version: env!("CARGO_PKG_VERSION"),
            timestamp: timestamp_now(),
            database,
            ai_service: state.ai.name(),
            realtime_clients: state.dispatcher.connected_clients(),
        }),
    )
}
