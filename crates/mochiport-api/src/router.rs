use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{chat, conversations, drafts, health, realtime, reminders};

/// Assemble the full HTTP surface. Everything except health and the realtime
/// upgrade (which checks its own query token) sits behind `require_auth`.
pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    let public_routes = Router::new()
        .route("/api/health", get(health::health))
        .route("/api/realtime", get(realtime::upgrade));

    let protected_routes = Router::new()
        .route(
            "/api/conversations",
            get(conversations::list_conversations).post(conversations::create_conversation),
        )
        .route(
            "/api/conversations/{id}",
            get(conversations::get_conversation)
                .put(conversations::update_conversation)
                .patch(conversations::update_conversation)
                .delete(conversations::delete_conversation),
        )
        .route(
            "/api/conversations/{id}/messages",
            get(conversations::list_messages).post(conversations::add_message),
        )
        .route("/api/drafts", get(drafts::list_drafts).post(drafts::create_draft))
        .route("/api/drafts/autosave", post(drafts::auto_save_draft))
        .route(
            "/api/drafts/{id}",
            get(drafts::get_draft)
                .put(drafts::update_draft)
                .patch(drafts::update_draft)
                .delete(drafts::delete_draft),
        )
        .route("/api/drafts/{id}/publish", post(drafts::publish_draft))
        .route("/api/drafts/{id}/archive", post(drafts::archive_draft))
        .route(
            "/api/reminders",
            get(reminders::list_reminders).post(reminders::create_reminder),
        )
        .route("/api/reminders/upcoming", get(reminders::upcoming_reminders))
        .route("/api/reminders/overdue", get(reminders::overdue_reminders))
        .route(
            "/api/reminders/{id}",
            get(reminders::get_reminder)
                .put(reminders::update_reminder)
                .patch(reminders::update_reminder)
                .delete(reminders::delete_reminder),
        )
        .route("/api/reminders/{id}/snooze", post(reminders::snooze_reminder))
        .route("/api/reminders/{id}/complete", post(reminders::complete_reminder))
        .route("/api/reminders/{id}/cancel", post(reminders::cancel_reminder))
        .route("/api/chat", post(chat::chat))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Route")
}
