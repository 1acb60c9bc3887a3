use axum::{Json, extract::State, response::IntoResponse};

use mochiport_types::api::{ApiResponse, ChatRequest};

use crate::error::{ApiError, ApiJson};
use crate::state::AppState;

pub async fn chat(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state.chat.send(req).await?;
    Ok(Json(ApiResponse::ok(response)))
}
