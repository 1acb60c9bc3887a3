use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use mochiport_types::api::{
    ApiResponse, CreateConversationRequest, ListConversationsParams, MessagesParams, NewMessage,
    UpdateConversationRequest,
};

use crate::error::{ApiError, ApiJson, ApiPath, ApiQuery};
use crate::state::AppState;

pub async fn list_conversations(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ListConversationsParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (items, pagination) = state.conversations.get_conversations(params).await?;
    Ok(Json(ApiResponse::paged(items, pagination)))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let conversation = state.conversations.get_conversation_by_id(id).await?;
    Ok(Json(ApiResponse::ok(conversation)))
}

pub async fn create_conversation(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let conversation = state.conversations.create_conversation(req).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(conversation))))
}

pub async fn update_conversation(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let conversation = state.conversations.update_conversation(id, req).await?;
    Ok(Json(ApiResponse::ok(conversation)))
}

pub async fn delete_conversation(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.conversations.delete_conversation(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_messages(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(params): ApiQuery<MessagesParams>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = state.conversations.get_messages(id, params.limit).await?;
    Ok(Json(ApiResponse::ok(messages)))
}

/// Responds with the whole conversation, new message included.
pub async fn add_message(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<NewMessage>,
) -> Result<impl IntoResponse, ApiError> {
    let conversation = state.conversations.add_message(id, req).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(conversation))))
}
