use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use mochiport_types::api::{
    ApiResponse, AutoSaveDraftRequest, CreateDraftRequest, ListDraftsParams, UpdateDraftRequest,
};

use crate::error::{ApiError, ApiJson, ApiPath, ApiQuery};
use crate::state::AppState;

pub async fn list_drafts(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ListDraftsParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (items, pagination) = state.drafts.get_drafts(params).await?;
    Ok(Json(ApiResponse::paged(items, pagination)))
}

pub async fn get_draft(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let draft = state.drafts.get_draft_by_id(id).await?;
    Ok(Json(ApiResponse::ok(draft)))
}

pub async fn create_draft(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateDraftRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let draft = state.drafts.create_draft(req).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(draft))))
}

pub async fn update_draft(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateDraftRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let draft = state.drafts.update_draft(id, req).await?;
    Ok(Json(ApiResponse::ok(draft)))
}

pub async fn delete_draft(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.drafts.delete_draft(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn publish_draft(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let draft = state.drafts.publish_draft(id).await?;
    Ok(Json(ApiResponse::ok(draft)))
}

pub async fn archive_draft(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let draft = state.drafts.archive_draft(id).await?;
    Ok(Json(ApiResponse::ok(draft)))
}

pub async fn auto_save_draft(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<AutoSaveDraftRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let draft = state.drafts.auto_save_draft(req).await?;
    Ok(Json(ApiResponse::ok(draft)))
}
