use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use mochiport_types::api::{
    ApiResponse, CreateReminderRequest, ListRemindersParams, SnoozeReminderRequest,
    UpcomingRemindersParams, UpdateReminderRequest,
};

use crate::error::{ApiError, ApiJson, ApiPath, ApiQuery};
use crate::state::AppState;

pub async fn list_reminders(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ListRemindersParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (items, pagination) = state.reminders.get_reminders(params).await?;
    Ok(Json(ApiResponse::paged(items, pagination)))
}

pub async fn get_reminder(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let reminder = state.reminders.get_reminder_by_id(id).await?;
    Ok(Json(ApiResponse::ok(reminder)))
}

pub async fn create_reminder(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateReminderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let reminder = state.reminders.create_reminder(req).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(reminder))))
}

pub async fn update_reminder(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateReminderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let reminder = state.reminders.update_reminder(id, req).await?;
    Ok(Json(ApiResponse::ok(reminder)))
}

pub async fn delete_reminder(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.reminders.delete_reminder(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn snooze_reminder(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<SnoozeReminderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let reminder = state.reminders.snooze_reminder(id, req.minutes).await?;
    Ok(Json(ApiResponse::ok(reminder)))
}

pub async fn complete_reminder(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let reminder = state.reminders.mark_as_completed(id).await?;
    Ok(Json(ApiResponse::ok(reminder)))
}

pub async fn cancel_reminder(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let reminder = state.reminders.cancel_reminder(id).await?;
    Ok(Json(ApiResponse::ok(reminder)))
}

pub async fn upcoming_reminders(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<UpcomingRemindersParams>,
) -> Result<impl IntoResponse, ApiError> {
    let reminders = state.reminders.get_upcoming_reminders(params.hours).await?;
    Ok(Json(ApiResponse::ok(reminders)))
}

pub async fn overdue_reminders(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let reminders = state.reminders.get_overdue_reminders().await?;
    Ok(Json(ApiResponse::ok(reminders)))
}
