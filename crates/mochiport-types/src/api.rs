use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    ConversationMetadata, ConversationStatus, DraftMetadata, DraftStatus, DraftType, Message,
    MessageMetadata, MessageRole, Priority, ReminderMetadata, ReminderStatus, ReminderType,
};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

// -- Auth --

/// Bearer token claims. `sub` is the caller's user id as issued by the
/// identity provider; it is opaque to the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub exp: usize,
}

// -- Envelope --

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            pagination: None,
        }
    }

    pub fn paged(data: T, pagination: Pagination) -> Self {
        Self {
            success: true,
            data,
            pagination: Some(pagination),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

// -- Pagination --

/// Normalized page/limit pair. Page numbers start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        let page = page.filter(|p| *p > 0).unwrap_or(DEFAULT_PAGE);
        let limit = limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_LIMIT)
            .min(MAX_LIMIT);
        Self { page, limit }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of results plus the total row count before paging.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(req: PageRequest, total: u64) -> Self {
        let limit = u64::from(req.limit);
        let total_pages = total.div_ceil(limit);
        Self {
            page: req.page,
            limit: req.limit,
            total,
            total_pages,
            has_next: u64::from(req.page) < total_pages,
            has_prev: req.page > 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

// -- Conversations --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListConversationsParams {
    pub status: Option<ConversationStatus>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// A message supplied by the client; id and timestamp are assigned server-side.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub role: MessageRole,
    pub metadata: Option<MessageMetadata>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    pub title: Option<String>,
    pub status: Option<ConversationStatus>,
    pub metadata: Option<ConversationMetadata>,
    #[serde(default)]
    pub messages: Vec<NewMessage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateConversationRequest {
    pub title: Option<String>,
    pub status: Option<ConversationStatus>,
    pub metadata: Option<ConversationMetadata>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessagesParams {
    pub limit: Option<u32>,
}

// -- Drafts --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DraftSortField {
    CreatedAt,
    #[default]
    UpdatedAt,
    Title,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDraftsParams {
    pub status: Option<DraftStatus>,
    #[serde(rename = "type")]
    pub draft_type: Option<DraftType>,
    pub conversation_id: Option<Uuid>,
    pub search: Option<String>,
    pub sort_by: Option<DraftSortField>,
    pub sort_order: Option<SortOrder>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDraftRequest {
    pub title: Option<String>,
    #[serde(default)]
    pub content: String,
    pub conversation_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub draft_type: Option<DraftType>,
    pub status: Option<DraftStatus>,
    pub metadata: Option<DraftMetadata>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDraftRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub conversation_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub draft_type: Option<DraftType>,
    pub status: Option<DraftStatus>,
    pub metadata: Option<DraftMetadata>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoSaveDraftRequest {
    pub id: Option<Uuid>,
    pub title: Option<String>,
    #[serde(default)]
    pub content: String,
    pub conversation_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub draft_type: Option<DraftType>,
}

// -- Reminders --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReminderSortField {
    #[default]
    DueDate,
    CreatedAt,
    Priority,
    Title,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRemindersParams {
    pub status: Option<ReminderStatus>,
    pub priority: Option<Priority>,
    #[serde(rename = "type")]
    pub reminder_type: Option<ReminderType>,
    pub conversation_id: Option<Uuid>,
    pub due_before: Option<DateTime<Utc>>,
    pub due_after: Option<DateTime<Utc>>,
    pub search: Option<String>,
    pub sort_by: Option<ReminderSortField>,
    pub sort_order: Option<SortOrder>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReminderRequest {
    pub conversation_id: Option<Uuid>,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "scheduledAt")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(rename = "type")]
    pub reminder_type: Option<ReminderType>,
    pub priority: Option<Priority>,
    pub metadata: Option<ReminderMetadata>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReminderRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "scheduledAt")]
    pub due_date: Option<DateTime<Utc>>,
    pub status: Option<ReminderStatus>,
    #[serde(rename = "type")]
    pub reminder_type: Option<ReminderType>,
    pub priority: Option<Priority>,
    pub metadata: Option<ReminderMetadata>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SnoozeReminderRequest {
    pub minutes: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpcomingRemindersParams {
    pub hours: Option<u32>,
}

// -- Chat --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub conversation_id: Option<Uuid>,
    pub message: Option<String>,
    pub system_prompt: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub conversation_id: Uuid,
    pub user_message: Message,
    pub assistant_message: Message,
}

// -- Health --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
    pub database: ComponentHealth,
    pub ai_service: &'static str,
    pub realtime_clients: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentHealth {
    pub backend: &'static str,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
