use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use mochiport_db::{DraftQuery, Store};
use mochiport_gateway::dispatcher::Dispatcher;
use mochiport_types::api::{
    AutoSaveDraftRequest, CreateDraftRequest, ListDraftsParams, PageRequest, Pagination,
    UpdateDraftRequest,
};
use mochiport_types::events::RealtimeEvent;
use mochiport_types::models::{Draft, DraftMetadata, DraftStatus, MessageRole, timestamp_now};
use mochiport_types::text::{normalize_tags, word_count};
use mochiport_types::validation::{self, ValidationError};

use super::conversations::ConversationService;
use super::run_blocking;
use crate::error::ApiError;

const UNTITLED_DRAFT: &str = "Untitled draft";

#[derive(Clone)]
pub struct DraftService {
    store: Arc<dyn Store>,
    dispatcher: Dispatcher,
    conversations: ConversationService,
}

impl DraftService {
    pub fn new(store: Arc<dyn Store>, dispatcher: Dispatcher, conversations: ConversationService) -> Self {
        Self {
            store,
            dispatcher,
            conversations,
        }
    }

    pub async fn get_drafts(&self, params: ListDraftsParams) -> Result<(Vec<Draft>, Pagination), ApiError> {
        let query = DraftQuery {
            status: params.status,
            draft_type: params.draft_type,
            conversation_id: params.conversation_id,
            search: params.search,
            sort_by: params.sort_by.unwrap_or_default(),
            sort_order: params.sort_order.unwrap_or_default(),
            page: PageRequest::new(params.page, params.limit),
        };
        let page_req = query.page;
        let page = run_blocking(&self.store, move |s| s.list_drafts(&query)).await?;
        Ok((page.items, Pagination::new(page_req, page.total)))
    }

    pub async fn get_draft_by_id(&self, id: Uuid) -> Result<Draft, ApiError> {
        run_blocking(&self.store, move |s| s.get_draft(id))
            .await?
            .ok_or(ApiError::NotFound("Draft"))
    }

    pub async fn create_draft(&self, req: CreateDraftRequest) -> Result<Draft, ApiError> {
        let title = validation::required_title(req.title.as_deref())?;
        validation::draft_content(&req.content)?;
        let status = req.status.unwrap_or_default();
        reject_direct_publish(status)?;
        self.ensure_conversation(req.conversation_id).await?;

        let now = timestamp_now();
        let mut metadata = req.metadata.unwrap_or_default();
        metadata.tags = normalize_tags(&metadata.tags);
        metadata.word_count = word_count(&req.content);
        metadata.auto_saved = false;
        metadata.last_auto_saved_at = None;
        metadata.published_at = None;

        let draft = Draft {
            id: Uuid::new_v4(),
            conversation_id: req.conversation_id,
            title,
            content: req.content,
            status,
            draft_type: req.draft_type.unwrap_or_default(),
            metadata,
            created_at: now,
            updated_at: now,
        };
        self.insert(draft).await
    }

    pub async fn update_draft(&self, id: Uuid, req: UpdateDraftRequest) -> Result<Draft, ApiError> {
        let title = validation::optional_title(req.title.as_deref())?;
        if let Some(content) = &req.content {
            validation::draft_content(content)?;
        }
        let mut draft = self.get_draft_by_id(id).await?;

        if let Some(status) = req.status {
            if status != draft.status {
                reject_direct_publish(status)?;
                if draft.status == DraftStatus::Published && status != DraftStatus::Archived {
                    return Err(ValidationError::new("A published draft can only be archived").into());
                }
                draft.status = status;
            }
        }
        if req.conversation_id.is_some() && req.conversation_id != draft.conversation_id {
            self.ensure_conversation(req.conversation_id).await?;
            draft.conversation_id = req.conversation_id;
        }
        if let Some(title) = title {
            draft.title = title;
        }
        if let Some(content) = req.content {
            draft.content = content;
        }
        if let Some(draft_type) = req.draft_type {
            draft.draft_type = draft_type;
        }
        if let Some(metadata) = req.metadata {
            draft.metadata.tags = normalize_tags(&metadata.tags);
        }
        draft.metadata.word_count = word_count(&draft.content);
        draft.updated_at = timestamp_now();

        self.save(draft).await
    }

    pub async fn delete_draft(&self, id: Uuid) -> Result<(), ApiError> {
        let draft = self.get_draft_by_id(id).await?;
        let deleted = run_blocking(&self.store, move |s| s.delete_draft(id)).await?;
        if !deleted {
            return Err(ApiError::NotFound("Draft"));
        }
        self.dispatcher.publish(RealtimeEvent::DraftDeleted {
            draft_id: id,
            conversation_id: draft.conversation_id,
        });
        Ok(())
    }

    /// Mark a draft published. A linked conversation receives the draft
    /// content as a user message.
    pub async fn publish_draft(&self, id: Uuid) -> Result<Draft, ApiError> {
        let mut draft = self.get_draft_by_id(id).await?;
        if draft.status == DraftStatus::Published || draft.metadata.published_at.is_some() {
            return Err(ValidationError::new("Draft is already published").into());
        }
        if let Some(conversation_id) = draft.conversation_id {
            if !self.conversations.exists(conversation_id).await? {
                return Err(ApiError::NotFound("Conversation"));
            }
        }

        let now = timestamp_now();
        draft.status = DraftStatus::Published;
        draft.metadata.published_at = Some(now);
        draft.updated_at = now;
        let draft = self.save(draft).await?;

        if let Some(conversation_id) = draft.conversation_id {
            let content = draft.content.trim();
            if !content.is_empty() {
                self.conversations
                    .append(conversation_id, MessageRole::User, content.to_string(), None)
                    .await?;
            }
        }

        info!("Draft {} published", id);
        Ok(draft)
    }

    pub async fn archive_draft(&self, id: Uuid) -> Result<Draft, ApiError> {
        let mut draft = self.get_draft_by_id(id).await?;
        if draft.status == DraftStatus::Archived {
            return Ok(draft);
        }
        draft.status = DraftStatus::Archived;
        draft.updated_at = timestamp_now();
        self.save(draft).await
    }

    /// Create or update from the editor's periodic save. An empty title
    /// falls back to a placeholder instead of failing.
    pub async fn auto_save_draft(&self, req: AutoSaveDraftRequest) -> Result<Draft, ApiError> {
        validation::draft_content(&req.content)?;
        let title = match req.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) => Some(validation::required_title(Some(t))?),
            None => None,
        };
        let now = timestamp_now();

        let Some(id) = req.id else {
            self.ensure_conversation(req.conversation_id).await?;
            let draft = Draft {
                id: Uuid::new_v4(),
                conversation_id: req.conversation_id,
                title: title.unwrap_or_else(|| UNTITLED_DRAFT.to_string()),
                metadata: DraftMetadata {
                    word_count: word_count(&req.content),
                    auto_saved: true,
                    last_auto_saved_at: Some(now),
                    ..Default::default()
                },
                content: req.content,
                status: DraftStatus::Draft,
                draft_type: req.draft_type.unwrap_or_default(),
                created_at: now,
                updated_at: now,
            };
            return self.insert(draft).await;
        };

        let mut draft = self.get_draft_by_id(id).await?;
        if req.conversation_id.is_some() && req.conversation_id != draft.conversation_id {
            self.ensure_conversation(req.conversation_id).await?;
            draft.conversation_id = req.conversation_id;
        }
        if let Some(title) = title {
            draft.title = title;
        }
        if let Some(draft_type) = req.draft_type {
            draft.draft_type = draft_type;
        }
        draft.content = req.content;
        draft.metadata.word_count = word_count(&draft.content);
        draft.metadata.auto_saved = true;
        draft.metadata.last_auto_saved_at = Some(now);
        draft.updated_at = now;

        self.save(draft).await
    }

    async fn ensure_conversation(&self, conversation_id: Option<Uuid>) -> Result<(), ApiError> {
        let Some(id) = conversation_id else {
            return Ok(());
        };
        if !self.conversations.exists(id).await? {
            return Err(ApiError::NotFound("Conversation"));
        }
        Ok(())
    }

    async fn insert(&self, draft: Draft) -> Result<Draft, ApiError> {
        let record = draft.clone();
        run_blocking(&self.store, move |s| s.insert_draft(&record)).await?;
        info!("Draft {} created", draft.id);
        self.dispatcher.publish(RealtimeEvent::draft_changed(&draft));
        Ok(draft)
    }

    async fn save(&self, draft: Draft) -> Result<Draft, ApiError> {
        let record = draft.clone();
        let updated = run_blocking(&self.store, move |s| s.update_draft(&record)).await?;
        if !updated {
            return Err(ApiError::NotFound("Draft"));
        }
        self.dispatcher.publish(RealtimeEvent::draft_changed(&draft));
        Ok(draft)
    }
}

fn reject_direct_publish(status: DraftStatus) -> Result<(), ValidationError> {
    if status == DraftStatus::Published {
        return Err(ValidationError::new("Use the publish action to publish a draft"));
    }
    Ok(())
}
