use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use mochiport_db::{ConversationQuery, Store};
use mochiport_gateway::dispatcher::Dispatcher;
use mochiport_types::api::{
    CreateConversationRequest, ListConversationsParams, NewMessage, PageRequest, Pagination,
    UpdateConversationRequest,
};
use mochiport_types::events::RealtimeEvent;
use mochiport_types::models::{
    Conversation, ConversationMetadata, Message, MessageMetadata, MessageRole, timestamp_now,
};
use mochiport_types::text::normalize_tags;
use mochiport_types::validation;

use super::run_blocking;
use crate::error::ApiError;

#[derive(Clone)]
pub struct ConversationService {
    store: Arc<dyn Store>,
    dispatcher: Dispatcher,
}

impl ConversationService {
    pub fn new(store: Arc<dyn Store>, dispatcher: Dispatcher) -> Self {
        Self { store, dispatcher }
    }

    pub async fn get_conversations(
        &self,
        params: ListConversationsParams,
    ) -> Result<(Vec<Conversation>, Pagination), ApiError> {
        let query = ConversationQuery {
            status: params.status,
            search: params.search,
            page: PageRequest::new(params.page, params.limit),
        };
        let page_req = query.page;
        let page = run_blocking(&self.store, move |s| s.list_conversations(&query)).await?;
        Ok((page.items, Pagination::new(page_req, page.total)))
    }

    pub async fn get_conversation_by_id(&self, id: Uuid) -> Result<Conversation, ApiError> {
        run_blocking(&self.store, move |s| s.get_conversation(id))
            .await?
            .ok_or(ApiError::NotFound("Conversation"))
    }

    pub async fn create_conversation(
        &self,
        req: CreateConversationRequest,
    ) -> Result<Conversation, ApiError> {
        let title = validation::required_title(req.title.as_deref())?;
        let id = Uuid::new_v4();
        let now = timestamp_now();

        let messages = req
            .messages
            .into_iter()
            .map(|m| build_message(id, m, now))
            .collect::<Result<Vec<_>, ApiError>>()?;

        let conversation = Conversation {
            id,
            title,
            messages,
            status: req.status.unwrap_or_default(),
            metadata: normalize_metadata(req.metadata.unwrap_or_default()),
            created_at: now,
            updated_at: now,
        };

        let record = conversation.clone();
        run_blocking(&self.store, move |s| s.insert_conversation(&record)).await?;

        info!("Conversation {} created with {} messages", id, conversation.messages.len());
        self.dispatcher.publish(RealtimeEvent::conversation_updated(&conversation));
        for message in &conversation.messages {
            self.dispatcher.publish(RealtimeEvent::MessageCreated {
                message: message.clone(),
            });
        }
        Ok(conversation)
    }

    pub async fn update_conversation(
        &self,
        id: Uuid,
        req: UpdateConversationRequest,
    ) -> Result<Conversation, ApiError> {
        let title = validation::optional_title(req.title.as_deref())?;
        let mut conversation = self.get_conversation_by_id(id).await?;

        if let Some(title) = title {
            conversation.title = title;
        }
        if let Some(status) = req.status {
            conversation.status = status;
        }
        if let Some(metadata) = req.metadata {
            conversation.metadata = normalize_metadata(metadata);
        }
        conversation.updated_at = timestamp_now();

        let record = conversation.clone();
        let updated = run_blocking(&self.store, move |s| s.update_conversation(&record)).await?;
        if !updated {
            return Err(ApiError::NotFound("Conversation"));
        }

        self.dispatcher.publish(RealtimeEvent::conversation_updated(&conversation));
        Ok(conversation)
    }

    pub async fn delete_conversation(&self, id: Uuid) -> Result<(), ApiError> {
        let deleted = run_blocking(&self.store, move |s| s.delete_conversation(id)).await?;
        if !deleted {
            return Err(ApiError::NotFound("Conversation"));
        }
        info!("Conversation {} deleted", id);
        self.dispatcher.publish(RealtimeEvent::ConversationDeleted { conversation_id: id });
        Ok(())
    }

    /// Append a client-supplied message and return the updated conversation.
    pub async fn add_message(&self, id: Uuid, req: NewMessage) -> Result<Conversation, ApiError> {
        let content = validation::message_content(&req.content)?;
        self.append(id, req.role, content, req.metadata).await?;
        self.get_conversation_by_id(id).await
    }

    pub async fn get_messages(&self, id: Uuid, limit: Option<u32>) -> Result<Vec<Message>, ApiError> {
        let (exists, messages) = run_blocking(&self.store, move |s| {
            if s.get_conversation(id)?.is_none() {
                return Ok((false, Vec::new()));
            }
            Ok((true, s.list_messages(id, limit)?))
        })
        .await?;
        if !exists {
            return Err(ApiError::NotFound("Conversation"));
        }
        Ok(messages)
    }

    /// Store an already validated message and touch the conversation.
    pub(crate) async fn append(
        &self,
        conversation_id: Uuid,
        role: MessageRole,
        content: String,
        metadata: Option<MessageMetadata>,
    ) -> Result<Message, ApiError> {
        let now = timestamp_now();
        let message = Message {
            id: Uuid::new_v4(),
            conversation_id,
            content,
            role,
            timestamp: now,
            metadata,
        };

        let record = message.clone();
        let appended = run_blocking(&self.store, move |s| s.append_message(&record, now)).await?;
        if !appended {
            return Err(ApiError::NotFound("Conversation"));
        }

        self.dispatcher.publish(RealtimeEvent::MessageCreated {
            message: message.clone(),
        });
        Ok(message)
    }

    pub(crate) async fn exists(&self, id: Uuid) -> Result<bool, ApiError> {
        let found = run_blocking(&self.store, move |s| s.get_conversation(id)).await?;
        Ok(found.is_some())
    }
}

fn build_message(
    conversation_id: Uuid,
    new: NewMessage,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<Message, ApiError> {
    Ok(Message {
        id: Uuid::new_v4(),
        conversation_id,
        content: validation::message_content(&new.content)?,
        role: new.role,
        timestamp: now,
        metadata: new.metadata,
    })
}

fn normalize_metadata(mut metadata: ConversationMetadata) -> ConversationMetadata {
    metadata.tags = normalize_tags(&metadata.tags);
    metadata.category = metadata
        .category
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    metadata
}
