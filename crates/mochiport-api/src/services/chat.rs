use std::sync::Arc;

use tracing::{info, warn};

use mochiport_types::api::{ChatRequest, ChatResponse, CreateConversationRequest, NewMessage};
use mochiport_types::models::{MessageMetadata, MessageRole};
use mochiport_types::text::truncate_chars;
use mochiport_types::validation;

use super::conversations::ConversationService;
use crate::ai::{AiService, ChatTurn};
use crate::error::ApiError;

/// Characters of the opening message used as a new conversation's title.
const TITLE_CHARS: usize = 50;
/// Most recent messages sent to the model as context.
const HISTORY_LIMIT: u32 = 50;

#[derive(Clone)]
pub struct ChatService {
    conversations: ConversationService,
    ai: Arc<dyn AiService>,
    system_prompt: String,
}

impl ChatService {
    pub fn new(conversations: ConversationService, ai: Arc<dyn AiService>, system_prompt: String) -> Self {
        Self {
            conversations,
            ai,
            system_prompt,
        }
    }

    pub async fn send(&self, req: ChatRequest) -> Result<ChatResponse, ApiError> {
        let content = validation::message_content(req.message.as_deref().unwrap_or_default())?;

        let (conversation_id, user_message) = match req.conversation_id {
            Some(id) => {
                let message = self
                    .conversations
                    .append(id, MessageRole::User, content, None)
                    .await?;
                (id, message)
            }
            None => {
                let conversation = self
                    .conversations
                    .create_conversation(CreateConversationRequest {
                        title: Some(truncate_chars(&content, TITLE_CHARS)),
                        messages: vec![NewMessage {
                            content,
                            role: MessageRole::User,
                            metadata: None,
                        }],
                        ..Default::default()
                    })
                    .await?;
                let message = conversation
                    .messages
                    .into_iter()
                    .next()
                    .ok_or_else(|| ApiError::Store(anyhow::anyhow!("new conversation has no messages")))?;
                info!("Chat started conversation {}", conversation.id);
                (conversation.id, message)
            }
        };

        let history = self
            .conversations
            .get_messages(conversation_id, Some(HISTORY_LIMIT))
            .await?;
        let prompt = req
            .system_prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(self.system_prompt.as_str());
        let turns = build_turns(prompt, history.into_iter().map(|m| ChatTurn::new(m.role, m.content)));

        let reply = self.ai.complete(&turns).await.map_err(|e| {
            warn!("{} completion failed for {}: {:#}", self.ai.name(), conversation_id, e);
            ApiError::Ai(e.to_string())
        })?;

        let assistant_message = self
            .conversations
            .append(
                conversation_id,
                MessageRole::Assistant,
                reply.content,
                Some(MessageMetadata {
                    token_count: reply.token_count,
                    confidence: None,
                    model: Some(reply.model),
                }),
            )
            .await?;

        Ok(ChatResponse {
            conversation_id,
            user_message,
            assistant_message,
        })
    }
}

/// System prompt first (when non-empty), then the conversation in order.
fn build_turns(system_prompt: &str, history: impl Iterator<Item = ChatTurn>) -> Vec<ChatTurn> {
    let mut turns = Vec::new();
    if !system_prompt.trim().is_empty() {
        turns.push(ChatTurn::new(MessageRole::System, system_prompt.trim()));
    }
    turns.extend(history);
    turns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing;
    use uuid::Uuid;

    #[test]
    fn system_prompt_goes_first() {
        let turns = build_turns("be brief", [ChatTurn::new(MessageRole::User, "hi")].into_iter());
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, MessageRole::System);

        let turns = build_turns("  ", [ChatTurn::new(MessageRole::User, "hi")].into_iter());
        assert_eq!(turns.len(), 1);
    }

    #[tokio::test]
    async fn starts_conversation_from_first_message() {
        let state = testing::state();
        let long = "Please help me plan the quarterly review meeting with the whole design team";
        let resp = state
            .chat
            .send(ChatRequest {
                message: Some(long.into()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(resp.user_message.content, long);
        assert_eq!(resp.assistant_message.role, MessageRole::Assistant);
        let metadata = resp.assistant_message.metadata.unwrap();
        assert_eq!(metadata.model.as_deref(), Some("mock"));
        assert!(metadata.token_count.is_some());

        let conversation = state.conversations.get_conversation_by_id(resp.conversation_id).await.unwrap();
        assert_eq!(conversation.title, truncate_chars(long, 50));
        assert_eq!(conversation.messages.len(), 2);
    }

    #[tokio::test]
    async fn continues_existing_conversation() {
        let state = testing::state();
        let first = state
            .chat
            .send(ChatRequest {
                message: Some("hello".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        let second = state
            .chat
            .send(ChatRequest {
                conversation_id: Some(first.conversation_id),
                message: Some("and again".into()),
                system_prompt: Some("custom".into()),
            })
            .await
            .unwrap();
        assert_eq!(second.conversation_id, first.conversation_id);
        assert!(second.assistant_message.content.contains("and again"));

        let messages = state.conversations.get_messages(first.conversation_id, None).await.unwrap();
        assert_eq!(messages.len(), 4);
    }

    #[tokio::test]
    async fn rejects_empty_and_unknown() {
        let state = testing::state();
        assert!(matches!(
            state.chat.send(ChatRequest::default()).await,
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            state
                .chat
                .send(ChatRequest {
                    conversation_id: Some(Uuid::new_v4()),
                    message: Some("hi".into()),
                    system_prompt: None,
                })
                .await,
            Err(ApiError::NotFound("Conversation"))
        ));
    }
}
