use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    Conversation, ConversationStatus, Draft, DraftStatus, Message, Reminder, ReminderStatus,
};

/// Change events pushed over the realtime gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RealtimeEvent {
    /// Sent once after the socket is accepted
    Ready { connection_id: Uuid },

    /// A conversation was created or its title/status/metadata changed
    ConversationUpdated {
        conversation_id: Uuid,
        title: String,
        status: ConversationStatus,
        updated_at: DateTime<Utc>,
    },

    ConversationDeleted { conversation_id: Uuid },

    /// A message was appended to a conversation
    MessageCreated { message: Message },

    DraftChanged {
        draft_id: Uuid,
        conversation_id: Option<Uuid>,
        status: DraftStatus,
        updated_at: DateTime<Utc>,
    },

    DraftDeleted {
        draft_id: Uuid,
        conversation_id: Option<Uuid>,
    },

    ReminderChanged {
        reminder_id: Uuid,
        conversation_id: Uuid,
        status: ReminderStatus,
        due_date: DateTime<Utc>,
    },

    ReminderDeleted {
        reminder_id: Uuid,
        conversation_id: Uuid,
    },
}

impl RealtimeEvent {
    /// Returns the conversation this event is scoped to.
    /// Events that return `None` are delivered to every client.
    pub fn conversation_id(&self) -> Option<Uuid> {
        match self {
            Self::Ready { .. } => None,
            Self::ConversationUpdated { conversation_id, .. } => Some(*conversation_id),
            Self::ConversationDeleted { conversation_id } => Some(*conversation_id),
            Self::MessageCreated { message } => Some(message.conversation_id),
            Self::DraftChanged { conversation_id, .. } => *conversation_id,
            Self::DraftDeleted { conversation_id, .. } => *conversation_id,
            Self::ReminderChanged { conversation_id, .. } => Some(*conversation_id),
            Self::ReminderDeleted { conversation_id, .. } => Some(*conversation_id),
        }
    }

    pub fn conversation_updated(conversation: &Conversation) -> Self {
        Self::ConversationUpdated {
            conversation_id: conversation.id,
            title: conversation.title.clone(),
            status: conversation.status,
            updated_at: conversation.updated_at,
        }
    }

    pub fn draft_changed(draft: &Draft) -> Self {
        Self::DraftChanged {
            draft_id: draft.id,
            conversation_id: draft.conversation_id,
            status: draft.status,
            updated_at: draft.updated_at,
        }
    }

    pub fn reminder_changed(reminder: &Reminder) -> Self {
        Self::ReminderChanged {
            reminder_id: reminder.id,
            conversation_id: reminder.conversation_id,
            status: reminder.status,
            due_date: reminder.due_date,
        }
    }
}

/// Commands sent FROM client TO server over the realtime socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RealtimeCommand {
    /// Replace the set of conversations this connection listens to
    Subscribe { conversation_ids: Vec<Uuid> },

    /// Stop listening to the given conversations
    Unsubscribe { conversation_ids: Vec<Uuid> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_command_wire_format() {
        let id = Uuid::new_v4();
        let text = format!(r#"{{"type":"Subscribe","data":{{"conversation_ids":["{id}"]}}}}"#);
        match serde_json::from_str::<RealtimeCommand>(&text).unwrap() {
            RealtimeCommand::Subscribe { conversation_ids } => assert_eq!(conversation_ids, vec![id]),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn unlinked_draft_events_are_global() {
        let event = RealtimeEvent::DraftDeleted {
            draft_id: Uuid::new_v4(),
            conversation_id: None,
        };
        assert_eq!(event.conversation_id(), None);

        let conversation_id = Uuid::new_v4();
        let event = RealtimeEvent::ConversationDeleted { conversation_id };
        assert_eq!(event.conversation_id(), Some(conversation_id));
    }
}
