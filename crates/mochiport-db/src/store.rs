use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use mochiport_types::api::Page;
use mochiport_types::models::{Conversation, Draft, Message, Reminder};

use crate::query::{ConversationQuery, DraftQuery, ReminderQuery};

/// Conversations and their messages.
///
/// Update and delete methods return `false` when no row matched, leaving the
/// "not found" decision to the caller.
pub trait ConversationStore {
    fn list_conversations(&self, query: &ConversationQuery) -> Result<Page<Conversation>>;

    fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>>;

    /// Inserts the conversation together with its initial messages, atomically.
    fn insert_conversation(&self, conversation: &Conversation) -> Result<()>;

    /// Persists title, status, metadata and `updated_at`. Messages are untouched.
    fn update_conversation(&self, conversation: &Conversation) -> Result<bool>;

    /// Messages, drafts and reminders follow the schema's foreign key rules.
    fn delete_conversation(&self, id: Uuid) -> Result<bool>;

    /// Appends a message and moves the owning conversation's `updated_at`
    /// to `touched_at`, in one transaction.
    fn append_message(&self, message: &Message, touched_at: DateTime<Utc>) -> Result<bool>;

    /// The most recent `limit` messages (all when `None`), oldest first.
    fn list_messages(&self, conversation_id: Uuid, limit: Option<u32>) -> Result<Vec<Message>>;
}

pub trait DraftStore {
    fn list_drafts(&self, query: &DraftQuery) -> Result<Page<Draft>>;

    fn get_draft(&self, id: Uuid) -> Result<Option<Draft>>;

    fn insert_draft(&self, draft: &Draft) -> Result<()>;

    fn update_draft(&self, draft: &Draft) -> Result<bool>;

    fn delete_draft(&self, id: Uuid) -> Result<bool>;
}

pub trait ReminderStore {
    fn list_reminders(&self, query: &ReminderQuery) -> Result<Page<Reminder>>;

    fn get_reminder(&self, id: Uuid) -> Result<Option<Reminder>>;

    fn insert_reminder(&self, reminder: &Reminder) -> Result<()>;

    fn update_reminder(&self, reminder: &Reminder) -> Result<bool>;

    fn delete_reminder(&self, id: Uuid) -> Result<bool>;

    /// Flips every pending or snoozed reminder due before `now` to overdue,
    /// stamping `updated_at = now`. Returns the reminders that changed.
    fn mark_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>>;
}

/// Everything the services need from persistence.
pub trait Store: ConversationStore + DraftStore + ReminderStore + Send + Sync {
    /// Short name reported by the health endpoint.
    fn backend(&self) -> &'static str;

    fn ping(&self) -> Result<()>;
}
