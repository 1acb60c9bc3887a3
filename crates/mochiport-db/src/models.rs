//! Database row types: these map directly to SQLite rows and are converted
//! into the shared domain models at the store boundary.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use uuid::Uuid;

use mochiport_types::models::{
    Conversation, Draft, Message, MessageMetadata, Reminder,
};

pub struct ConversationRow {
    pub id: String,
    pub title: String,
    pub status: String,
    pub metadata: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub content: String,
    pub role: String,
    pub timestamp: String,
    pub metadata: Option<String>,
}

pub struct DraftRow {
    pub id: String,
    pub conversation_id: Option<String>,
    pub title: String,
    pub content: String,
    pub status: String,
    pub draft_type: String,
    pub metadata: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct ReminderRow {
    pub id: String,
    pub conversation_id: String,
    pub title: String,
    pub description: Option<String>,
    pub due_date: String,
    pub status: String,
    pub reminder_type: String,
    pub priority: String,
    pub metadata: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Timestamps are stored as RFC 3339 with fixed millisecond precision so that
/// string comparison in SQL matches chronological order.
pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Rows written by hand through the sqlite shell use datetime('now').
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .with_context(|| format!("Corrupt timestamp '{}'", raw))
}

fn parse_id(raw: &str) -> Result<Uuid> {
    raw.parse().with_context(|| format!("Corrupt id '{}'", raw))
}

fn parse_enum<T>(raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(raw.parse::<T>()?)
}

fn parse_json<T: serde::de::DeserializeOwned>(raw: &str, what: &str) -> Result<T> {
    serde_json::from_str(raw).with_context(|| format!("Corrupt {} metadata", what))
}

impl ConversationRow {
    pub fn into_conversation(self, messages: Vec<Message>) -> Result<Conversation> {
        Ok(Conversation {
            id: parse_id(&self.id)?,
            title: self.title,
            messages,
            status: parse_enum(&self.status)?,
            metadata: parse_json(&self.metadata, "conversation")?,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

impl TryFrom<MessageRow> for Message {
    type Error = anyhow::Error;

    fn try_from(row: MessageRow) -> Result<Self> {
        let metadata = match row.metadata.as_deref() {
            Some(raw) => Some(parse_json::<MessageMetadata>(raw, "message")?),
            None => None,
        };
        Ok(Message {
            id: parse_id(&row.id)?,
            conversation_id: parse_id(&row.conversation_id)?,
            content: row.content,
            role: parse_enum(&row.role)?,
            timestamp: parse_ts(&row.timestamp)?,
            metadata,
        })
    }
}

impl TryFrom<DraftRow> for Draft {
    type Error = anyhow::Error;

    fn try_from(row: DraftRow) -> Result<Self> {
        Ok(Draft {
            id: parse_id(&row.id)?,
            conversation_id: row.conversation_id.as_deref().map(parse_id).transpose()?,
            title: row.title,
            content: row.content,
            status: parse_enum(&row.status)?,
            draft_type: parse_enum(&row.draft_type)?,
            metadata: parse_json(&row.metadata, "draft")?,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }
}

impl TryFrom<ReminderRow> for Reminder {
    type Error = anyhow::Error;

    fn try_from(row: ReminderRow) -> Result<Self> {
        Ok(Reminder {
            id: parse_id(&row.id)?,
            conversation_id: parse_id(&row.conversation_id)?,
            title: row.title,
            description: row.description,
            due_date: parse_ts(&row.due_date)?,
            status: parse_enum(&row.status)?,
            reminder_type: parse_enum(&row.reminder_type)?,
            priority: parse_enum(&row.priority)?,
            metadata: parse_json(&row.metadata, "reminder")?,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }
}
