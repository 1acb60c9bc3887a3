use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};
use uuid::Uuid;

use mochiport_types::api::Page;
use mochiport_types::models::{Conversation, Message};

use super::{OptionalExt, SqlFilter, placeholders};
use crate::Database;
use crate::models::{ConversationRow, MessageRow, format_ts};
use crate::query::ConversationQuery;
use crate::store::ConversationStore;

const CONVERSATION_COLUMNS: &str = "id, title, status, metadata, created_at, updated_at";
const MESSAGE_COLUMNS: &str = "id, conversation_id, content, role, timestamp, metadata";

impl ConversationStore for Database {
    fn list_conversations(&self, query: &ConversationQuery) -> Result<Page<Conversation>> {
        let mut filter = SqlFilter::default();
        if let Some(status) = query.status {
            filter.eq("status", status.as_str().to_string());
        }
        if let Some(term) = query.search_term() {
            filter.contains_any(&["title"], term);
        }

        self.with_conn(|conn| {
            let total = filter.count(conn, "conversations")?;

            let sql = format!(
                "SELECT {} FROM conversations{} ORDER BY updated_at DESC, id ASC LIMIT ? OFFSET ?",
                CONVERSATION_COLUMNS,
                filter.where_sql()
            );
            let params = filter.page_params(query.page.limit, query.page.offset());
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), conversation_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            // Batch-load messages for the whole page (avoids N+1)
            let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
            let mut messages = query_messages_for(conn, &ids)?;

            let items = rows
                .into_iter()
                .map(|row| {
                    let msgs = messages.remove(&row.id).unwrap_or_default();
                    row.into_conversation(msgs)
                })
                .collect::<Result<Vec<_>>>()?;

            Ok(Page { items, total })
        })
    }

    fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>> {
        self.with_conn(|conn| {
            let id = id.to_string();
            let row = conn
                .query_row(
                    &format!("SELECT {} FROM conversations WHERE id = ?1", CONVERSATION_COLUMNS),
                    [&id],
                    conversation_row,
                )
                .optional()?;

            match row {
                Some(row) => {
                    let messages = query_messages(conn, &id, None)?;
                    Ok(Some(row.into_conversation(messages)?))
                }
                None => Ok(None),
            }
        })
    }

    fn insert_conversation(&self, conversation: &Conversation) -> Result<()> {
        let metadata = serde_json::to_string(&conversation.metadata)?;
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO conversations (id, title, status, metadata, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    conversation.id.to_string(),
                    conversation.title,
                    conversation.status.as_str(),
                    metadata,
                    format_ts(&conversation.created_at),
                    format_ts(&conversation.updated_at),
                ],
            )?;
            for message in &conversation.messages {
                insert_message(&tx, message)?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    fn update_conversation(&self, conversation: &Conversation) -> Result<bool> {
        let metadata = serde_json::to_string(&conversation.metadata)?;
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE conversations SET title = ?2, status = ?3, metadata = ?4, updated_at = ?5
                 WHERE id = ?1",
                rusqlite::params![
                    conversation.id.to_string(),
                    conversation.title,
                    conversation.status.as_str(),
                    metadata,
                    format_ts(&conversation.updated_at),
                ],
            )?;
            Ok(changed > 0)
        })
    }

    fn delete_conversation(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM conversations WHERE id = ?1", [id.to_string()])?;
            Ok(changed > 0)
        })
    }

    fn append_message(&self, message: &Message, touched_at: DateTime<Utc>) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let touched = tx.execute(
                "UPDATE conversations SET updated_at = ?2 WHERE id = ?1",
                rusqlite::params![message.conversation_id.to_string(), format_ts(&touched_at)],
            )?;
            if touched == 0 {
                return Ok(false);
            }
            insert_message(&tx, message)?;
            tx.commit()?;
            Ok(true)
        })
    }

    fn list_messages(&self, conversation_id: Uuid, limit: Option<u32>) -> Result<Vec<Message>> {
        self.with_conn(|conn| query_messages(conn, &conversation_id.to_string(), limit))
    }
}

fn conversation_row(row: &Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        title: row.get(1)?,
        status: row.get(2)?,
        metadata: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn message_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        content: row.get(2)?,
        role: row.get(3)?,
        timestamp: row.get(4)?,
        metadata: row.get(5)?,
    })
}

fn insert_message(conn: &Connection, message: &Message) -> Result<()> {
    let metadata = message
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    conn.execute(
        "INSERT INTO messages (id, conversation_id, content, role, timestamp, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            message.id.to_string(),
            message.conversation_id.to_string(),
            message.content,
            message.role.as_str(),
            format_ts(&message.timestamp),
            metadata,
        ],
    )?;
    Ok(())
}

/// Ties on `timestamp` fall back to insertion order (rowid).
fn query_messages(conn: &Connection, conversation_id: &str, limit: Option<u32>) -> Result<Vec<Message>> {
    let rows = match limit {
        Some(limit) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM messages WHERE conversation_id = ?1
                 ORDER BY timestamp DESC, rowid DESC LIMIT ?2",
                MESSAGE_COLUMNS
            ))?;
            let mut rows = stmt
                .query_map(rusqlite::params![conversation_id, limit], message_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.reverse();
            rows
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM messages WHERE conversation_id = ?1 ORDER BY timestamp, rowid",
                MESSAGE_COLUMNS
            ))?;
            stmt.query_map([conversation_id], message_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    rows.into_iter().map(Message::try_from).collect()
}

/// Messages for a set of conversations, grouped by conversation id.
fn query_messages_for(conn: &Connection, conversation_ids: &[String]) -> Result<HashMap<String, Vec<Message>>> {
    let mut grouped: HashMap<String, Vec<Message>> = HashMap::new();
    if conversation_ids.is_empty() {
        return Ok(grouped);
    }

    let sql = format!(
        "SELECT {} FROM messages WHERE conversation_id IN ({}) ORDER BY timestamp, rowid",
        MESSAGE_COLUMNS,
        placeholders(conversation_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(conversation_ids.iter()), message_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for row in rows {
        let key = row.conversation_id.clone();
        grouped.entry(key).or_default().push(Message::try_from(row)?);
    }
    Ok(grouped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use mochiport_types::api::PageRequest;
    use mochiport_types::models::{
        ConversationMetadata, ConversationStatus, MessageMetadata, MessageRole, timestamp_now,
    };

    fn conversation(title: &str, updated_offset_secs: i64) -> Conversation {
        let now = timestamp_now() + Duration::seconds(updated_offset_secs);
        Conversation {
            id: Uuid::new_v4(),
            title: title.to_string(),
            messages: vec![],
            status: ConversationStatus::Active,
            metadata: ConversationMetadata::default(),
            created_at: now,
            updated_at: now,
        }
    }

    fn message(conversation_id: Uuid, content: &str, offset_ms: i64) -> Message {
        Message {
            id: Uuid::new_v4(),
            conversation_id,
            content: content.to_string(),
            role: MessageRole::User,
            timestamp: timestamp_now() + Duration::milliseconds(offset_ms),
            metadata: None,
        }
    }

    #[test]
    fn insert_with_messages_and_fetch() {
        let db = Database::open_in_memory().unwrap();
        let mut c = conversation("Trip planning", 0);
        c.messages.push(message(c.id, "first", 0));
        let mut second = message(c.id, "second", 5);
        second.role = MessageRole::Assistant;
        second.metadata = Some(MessageMetadata {
            token_count: Some(42),
            ..Default::default()
        });
        c.messages.push(second);
        db.insert_conversation(&c).unwrap();

        let fetched = db.get_conversation(c.id).unwrap().unwrap();
        assert_eq!(fetched, c);
        assert!(db.get_conversation(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn list_orders_by_updated_desc_and_pages() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..5 {
            db.insert_conversation(&conversation(&format!("chat {}", i), i)).unwrap();
        }

        let query = ConversationQuery {
            page: PageRequest::new(Some(1), Some(2)),
            ..Default::default()
        };
        let page = db.list_conversations(&query).unwrap();
        assert_eq!(page.total, 5);
        let titles: Vec<_> = page.items.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["chat 4", "chat 3"]);

        let query = ConversationQuery {
            search: Some("CHAT 1".into()),
            ..Default::default()
        };
        let page = db.list_conversations(&query).unwrap();
        assert_eq!(page.total, 1);
    }

    #[test]
    fn append_message_touches_conversation() {
        let db = Database::open_in_memory().unwrap();
        let c = conversation("Notes", 0);
        db.insert_conversation(&c).unwrap();

        let later = c.updated_at + Duration::minutes(1);
        assert!(db.append_message(&message(c.id, "hello", 0), later).unwrap());
        let fetched = db.get_conversation(c.id).unwrap().unwrap();
        assert_eq!(fetched.updated_at, later);
        assert_eq!(fetched.messages.len(), 1);

        let orphan = message(Uuid::new_v4(), "lost", 0);
        assert!(!db.append_message(&orphan, later).unwrap());
    }

    #[test]
    fn list_messages_returns_latest_in_order() {
        let db = Database::open_in_memory().unwrap();
        let mut c = conversation("Long", 0);
        for i in 0..4 {
            c.messages.push(message(c.id, &format!("m{}", i), i));
        }
        db.insert_conversation(&c).unwrap();

        let last_two = db.list_messages(c.id, Some(2)).unwrap();
        let contents: Vec<_> = last_two.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3"]);
    }

    #[test]
    fn delete_cascades_messages() {
        let db = Database::open_in_memory().unwrap();
        let mut c = conversation("Gone", 0);
        c.messages.push(message(c.id, "bye", 0));
        db.insert_conversation(&c).unwrap();

        assert!(db.delete_conversation(c.id).unwrap());
        assert!(!db.delete_conversation(c.id).unwrap());
        assert!(db.list_messages(c.id, None).unwrap().is_empty());
    }
}
