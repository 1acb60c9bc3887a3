//! In-memory store used with `USE_MOCK_DATABASE` and in tests. Each instance
//! owns its own data; nothing is shared between instances.
//!
//! Locks are always taken in the order conversations, drafts, reminders.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use mochiport_types::api::{Page, PageRequest};
use mochiport_types::models::{Conversation, Draft, Message, Reminder, ReminderStatus};

use crate::query::{ConversationQuery, DraftQuery, ReminderQuery};
use crate::store::{ConversationStore, DraftStore, ReminderStore, Store};

#[derive(Default)]
pub struct MemoryStore {
    conversations: RwLock<Vec<Conversation>>,
    drafts: RwLock<Vec<Draft>>,
    reminders: RwLock<Vec<Reminder>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|e| anyhow!("Memory store lock poisoned: {}", e))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|e| anyhow!("Memory store lock poisoned: {}", e))
}

fn paginate<T>(items: Vec<T>, page: PageRequest) -> Page<T> {
    let total = items.len() as u64;
    let items = items
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit as usize)
        .collect();
    Page { items, total }
}

/// Replace the element with the same id; `false` when there is none.
fn replace_by_id<T: Clone>(items: &mut [T], id: impl Fn(&T) -> Uuid, value: &T) -> bool {
    let target = id(value);
    match items.iter_mut().find(|item| id(&**item) == target) {
        Some(slot) => {
            *slot = value.clone();
            true
        }
        None => false,
    }
}

fn remove_by_id<T>(items: &mut Vec<T>, id: impl Fn(&T) -> Uuid, target: Uuid) -> bool {
    let before = items.len();
    items.retain(|item| id(item) != target);
    items.len() != before
}

impl ConversationStore for MemoryStore {
    fn list_conversations(&self, query: &ConversationQuery) -> Result<Page<Conversation>> {
        let conversations = read(&self.conversations)?;
        let mut matched: Vec<Conversation> = conversations
            .iter()
            .filter(|c| query.matches(c))
            .cloned()
            .collect();
        matched.sort_by(|a, b| query.compare(a, b));
        Ok(paginate(matched, query.page))
    }

    fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>> {
        let conversations = read(&self.conversations)?;
        Ok(conversations.iter().find(|c| c.id == id).cloned())
    }

    fn insert_conversation(&self, conversation: &Conversation) -> Result<()> {
        let mut conversations = write(&self.conversations)?;
        if conversations.iter().any(|c| c.id == conversation.id) {
            return Err(anyhow!("Conversation {} already exists", conversation.id));
        }
        conversations.push(conversation.clone());
        Ok(())
    }

    fn update_conversation(&self, conversation: &Conversation) -> Result<bool> {
        let mut conversations = write(&self.conversations)?;
        let Some(existing) = conversations.iter_mut().find(|c| c.id == conversation.id) else {
            return Ok(false);
        };
        existing.title = conversation.title.clone();
        existing.status = conversation.status;
        existing.metadata = conversation.metadata.clone();
        existing.updated_at = conversation.updated_at;
        Ok(true)
    }

    fn delete_conversation(&self, id: Uuid) -> Result<bool> {
        let mut conversations = write(&self.conversations)?;
        if !remove_by_id(&mut *conversations, |c| c.id, id) {
            return Ok(false);
        }

        // Same foreign key rules as the SQL schema.
        let mut drafts = write(&self.drafts)?;
        for draft in drafts.iter_mut().filter(|d| d.conversation_id == Some(id)) {
            draft.conversation_id = None;
        }
        let mut reminders = write(&self.reminders)?;
        reminders.retain(|r| r.conversation_id != id);
        Ok(true)
    }

    fn append_message(&self, message: &Message, touched_at: DateTime<Utc>) -> Result<bool> {
        let mut conversations = write(&self.conversations)?;
        let Some(conversation) = conversations
            .iter_mut()
            .find(|c| c.id == message.conversation_id)
        else {
            return Ok(false);
        };
        conversation.messages.push(message.clone());
        conversation.updated_at = touched_at;
        Ok(true)
    }

    fn list_messages(&self, conversation_id: Uuid, limit: Option<u32>) -> Result<Vec<Message>> {
        let conversations = read(&self.conversations)?;
        let Some(conversation) = conversations.iter().find(|c| c.id == conversation_id) else {
            return Ok(Vec::new());
        };
        let messages = &conversation.messages;
        let skip = match limit {
            Some(limit) => messages.len().saturating_sub(limit as usize),
            None => 0,
        };
        Ok(messages[skip..].to_vec())
    }
}

impl DraftStore for MemoryStore {
    fn list_drafts(&self, query: &DraftQuery) -> Result<Page<Draft>> {
        let drafts = read(&self.drafts)?;
        let mut matched: Vec<Draft> = drafts.iter().filter(|d| query.matches(d)).cloned().collect();
        matched.sort_by(|a, b| query.compare(a, b));
        Ok(paginate(matched, query.page))
    }

    fn get_draft(&self, id: Uuid) -> Result<Option<Draft>> {
        let drafts = read(&self.drafts)?;
        Ok(drafts.iter().find(|d| d.id == id).cloned())
    }

    fn insert_draft(&self, draft: &Draft) -> Result<()> {
        let mut drafts = write(&self.drafts)?;
        if drafts.iter().any(|d| d.id == draft.id) {
            return Err(anyhow!("Draft {} already exists", draft.id));
        }
        drafts.push(draft.clone());
        Ok(())
    }

    fn update_draft(&self, draft: &Draft) -> Result<bool> {
        let mut drafts = write(&self.drafts)?;
        Ok(replace_by_id(&mut *drafts, |d| d.id, draft))
    }

    fn delete_draft(&self, id: Uuid) -> Result<bool> {
        let mut drafts = write(&self.drafts)?;
        Ok(remove_by_id(&mut *drafts, |d| d.id, id))
    }
}

impl ReminderStore for MemoryStore {
    fn list_reminders(&self, query: &ReminderQuery) -> Result<Page<Reminder>> {
        let reminders = read(&self.reminders)?;
        let mut matched: Vec<Reminder> = reminders
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        matched.sort_by(|a, b| query.compare(a, b));
        Ok(paginate(matched, query.page))
    }

    fn get_reminder(&self, id: Uuid) -> Result<Option<Reminder>> {
        let reminders = read(&self.reminders)?;
        Ok(reminders.iter().find(|r| r.id == id).cloned())
    }

    fn insert_reminder(&self, reminder: &Reminder) -> Result<()> {
        let mut reminders = write(&self.reminders)?;
        if reminders.iter().any(|r| r.id == reminder.id) {
            return Err(anyhow!("Reminder {} already exists", reminder.id));
        }
        reminders.push(reminder.clone());
        Ok(())
    }

    fn update_reminder(&self, reminder: &Reminder) -> Result<bool> {
        let mut reminders = write(&self.reminders)?;
        Ok(replace_by_id(&mut *reminders, |r| r.id, reminder))
    }

    fn delete_reminder(&self, id: Uuid) -> Result<bool> {
        let mut reminders = write(&self.reminders)?;
        Ok(remove_by_id(&mut *reminders, |r| r.id, id))
    }

    fn mark_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
        let mut reminders = write(&self.reminders)?;
        let mut changed = Vec::new();
        for reminder in reminders
            .iter_mut()
            .filter(|r| r.status.is_open() && r.due_date < now)
        {
            reminder.status = ReminderStatus::Overdue;
            reminder.updated_at = now;
            changed.push(reminder.clone());
        }
        Ok(changed)
    }
}

impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn ping(&self) -> Result<()> {
        read(&self.conversations).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    //! The memory store must agree with SQLite on filtering, ordering and
    //! paging, so these tests run the same operations against both.

    use super::*;
    use crate::Database;
    use chrono::Duration;
    use mochiport_types::api::{DraftSortField, ReminderSortField, SortOrder};
    use mochiport_types::models::{
        ConversationMetadata, ConversationStatus, DraftMetadata, DraftStatus, DraftType,
        MessageRole, Priority, ReminderMetadata, ReminderType, timestamp_now,
    };

    fn stores() -> Vec<Box<dyn Store>> {
        vec![
            Box::new(MemoryStore::new()),
            Box::new(Database::open_in_memory().unwrap()),
        ]
    }

    fn conversation(title: &str, status: ConversationStatus, offset_secs: i64) -> Conversation {
        let ts = timestamp_now() + Duration::seconds(offset_secs);
        Conversation {
            id: Uuid::new_v4(),
            title: title.to_string(),
            messages: vec![],
            status,
            metadata: ConversationMetadata::default(),
            created_at: ts,
            updated_at: ts,
        }
    }

    #[test]
    fn conversation_listing_agrees() {
        let fixtures = vec![
            conversation("Alpha plan", ConversationStatus::Active, 1),
            conversation("Beta plan", ConversationStatus::Archived, 2),
            conversation("Gamma", ConversationStatus::Active, 3),
            conversation("Delta plan", ConversationStatus::Active, 4),
        ];
        let query = ConversationQuery {
            status: Some(ConversationStatus::Active),
            search: Some(" PLAN ".into()),
            page: PageRequest::new(Some(1), Some(1)),
        };

        let results: Vec<Page<Conversation>> = stores()
            .iter()
            .map(|store| {
                for c in &fixtures {
                    store.insert_conversation(c).unwrap();
                }
                store.list_conversations(&query).unwrap()
            })
            .collect();

        assert_eq!(results[0], results[1]);
        assert_eq!(results[0].total, 2);
        assert_eq!(results[0].items[0].title, "Delta plan");
    }

    #[test]
    fn search_folds_non_ascii_case() {
        let fixtures = vec![
            conversation("Été planning", ConversationStatus::Active, 1),
            conversation("ÜBER review", ConversationStatus::Active, 2),
            conversation("ete without accents", ConversationStatus::Active, 3),
        ];

        for store in stores() {
            for c in &fixtures {
                store.insert_conversation(c).unwrap();
            }
            for (term, expected) in [("été", "Été planning"), ("über", "ÜBER review")] {
                let page = store
                    .list_conversations(&ConversationQuery {
                        search: Some(term.into()),
                        ..Default::default()
                    })
                    .unwrap();
                assert_eq!(page.total, 1, "{} search for {}", store.backend(), term);
                assert_eq!(page.items[0].title, expected);
            }
        }
    }

    #[test]
    fn draft_listing_agrees() {
        let conversation = conversation("Home", ConversationStatus::Active, 0);
        let ts = timestamp_now();
        let fixtures: Vec<Draft> = ["b", "a", "c"]
            .iter()
            .enumerate()
            .map(|(i, title)| Draft {
                id: Uuid::new_v4(),
                conversation_id: (i != 2).then_some(conversation.id),
                title: title.to_string(),
                content: "body".into(),
                status: DraftStatus::Draft,
                draft_type: DraftType::Email,
                metadata: DraftMetadata::default(),
                created_at: ts,
                updated_at: ts + Duration::seconds(i as i64),
            })
            .collect();
        let query = DraftQuery {
            conversation_id: Some(conversation.id),
            draft_type: Some(DraftType::Email),
            sort_by: DraftSortField::Title,
            sort_order: SortOrder::Desc,
            ..Default::default()
        };

        let results: Vec<Page<Draft>> = stores()
            .iter()
            .map(|store| {
                store.insert_conversation(&conversation).unwrap();
                for d in &fixtures {
                    store.insert_draft(d).unwrap();
                }
                store.list_drafts(&query).unwrap()
            })
            .collect();

        assert_eq!(results[0], results[1]);
        let titles: Vec<_> = results[0].items.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["b", "a"]);
    }

    #[test]
    fn reminder_listing_agrees() {
        let conversation = conversation("Owner", ConversationStatus::Active, 0);
        let now = timestamp_now();
        let make = |title: &str, mins: i64, status: ReminderStatus, priority: Priority| Reminder {
            id: Uuid::new_v4(),
            conversation_id: conversation.id,
            title: title.to_string(),
            description: Some(format!("about {}", title)),
            due_date: now + Duration::minutes(mins),
            status,
            reminder_type: ReminderType::FollowUp,
            priority,
            metadata: ReminderMetadata::default(),
            created_at: now,
            updated_at: now,
        };
        let fixtures = vec![
            make("call", 30, ReminderStatus::Pending, Priority::High),
            make("email", 90, ReminderStatus::Snoozed, Priority::Low),
            make("late", -10, ReminderStatus::Pending, Priority::Urgent),
            make("done", 20, ReminderStatus::Completed, Priority::Urgent),
            make("far", 60 * 48, ReminderStatus::Pending, Priority::Medium),
        ];

        let upcoming = ReminderQuery {
            statuses: vec![ReminderStatus::Pending, ReminderStatus::Snoozed],
            due_after: Some(now),
            due_before: Some(now + Duration::hours(24)),
            ..Default::default()
        };
        let by_priority = ReminderQuery {
            search: Some("ABOUT".into()),
            sort_by: ReminderSortField::Priority,
            sort_order: SortOrder::Desc,
            page: PageRequest::new(Some(1), Some(3)),
            ..Default::default()
        };

        let results: Vec<(Page<Reminder>, Page<Reminder>)> = stores()
            .iter()
            .map(|store| {
                store.insert_conversation(&conversation).unwrap();
                for r in &fixtures {
                    store.insert_reminder(r).unwrap();
                }
                (
                    store.list_reminders(&upcoming).unwrap(),
                    store.list_reminders(&by_priority).unwrap(),
                )
            })
            .collect();

        assert_eq!(results[0], results[1]);
        let titles: Vec<_> = results[0].0.items.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["call", "email"]);
        assert_eq!(results[0].1.total, 5);
        assert_eq!(results[0].1.items[2].title, "call");
    }

    #[test]
    fn deleting_conversation_follows_foreign_keys() {
        for store in stores() {
            let c = conversation("Parent", ConversationStatus::Active, 0);
            store.insert_conversation(&c).unwrap();
            let message = Message {
                id: Uuid::new_v4(),
                conversation_id: c.id,
                content: "hi".into(),
                role: MessageRole::User,
                timestamp: timestamp_now(),
                metadata: None,
            };
            assert!(store.append_message(&message, timestamp_now()).unwrap());

            let now = timestamp_now();
            let reminder = Reminder {
                id: Uuid::new_v4(),
                conversation_id: c.id,
                title: "ping".into(),
                description: None,
                due_date: now + Duration::hours(1),
                status: ReminderStatus::Pending,
                reminder_type: ReminderType::Task,
                priority: Priority::Medium,
                metadata: ReminderMetadata::default(),
                created_at: now,
                updated_at: now,
            };
            store.insert_reminder(&reminder).unwrap();

            assert!(store.delete_conversation(c.id).unwrap());
            assert!(store.get_reminder(reminder.id).unwrap().is_none());
            assert!(store.list_messages(c.id, None).unwrap().is_empty());
            store.ping().unwrap();
        }
    }
}
