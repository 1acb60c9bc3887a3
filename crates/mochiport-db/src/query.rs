//! List queries understood by every store. The SQLite store turns them into
//! WHERE/ORDER BY clauses; the memory store evaluates them directly, so the
//! `matches`/`compare` methods here define the reference semantics.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use mochiport_types::api::{DraftSortField, PageRequest, ReminderSortField, SortOrder};
use mochiport_types::models::{
    Conversation, ConversationStatus, Draft, DraftStatus, DraftType, Priority, Reminder,
    ReminderStatus, ReminderType,
};
use mochiport_types::text::contains_ignore_case;

/// Conversations are always returned most recently updated first.
#[derive(Debug, Clone, Default)]
pub struct ConversationQuery {
    pub status: Option<ConversationStatus>,
    pub search: Option<String>,
    pub page: PageRequest,
}

#[derive(Debug, Clone, Default)]
pub struct DraftQuery {
    pub status: Option<DraftStatus>,
    pub draft_type: Option<DraftType>,
    pub conversation_id: Option<Uuid>,
    pub search: Option<String>,
    pub sort_by: DraftSortField,
    pub sort_order: SortOrder,
    pub page: PageRequest,
}

#[derive(Debug, Clone)]
pub struct ReminderQuery {
    /// Empty means any status.
    pub statuses: Vec<ReminderStatus>,
    pub priority: Option<Priority>,
    pub reminder_type: Option<ReminderType>,
    pub conversation_id: Option<Uuid>,
    /// Inclusive bounds on `due_date`.
    pub due_after: Option<DateTime<Utc>>,
    pub due_before: Option<DateTime<Utc>>,
    /// Matches reminders already flagged overdue, or still open and due
    /// strictly before this instant.
    pub overdue_as_of: Option<DateTime<Utc>>,
    pub search: Option<String>,
    pub sort_by: ReminderSortField,
    pub sort_order: SortOrder,
    pub page: PageRequest,
}

impl Default for ReminderQuery {
    fn default() -> Self {
        Self {
            statuses: Vec::new(),
            priority: None,
            reminder_type: None,
            conversation_id: None,
            due_after: None,
            due_before: None,
            overdue_as_of: None,
            search: None,
            sort_by: ReminderSortField::DueDate,
            sort_order: SortOrder::Asc,
            page: PageRequest::default(),
        }
    }
}

fn search_term(search: &Option<String>) -> Option<&str> {
    search.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn directed(ordering: Ordering, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}

impl ConversationQuery {
    pub fn search_term(&self) -> Option<&str> {
        search_term(&self.search)
    }

    pub fn matches(&self, c: &Conversation) -> bool {
        if self.status.is_some_and(|s| s != c.status) {
            return false;
        }
        if let Some(term) = self.search_term() {
            if !contains_ignore_case(&c.title, term) {
                return false;
            }
        }
        true
    }

    pub fn compare(&self, a: &Conversation, b: &Conversation) -> Ordering {
        b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id))
    }
}

impl DraftQuery {
    pub fn search_term(&self) -> Option<&str> {
        search_term(&self.search)
    }

    pub fn matches(&self, d: &Draft) -> bool {
        if self.status.is_some_and(|s| s != d.status) {
            return false;
        }
        if self.draft_type.is_some_and(|t| t != d.draft_type) {
            return false;
        }
        if self.conversation_id.is_some() && self.conversation_id != d.conversation_id {
            return false;
        }
        if let Some(term) = self.search_term() {
            if !contains_ignore_case(&d.title, term) && !contains_ignore_case(&d.content, term) {
                return false;
            }
        }
        true
    }

    pub fn compare(&self, a: &Draft, b: &Draft) -> Ordering {
        let primary = match self.sort_by {
            DraftSortField::CreatedAt => a.created_at.cmp(&b.created_at),
            DraftSortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            DraftSortField::Title => a.title.cmp(&b.title),
        };
        directed(primary, self.sort_order).then_with(|| a.id.cmp(&b.id))
    }
}

impl ReminderQuery {
    pub fn search_term(&self) -> Option<&str> {
        search_term(&self.search)
    }

    pub fn matches(&self, r: &Reminder) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&r.status) {
            return false;
        }
        if self.priority.is_some_and(|p| p != r.priority) {
            return false;
        }
        if self.reminder_type.is_some_and(|t| t != r.reminder_type) {
            return false;
        }
        if self.conversation_id.is_some_and(|id| id != r.conversation_id) {
            return false;
        }
        if self.due_after.is_some_and(|t| r.due_date < t) {
            return false;
        }
        if self.due_before.is_some_and(|t| r.due_date > t) {
            return false;
        }
        if let Some(now) = self.overdue_as_of {
            let overdue = r.status == ReminderStatus::Overdue
                || (r.status.is_open() && r.due_date < now);
            if !overdue {
                return false;
            }
        }
        if let Some(term) = self.search_term() {
            let in_description = r
                .description
                .as_deref()
                .is_some_and(|d| contains_ignore_case(d, term));
            if !contains_ignore_case(&r.title, term) && !in_description {
                return false;
            }
        }
        true
    }

    pub fn compare(&self, a: &Reminder, b: &Reminder) -> Ordering {
        let primary = match self.sort_by {
            ReminderSortField::DueDate => a.due_date.cmp(&b.due_date),
            ReminderSortField::CreatedAt => a.created_at.cmp(&b.created_at),
            ReminderSortField::Priority => a.priority.rank().cmp(&b.priority.rank()),
            ReminderSortField::Title => a.title.cmp(&b.title),
        };
        directed(primary, self.sort_order).then_with(|| a.id.cmp(&b.id))
    }
}
