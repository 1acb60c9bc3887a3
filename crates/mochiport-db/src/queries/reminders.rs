use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Value;
use uuid::Uuid;

use mochiport_types::api::{Page, ReminderSortField, SortOrder};
use mochiport_types::models::Reminder;

use super::{OptionalExt, SqlFilter};
use crate::Database;
use crate::models::{ReminderRow, format_ts};
use crate::query::ReminderQuery;
use crate::store::ReminderStore;

const REMINDER_COLUMNS: &str = "id, conversation_id, title, description, due_date, status, type, \
     priority, metadata, created_at, updated_at";

const PRIORITY_RANK: &str =
    "CASE priority WHEN 'low' THEN 0 WHEN 'medium' THEN 1 WHEN 'high' THEN 2 ELSE 3 END";

impl ReminderStore for Database {
    fn list_reminders(&self, query: &ReminderQuery) -> Result<Page<Reminder>> {
        let filter = reminder_filter(query);

        let order_expr = match query.sort_by {
            ReminderSortField::DueDate => "due_date",
            ReminderSortField::CreatedAt => "created_at",
            ReminderSortField::Priority => PRIORITY_RANK,
            ReminderSortField::Title => "title",
        };
        let direction = match query.sort_order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };

        self.with_conn(|conn| {
            let total = filter.count(conn, "reminders")?;
            let sql = format!(
                "SELECT {} FROM reminders{} ORDER BY {} {}, id ASC LIMIT ? OFFSET ?",
                REMINDER_COLUMNS,
                filter.where_sql(),
                order_expr,
                direction
            );
            let params = filter.page_params(query.page.limit, query.page.offset());
            let mut stmt = conn.prepare(&sql)?;
            let items = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), reminder_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?
                .into_iter()
                .map(Reminder::try_from)
                .collect::<Result<Vec<_>>>()?;
            Ok(Page { items, total })
        })
    }

    fn get_reminder(&self, id: Uuid) -> Result<Option<Reminder>> {
        let row = self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM reminders WHERE id = ?1", REMINDER_COLUMNS),
                [id.to_string()],
                reminder_row,
            )
            .optional()
        })?;
        row.map(Reminder::try_from).transpose()
    }

    fn insert_reminder(&self, reminder: &Reminder) -> Result<()> {
        let metadata = serde_json::to_string(&reminder.metadata)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO reminders (id, conversation_id, title, description, due_date, status, type,
                    priority, metadata, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                rusqlite::params![
                    reminder.id.to_string(),
                    reminder.conversation_id.to_string(),
                    reminder.title,
                    reminder.description,
                    format_ts(&reminder.due_date),
                    reminder.status.as_str(),
                    reminder.reminder_type.as_str(),
                    reminder.priority.as_str(),
                    metadata,
                    format_ts(&reminder.created_at),
                    format_ts(&reminder.updated_at),
                ],
            )?;
            Ok(())
        })
    }

    fn update_reminder(&self, reminder: &Reminder) -> Result<bool> {
        let metadata = serde_json::to_string(&reminder.metadata)?;
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE reminders SET title = ?2, description = ?3, due_date = ?4, status = ?5,
                    type = ?6, priority = ?7, metadata = ?8, updated_at = ?9
                 WHERE id = ?1",
                rusqlite::params![
                    reminder.id.to_string(),
                    reminder.title,
                    reminder.description,
                    format_ts(&reminder.due_date),
                    reminder.status.as_str(),
                    reminder.reminder_type.as_str(),
                    reminder.priority.as_str(),
                    metadata,
                    format_ts(&reminder.updated_at),
                ],
            )?;
            Ok(changed > 0)
        })
    }

    fn delete_reminder(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM reminders WHERE id = ?1", [id.to_string()])?;
            Ok(changed > 0)
        })
    }

    fn mark_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "UPDATE reminders SET status = 'overdue', updated_at = ?1
                 WHERE status IN ('pending', 'snoozed') AND due_date < ?1
                 RETURNING {}",
                REMINDER_COLUMNS
            ))?;
            let rows = stmt
                .query_map([format_ts(&now)], reminder_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(Reminder::try_from).collect()
        })
    }
}

fn reminder_filter(query: &ReminderQuery) -> SqlFilter {
    let mut filter = SqlFilter::default();
    if !query.statuses.is_empty() {
        let marks = vec!["?"; query.statuses.len()].join(", ");
        filter.clause(
            format!("status IN ({})", marks),
            query
                .statuses
                .iter()
                .map(|s| Value::Text(s.as_str().to_string())),
        );
    }
    if let Some(priority) = query.priority {
        filter.eq("priority", priority.as_str().to_string());
    }
    if let Some(reminder_type) = query.reminder_type {
        filter.eq("type", reminder_type.as_str().to_string());
    }
    if let Some(conversation_id) = query.conversation_id {
        filter.eq("conversation_id", conversation_id.to_string());
    }
    if let Some(after) = query.due_after {
        filter.clause("due_date >= ?", [Value::Text(format_ts(&after))]);
    }
    if let Some(before) = query.due_before {
        filter.clause("due_date <= ?", [Value::Text(format_ts(&before))]);
    }
    if let Some(now) = query.overdue_as_of {
        filter.clause(
            "(status = 'overdue' OR (status IN ('pending', 'snoozed') AND due_date < ?))",
            [Value::Text(format_ts(&now))],
        );
    }
    if let Some(term) = query.search_term() {
        filter.contains_any(&["title", "description"], term);
    }
    filter
}

fn reminder_row(row: &Row<'_>) -> rusqlite::Result<ReminderRow> {
    Ok(ReminderRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        due_date: row.get(4)?,
        status: row.get(5)?,
        reminder_type: row.get(6)?,
        priority: row.get(7)?,
        metadata: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}
