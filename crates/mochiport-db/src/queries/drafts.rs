use anyhow::Result;
use rusqlite::Row;
use uuid::Uuid;

use mochiport_types::api::{DraftSortField, Page, SortOrder};
use mochiport_types::models::Draft;

use super::{OptionalExt, SqlFilter};
use crate::Database;
use crate::models::{DraftRow, format_ts};
use crate::query::DraftQuery;
use crate::store::DraftStore;

const DRAFT_COLUMNS: &str =
    "id, conversation_id, title, content, status, type, metadata, created_at, updated_at";

impl DraftStore for Database {
    fn list_drafts(&self, query: &DraftQuery) -> Result<Page<Draft>> {
        let mut filter = SqlFilter::default();
        if let Some(status) = query.status {
            filter.eq("status", status.as_str().to_string());
        }
        if let Some(draft_type) = query.draft_type {
            filter.eq("type", draft_type.as_str().to_string());
        }
        if let Some(conversation_id) = query.conversation_id {
            filter.eq("conversation_id", conversation_id.to_string());
        }
        if let Some(term) = query.search_term() {
            filter.contains_any(&["title", "content"], term);
        }

        let column = match query.sort_by {
            DraftSortField::CreatedAt => "created_at",
            DraftSortField::UpdatedAt => "updated_at",
            DraftSortField::Title => "title",
        };
        let direction = match query.sort_order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };

        self.with_conn(|conn| {
            let total = filter.count(conn, "drafts")?;
            let sql = format!(
                "SELECT {} FROM drafts{} ORDER BY {} {}, id ASC LIMIT ? OFFSET ?",
                DRAFT_COLUMNS,
                filter.where_sql(),
                column,
                direction
            );
            let params = filter.page_params(query.page.limit, query.page.offset());
            let mut stmt = conn.prepare(&sql)?;
            let items = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), draft_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?
                .into_iter()
                .map(Draft::try_from)
                .collect::<Result<Vec<_>>>()?;
            Ok(Page { items, total })
        })
    }

    fn get_draft(&self, id: Uuid) -> Result<Option<Draft>> {
        let row = self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM drafts WHERE id = ?1", DRAFT_COLUMNS),
                [id.to_string()],
                draft_row,
            )
            .optional()
        })?;
        row.map(Draft::try_from).transpose()
    }

    fn insert_draft(&self, draft: &Draft) -> Result<()> {
        let metadata = serde_json::to_string(&draft.metadata)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO drafts (id, conversation_id, title, content, status, type, metadata, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    draft.id.to_string(),
                    draft.conversation_id.map(|id| id.to_string()),
                    draft.title,
                    draft.content,
                    draft.status.as_str(),
                    draft.draft_type.as_str(),
                    metadata,
                    format_ts(&draft.created_at),
                    format_ts(&draft.updated_at),
                ],
            )?;
            Ok(())
        })
    }

    fn update_draft(&self, draft: &Draft) -> Result<bool> {
        let metadata = serde_json::to_string(&draft.metadata)?;
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE drafts SET conversation_id = ?2, title = ?3, content = ?4, status = ?5,
                    type = ?6, metadata = ?7, updated_at = ?8
                 WHERE id = ?1",
                rusqlite::params![
                    draft.id.to_string(),
                    draft.conversation_id.map(|id| id.to_string()),
                    draft.title,
                    draft.content,
                    draft.status.as_str(),
                    draft.draft_type.as_str(),
                    metadata,
                    format_ts(&draft.updated_at),
                ],
            )?;
            Ok(changed > 0)
        })
    }

    fn delete_draft(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM drafts WHERE id = ?1", [id.to_string()])?;
            Ok(changed > 0)
        })
    }
}

fn draft_row(row: &Row<'_>) -> rusqlite::Result<DraftRow> {
    Ok(DraftRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        status: row.get(4)?,
        draft_type: row.get(5)?,
        metadata: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use mochiport_types::api::PageRequest;
    use mochiport_types::models::{
        Conversation, ConversationMetadata, ConversationStatus, DraftMetadata, DraftStatus,
        DraftType, timestamp_now,
    };

    use crate::store::ConversationStore;

    fn draft(title: &str, content: &str, offset_secs: i64) -> Draft {
        let ts = timestamp_now() + Duration::seconds(offset_secs);
        Draft {
            id: Uuid::new_v4(),
            conversation_id: None,
            title: title.to_string(),
            content: content.to_string(),
            status: DraftStatus::Draft,
            draft_type: DraftType::Note,
            metadata: DraftMetadata::default(),
            created_at: ts,
            updated_at: ts,
        }
    }

    #[test]
    fn crud_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        let mut d = draft("Release notes", "v1 ships", 0);
        db.insert_draft(&d).unwrap();
        assert_eq!(db.get_draft(d.id).unwrap().unwrap(), d);

        d.status = DraftStatus::Review;
        d.metadata.tags = vec!["release".into()];
        assert!(db.update_draft(&d).unwrap());
        assert_eq!(db.get_draft(d.id).unwrap().unwrap(), d);

        assert!(db.delete_draft(d.id).unwrap());
        assert!(db.get_draft(d.id).unwrap().is_none());
        assert!(!db.update_draft(&d).unwrap());
    }

    #[test]
    fn search_matches_title_or_content_and_sorts() {
        let db = Database::open_in_memory().unwrap();
        db.insert_draft(&draft("Budget", "numbers for Q3", 0)).unwrap();
        db.insert_draft(&draft("Agenda", "discuss budget", 1)).unwrap();
        db.insert_draft(&draft("Lunch", "tacos", 2)).unwrap();

        let query = DraftQuery {
            search: Some("budget".into()),
            sort_by: DraftSortField::Title,
            sort_order: SortOrder::Asc,
            page: PageRequest::default(),
            ..Default::default()
        };
        let page = db.list_drafts(&query).unwrap();
        let titles: Vec<_> = page.items.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["Agenda", "Budget"]);
        assert_eq!(page.total, 2);
    }

    #[test]
    fn deleting_conversation_unlinks_drafts() {
        let db = Database::open_in_memory().unwrap();
        let now = timestamp_now();
        let conversation = Conversation {
            id: Uuid::new_v4(),
            title: "Origin".into(),
            messages: vec![],
            status: ConversationStatus::Active,
            metadata: ConversationMetadata::default(),
            created_at: now,
            updated_at: now,
        };
        db.insert_conversation(&conversation).unwrap();

        let mut d = draft("Linked", "", 0);
        d.conversation_id = Some(conversation.id);
        db.insert_draft(&d).unwrap();

        db.delete_conversation(conversation.id).unwrap();
        let fetched = db.get_draft(d.id).unwrap().unwrap();
        assert_eq!(fetched.conversation_id, None);
    }
}
