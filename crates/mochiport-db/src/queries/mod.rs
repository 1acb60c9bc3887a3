//! SQLite implementations of the store traits, one file per entity.

mod conversations;
mod drafts;
mod reminders;

use anyhow::Result;
use rusqlite::Connection;
use rusqlite::types::Value;

/// Accumulates WHERE clauses with their positional `?` parameters.
#[derive(Default, Clone)]
pub(crate) struct SqlFilter {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl SqlFilter {
    pub fn eq(&mut self, column: &str, value: impl Into<Value>) {
        self.clauses.push(format!("{} = ?", column));
        self.params.push(value.into());
    }

    pub fn clause(&mut self, sql: impl Into<String>, params: impl IntoIterator<Item = Value>) {
        self.clauses.push(sql.into());
        self.params.extend(params);
    }

    /// Case-insensitive substring match on any of `columns`. NULL columns
    /// never match.
    pub fn contains_any(&mut self, columns: &[&str], term: &str) {
        let needle = term.to_lowercase();
        let parts: Vec<String> = columns
            .iter()
            .map(|c| format!("instr(fold_case({}), ?) > 0", c))
            .collect();
        self.clause(
            format!("({})", parts.join(" OR ")),
            columns.iter().map(|_| Value::Text(needle.clone())),
        );
    }

    pub fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    /// Parameters followed by LIMIT and OFFSET values.
    pub fn page_params(&self, limit: u32, offset: u64) -> Vec<Value> {
        let mut params = self.params.clone();
        params.push(Value::Integer(i64::from(limit)));
        params.push(Value::Integer(offset as i64));
        params
    }

    pub fn count(&self, conn: &Connection, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}{}", table, self.where_sql());
        let total: i64 = conn.query_row(
            &sql,
            rusqlite::params_from_iter(self.params.iter()),
            |row| row.get(0),
        )?;
        Ok(total as u64)
    }
}

/// Numbered placeholders `?1, ?2, ...` for an IN list.
pub(crate) fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ")
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_terms_are_folded() {
        let mut filter = SqlFilter::default();
        filter.eq("status", "draft".to_string());
        filter.contains_any(&["title", "content"], "ÉTÉ 50%");
        assert_eq!(
            filter.where_sql(),
            " WHERE status = ? AND (instr(fold_case(title), ?) > 0 OR instr(fold_case(content), ?) > 0)"
        );
        let params = filter.page_params(10, 20);
        assert_eq!(params.len(), 5);
        assert_eq!(params[1], Value::Text("été 50%".into()));
    }

    #[test]
    fn empty_filter_has_no_where() {
        assert_eq!(SqlFilter::default().where_sql(), "");
        assert_eq!(placeholders(3), "?1, ?2, ?3");
    }
}
