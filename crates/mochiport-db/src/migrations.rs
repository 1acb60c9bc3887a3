use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE conversations (
                id          TEXT PRIMARY KEY,
                title       TEXT NOT NULL,
                status      TEXT NOT NULL DEFAULT 'active',
                metadata    TEXT NOT NULL DEFAULT '{}',
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE INDEX idx_conversations_updated
                ON conversations(updated_at);

            CREATE TABLE messages (
                id              TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                content         TEXT NOT NULL,
                role            TEXT NOT NULL,
                timestamp       TEXT NOT NULL,
                metadata        TEXT
            );

            CREATE INDEX idx_messages_conversation
                ON messages(conversation_id, timestamp);

            CREATE TABLE drafts (
                id              TEXT PRIMARY KEY,
                conversation_id TEXT REFERENCES conversations(id) ON DELETE SET NULL,
                title           TEXT NOT NULL,
                content         TEXT NOT NULL DEFAULT '',
                status          TEXT NOT NULL DEFAULT 'draft',
                type            TEXT NOT NULL DEFAULT 'note',
                metadata        TEXT NOT NULL DEFAULT '{}',
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE INDEX idx_drafts_conversation
                ON drafts(conversation_id);

            CREATE TABLE reminders (
                id              TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                title           TEXT NOT NULL,
                description     TEXT,
                due_date        TEXT NOT NULL,
                status          TEXT NOT NULL DEFAULT 'pending',
                type            TEXT NOT NULL DEFAULT 'follow-up',
                priority        TEXT NOT NULL DEFAULT 'medium',
                metadata        TEXT NOT NULL DEFAULT '{}',
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE INDEX idx_reminders_due
                ON reminders(status, due_date);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
