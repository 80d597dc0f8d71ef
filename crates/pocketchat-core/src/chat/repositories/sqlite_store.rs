use std::path::{Path, PathBuf};

use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use tracing::info;

use super::chat_store::{BoxFuture, ChatStore, SavedSession};
use super::error::{StoreError, StoreResult};
use crate::chat::models::{Attachment, ChatSession, Message, Role};

/// Migrations applied in order. Each entry is (version, sql).
/// To add a new migration: append a tuple with the next version number and
/// its SQL. Never edit or remove existing entries — existing databases
/// depend on them.
///
/// v1 uses the list-of-attachments model: `image` holds a JSON array of
/// base64 payloads, not a single scalar.
const MIGRATIONS: &[(i64, &str)] = &[(
    1,
    "CREATE TABLE IF NOT EXISTS chat_sessions (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        title      TEXT    NOT NULL,
        created_at TEXT    NOT NULL DEFAULT (datetime('now'))
    );
    CREATE TABLE IF NOT EXISTS messages (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        chat_session_id INTEGER NOT NULL REFERENCES chat_sessions (id) ON DELETE CASCADE,
        type            TEXT    NOT NULL CHECK (type IN ('user', 'assistant', 'system')),
        text            TEXT,
        image           TEXT,
        created_at      TEXT    NOT NULL DEFAULT (datetime('now'))
    );
    CREATE INDEX IF NOT EXISTS idx_messages_session
        ON messages (chat_session_id, id);",
)];

/// SQLite-backed chat store.
///
/// Messages are ordered by their autoincrement rowid, not by timestamp —
/// two appends in the same millisecond must still come back in append
/// order. `SqlitePool` is internally reference-counted and cheap to clone.
pub struct SqliteChatStore {
    pool: SqlitePool,
}

impl SqliteChatStore {
    /// Open (or create) the database at the platform-specific config path.
    pub async fn new() -> StoreResult<Self> {
        Self::open_at(&Self::db_path()?).await
    }

    /// Open (or create) the database at an explicit path.
    pub async fn open_at(db_path: &Path) -> StoreResult<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        info!(path = %db_path.display(), "Opened SQLite chat database");

        Ok(Self { pool })
    }

    /// Create the schema_version table if absent, then apply any pending
    /// migrations.
    async fn run_migrations(pool: &SqlitePool) -> StoreResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER NOT NULL
            )",
        )
        .execute(pool)
        .await?;

        // Seed version 0 if the table is empty (fresh database).
        sqlx::query("INSERT INTO schema_version (version) SELECT 0 WHERE NOT EXISTS (SELECT 1 FROM schema_version)")
            .execute(pool)
            .await?;

        let current: i64 = sqlx::query_scalar("SELECT version FROM schema_version")
            .fetch_one(pool)
            .await?;

        for (version, sql) in MIGRATIONS {
            if *version > current {
                info!(version, "Applying schema migration");
                // sqlx doesn't support multiple statements in a single query
                // call, so split on ';' and execute each statement
                // individually.
                for statement in sql.split(';') {
                    let trimmed = statement.trim();
                    if !trimmed.is_empty() {
                        sqlx::query(trimmed).execute(pool).await?;
                    }
                }
                sqlx::query("UPDATE schema_version SET version = ?")
                    .bind(version)
                    .execute(pool)
                    .await?;
            }
        }

        Ok(())
    }

    fn db_path() -> StoreResult<PathBuf> {
        dirs::config_dir()
            .ok_or_else(|| StoreError::Initialization {
                message: "Cannot find config directory".into(),
            })
            .map(|p| p.join("pocketchat").join("chat.db"))
    }
}

impl Clone for SqliteChatStore {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

/// Explicit row-to-message mapping; no hidden lazy loading.
fn message_from_row(row: &SqliteRow) -> StoreResult<Message> {
    let role_text: String = row.get("type");
    let role = Role::parse(&role_text).ok_or_else(|| StoreError::CorruptRow {
        message: format!("unknown message type '{role_text}'"),
    })?;

    let text: Option<String> = row.get("text");
    let image: Option<String> = row.get("image");
    let attachments: Vec<Attachment> = match image.as_deref() {
        Some(json) if !json.is_empty() => serde_json::from_str(json)?,
        _ => Vec::new(),
    };

    Ok(Message {
        id: Some(row.get("id")),
        local_id: uuid::Uuid::new_v4(),
        role,
        text: text.unwrap_or_default(),
        attachments,
        persisted: true,
    })
}

fn attachments_column(message: &Message) -> StoreResult<Option<String>> {
    if message.attachments.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::to_string(&message.attachments)?))
    }
}

impl ChatStore for SqliteChatStore {
    fn ensure_schema(&self) -> BoxFuture<'static, StoreResult<()>> {
        let pool = self.pool.clone();
        Box::pin(async move { Self::run_migrations(&pool).await })
    }

    fn list_sessions(&self) -> BoxFuture<'static, StoreResult<Vec<ChatSession>>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            // Session ids are monotonic, so id order is creation order and
            // immune to same-second timestamp ties.
            let rows = sqlx::query(
                "SELECT id, title, created_at
                 FROM chat_sessions
                 ORDER BY id DESC",
            )
            .fetch_all(&pool)
            .await?;

            Ok(rows
                .iter()
                .map(|row| ChatSession {
                    id: row.get("id"),
                    title: row.get("title"),
                    created_at: row.get("created_at"),
                })
                .collect())
        })
    }

    fn load_messages(&self, session_id: i64) -> BoxFuture<'static, StoreResult<Vec<Message>>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let rows = sqlx::query(
                "SELECT id, type, text, image
                 FROM messages
                 WHERE chat_session_id = ?
                 ORDER BY id ASC",
            )
            .bind(session_id)
            .fetch_all(&pool)
            .await?;

            rows.iter().map(message_from_row).collect()
        })
    }

    fn save_session(
        &self,
        title: &str,
        messages: &[Message],
    ) -> BoxFuture<'static, StoreResult<SavedSession>> {
        let pool = self.pool.clone();
        let title = title.to_string();
        let messages = messages.to_vec();
        Box::pin(async move {
            if title.trim().is_empty() {
                return Err(StoreError::EmptyTitle);
            }

            let created_at = Utc::now().to_rfc3339();
            let mut tx = pool.begin().await?;

            let session_id = sqlx::query(
                "INSERT INTO chat_sessions (title, created_at) VALUES (?, ?)",
            )
            .bind(&title)
            .bind(&created_at)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

            let mut message_ids = Vec::with_capacity(messages.len());
            for message in &messages {
                let image = attachments_column(message)?;
                let id = sqlx::query(
                    "INSERT INTO messages (chat_session_id, type, text, image, created_at)
                     VALUES (?, ?, ?, ?, ?)",
                )
                .bind(session_id)
                .bind(message.role.as_str())
                .bind(&message.text)
                .bind(image)
                .bind(&created_at)
                .execute(&mut *tx)
                .await?
                .last_insert_rowid();
                message_ids.push(id);
            }

            tx.commit().await?;

            info!(session_id, count = message_ids.len(), "Saved chat session");

            Ok(SavedSession {
                session_id,
                message_ids,
            })
        })
    }

    fn update_session(
        &self,
        session_id: i64,
        messages: &[Message],
    ) -> BoxFuture<'static, StoreResult<Vec<i64>>> {
        let pool = self.pool.clone();
        let pending: Vec<Message> = messages.iter().filter(|m| !m.persisted).cloned().collect();
        Box::pin(async move {
            if pending.is_empty() {
                return Ok(Vec::new());
            }

            let created_at = Utc::now().to_rfc3339();
            let mut tx = pool.begin().await?;

            let mut message_ids = Vec::with_capacity(pending.len());
            for message in &pending {
                let image = attachments_column(message)?;
                let id = sqlx::query(
                    "INSERT INTO messages (chat_session_id, type, text, image, created_at)
                     VALUES (?, ?, ?, ?, ?)",
                )
                .bind(session_id)
                .bind(message.role.as_str())
                .bind(&message.text)
                .bind(image)
                .bind(&created_at)
                .execute(&mut *tx)
                .await?
                .last_insert_rowid();
                message_ids.push(id);
            }

            tx.commit().await?;

            info!(session_id, appended = message_ids.len(), "Updated chat session");

            Ok(message_ids)
        })
    }

    fn delete_session(&self, session_id: i64) -> BoxFuture<'static, StoreResult<()>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            // Cascade is spelled out rather than left to the FK pragma so
            // the delete stays correct on connections opened without it.
            let mut tx = pool.begin().await?;

            sqlx::query("DELETE FROM messages WHERE chat_session_id = ?")
                .bind(session_id)
                .execute(&mut *tx)
                .await?;

            sqlx::query("DELETE FROM chat_sessions WHERE id = ?")
                .bind(session_id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            Ok(())
        })
    }
}
