//! SQLite-backed document records.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::models::DocumentRecord;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    file_name TEXT NOT NULL,
    file_path TEXT NOT NULL,
    content TEXT NOT NULL,
    file_type TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_documents_user ON documents (user_id, created_at DESC);
";

const COLUMNS: &str = "id, user_id, file_name, file_path, content, file_type, created_at";

/// Fields for a document row that has not been written yet.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub user_id: String,
    pub file_name: String,
    pub file_path: String,
    pub content: String,
    pub file_type: String,
}

#[derive(Clone)]
pub struct DocumentStore {
    conn: Arc<Mutex<Connection>>,
}

impl DocumentStore {
    pub fn open(path: &Path) -> AppResult<Self> {
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "Opened document database");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> AppResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> AppResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` against the connection on the blocking pool.
    async fn call<T, F>(&self, f: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> AppResult<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| AppError::internal("database connection lock poisoned"))?;
            f(&guard)
        })
        .await?
    }

    pub async fn insert(&self, doc: NewDocument) -> AppResult<DocumentRecord> {
        self.call(move |conn| {
            let created_at = Utc::now();
            conn.execute(
                "INSERT INTO documents (user_id, file_name, file_path, content, file_type, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    doc.user_id,
                    doc.file_name,
                    doc.file_path,
                    doc.content,
                    doc.file_type,
                    created_at
                ],
            )?;
            let id = conn.last_insert_rowid();
            debug!(document_id = id, user_id = %doc.user_id, "Inserted document");

            Ok(DocumentRecord {
                id,
                user_id: doc.user_id,
                file_name: doc.file_name,
                file_path: doc.file_path,
                content: doc.content,
                file_type: doc.file_type,
                created_at,
            })
        })
        .await
    }

    /// Newest first.
    pub async fn list_for_user(&self, user_id: &str) -> AppResult<Vec<DocumentRecord>> {
        let user_id = user_id.to_string();
        self.call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM documents WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
                COLUMNS
            ))?;
            let rows = stmt.query_map(params![user_id], map_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    /// The document, if it exists and belongs to `user_id`.
    pub async fn find_for_user(&self, id: i64, user_id: &str) -> AppResult<Option<DocumentRecord>> {
        let user_id = user_id.to_string();
        self.call(move |conn| {
            let record = conn
                .query_row(
                    &format!("SELECT {} FROM documents WHERE id = ?1 AND user_id = ?2", COLUMNS),
                    params![id, user_id],
                    map_row,
                )
                .optional()?;
            Ok(record)
        })
        .await
    }

    /// Removes and returns the row, or `None` when nothing matched.
    pub async fn delete_for_user(&self, id: i64, user_id: &str) -> AppResult<Option<DocumentRecord>> {
        let user_id = user_id.to_string();
        self.call(move |conn| {
            let record = conn
                .query_row(
                    &format!("SELECT {} FROM documents WHERE id = ?1 AND user_id = ?2", COLUMNS),
                    params![id, user_id],
                    map_row,
                )
                .optional()?;
            if record.is_some() {
                conn.execute(
                    "DELETE FROM documents WHERE id = ?1 AND user_id = ?2",
                    params![id, user_id],
                )?;
            }
            Ok(record)
        })
        .await
    }

    pub async fn ping(&self) -> AppResult<()> {
        self.call(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<DocumentRecord> {
    Ok(DocumentRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        file_name: row.get(2)?,
        file_path: row.get(3)?,
        content: row.get(4)?,
        file_type: row.get(5)?,
        created_at: row.get(6)?,
    })
}
