//! SQLite-backed project store.
//!
//! The project aggregate is persisted as a single row: scalar columns plus
//! one JSON document column holding the page tree. Saving a project is one
//! `UPDATE`, so a merge is atomic with respect to concurrent readers.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

use crate::domain::{Page, Project};

/// Async-safe handle to the project store.
///
/// Wraps `ProjectStore` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, preventing synchronous SQLite
/// I/O from tying up async worker threads.
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<std::sync::Mutex<ProjectStore>>,
}

impl StoreHandle {
    pub fn new(store: ProjectStore) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(store)),
        }
    }

    /// Run a closure with access to the store on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&ProjectStore) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let store = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = store
                .lock()
                .map_err(|e| anyhow::anyhow!("Store lock poisoned: {}", e))?;
            f(&guard)
        })
        .await
        .context("Store task panicked")?
    }
}

pub struct ProjectStore {
    conn: Connection,
}

impl ProjectStore {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS projects (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    repository_url TEXT,
                    pages TEXT NOT NULL DEFAULT '[]',
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );
                ",
            )
            .context("Failed to run migrations")?;
        Ok(())
    }

    pub fn create_project(&self, name: &str, repository_url: Option<&str>) -> Result<Project> {
        let created_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO projects (name, repository_url, pages, created_at) VALUES (?1, ?2, '[]', ?3)",
                params![name, repository_url, created_at],
            )
            .context("Failed to insert project")?;
        let id = self.conn.last_insert_rowid();
        Ok(Project {
            id,
            name: name.to_string(),
            repository_url: repository_url.map(|s| s.to_string()),
            pages: Vec::new(),
            created_at,
        })
    }

    pub fn get_project(&self, id: i64) -> Result<Option<Project>> {
        self.conn
            .query_row(
                "SELECT id, name, repository_url, pages, created_at FROM projects WHERE id = ?1",
                params![id],
                row_to_project,
            )
            .optional()
            .context("Failed to query project")
    }

    pub fn list_projects(&self) -> Result<Vec<Project>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, repository_url, pages, created_at FROM projects ORDER BY id")?;
        let rows = stmt.query_map([], row_to_project)?;
        let mut projects = Vec::new();
        for row in rows {
            projects.push(row?);
        }
        Ok(projects)
    }

    /// Persist the full aggregate as a single write.
    pub fn save_project(&self, project: &Project) -> Result<()> {
        let pages =
            serde_json::to_string(&project.pages).context("Failed to serialize pages")?;
        let updated = self
            .conn
            .execute(
                "UPDATE projects SET name = ?1, repository_url = ?2, pages = ?3 WHERE id = ?4",
                params![project.name, project.repository_url, pages, project.id],
            )
            .context("Failed to save project")?;
        anyhow::ensure!(updated == 1, "Project {} not found", project.id);
        Ok(())
    }

    pub fn delete_project(&self, id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM projects WHERE id = ?1", params![id])
            .context("Failed to delete project")?;
        Ok(deleted == 1)
    }
}

fn row_to_project(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
    let pages_json: String = row.get(3)?;
    let pages: Vec<Page> = serde_json::from_str(&pages_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        repository_url: row.get(2)?,
        pages,
        created_at: row.get(4)?,
    })
}
