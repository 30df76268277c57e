//! `SQLite` store: connection pool and embedded schema.
//!
//! The schema is applied on every open with `CREATE ... IF NOT EXISTS`, so
//! opening an existing store is a no-op. Timestamps are TEXT in the
//! fixed-width format produced by `foreman_core::format_timestamp`.

use std::{path::Path, str::FromStr, time::Duration};

use foreman_core::{Error, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};

/// Current schema version, recorded in `schema_version`.
pub const SCHEMA_VERSION: i64 = 1;

/// How long a writer waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Pool size for on-disk stores.
const MAX_CONNECTIONS: u32 = 8;

/// Database schema as SQL string - executed once on open
pub(crate) const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS epics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS features (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    epic_id INTEGER NOT NULL REFERENCES epics(id) ON DELETE CASCADE,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS agents (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    role TEXT NOT NULL,
    skill_level TEXT NOT NULL CHECK(skill_level IN ('junior', 'senior', 'principal')),
    connection_mode TEXT NOT NULL CHECK(connection_mode IN ('mcp', 'http', 'cli')),
    registered_at TEXT NOT NULL,
    last_seen TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_agents_project_role ON agents(project_id, role);

CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    feature_id INTEGER NOT NULL REFERENCES features(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    target_role TEXT NOT NULL,
    target_skill TEXT NOT NULL CHECK(target_skill IN ('junior', 'senior', 'principal')),
    difficulty INTEGER NOT NULL CHECK(difficulty BETWEEN 1 AND 5),
    complexity TEXT NOT NULL CHECK(complexity IN ('minor', 'major')),
    status TEXT NOT NULL CHECK(status IN (
        'created', 'under_work', 'dev_done', 'qa_done', 'documentation_done', 'committed'
    )),
    locked_by TEXT,
    locked_at TEXT,
    assigned_to TEXT,
    branch_name TEXT,
    created_by TEXT NOT NULL,
    notes TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tasks_selectable
    ON tasks(project_id, status, target_role, created_at, id);
CREATE INDEX IF NOT EXISTS idx_tasks_updated ON tasks(project_id, updated_at);

-- One under_work task per agent, whatever the application layer does.
CREATE UNIQUE INDEX IF NOT EXISTS idx_tasks_one_active_per_agent
    ON tasks(locked_by) WHERE status = 'under_work';

CREATE TABLE IF NOT EXISTS task_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
    from_status TEXT NOT NULL,
    to_status TEXT NOT NULL,
    agent_id TEXT NOT NULL,
    notes TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_task_history_task ON task_history(task_id, id);

CREATE TABLE IF NOT EXISTS task_comments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    author_id TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_task_comments_task ON task_comments(task_id, id);

CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    doc_type TEXT NOT NULL CHECK(doc_type IN (
        'note', 'specification', 'guideline', 'report', 'handoff'
    )),
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    author_id TEXT NOT NULL,
    mentions TEXT NOT NULL DEFAULT '[]',
    expires_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_updated ON documents(project_id, updated_at);

CREATE TABLE IF NOT EXISTS mentions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    source_kind TEXT NOT NULL CHECK(source_kind IN ('document', 'comment')),
    source_id INTEGER NOT NULL,
    target_agent TEXT NOT NULL,
    author_id TEXT NOT NULL,
    read INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(source_kind, source_id, target_agent)
);

CREATE INDEX IF NOT EXISTS idx_mentions_target ON mentions(target_agent, read);
CREATE INDEX IF NOT EXISTS idx_mentions_updated ON mentions(project_id, updated_at);

CREATE TABLE IF NOT EXISTS services (
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    ping_url TEXT NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}',
    registered_at TEXT NOT NULL,
    last_heartbeat TEXT NOT NULL,
    PRIMARY KEY (project_id, name)
);
";

/// Handle to the coordination store.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a store at `path`.
    ///
    /// # Errors
    ///
    /// Returns `Error::DatabaseError` if the file cannot be opened or the
    /// schema cannot be applied.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::IoError(format!(
                    "Failed to create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .min_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| Error::DatabaseError(format!("Failed to connect to database: {e}")))?;

        Self::from_pool(pool).await
    }

    /// Open a private in-memory store.
    ///
    /// The pool is pinned to a single connection that never expires: every
    /// `SQLite` in-memory connection is its own database.
    ///
    /// # Errors
    ///
    /// Returns `Error::DatabaseError` if the schema cannot be applied.
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| Error::DatabaseError(e.to_string()))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| Error::DatabaseError(format!("Failed to open in-memory database: {e}")))?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self> {
        init_schema(&pool).await?;
        Ok(Self { pool })
    }

    /// Get the database pool
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Schema version recorded in the store.
    ///
    /// # Errors
    ///
    /// Returns `Error::DatabaseError` if the version table cannot be read.
    pub async fn schema_version(&self) -> Result<i64> {
        let (version,): (i64,) = sqlx::query_as("SELECT MAX(version) FROM schema_version")
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(version)
    }
}

/// Initialize database schema
async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| Error::DatabaseError(format!("Failed to initialize schema: {e}")))?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?, ?)")
        .bind(SCHEMA_VERSION)
        .bind(foreman_core::format_timestamp(chrono::Utc::now()))
        .execute(pool)
        .await
        .map(|_| ())
        .map_err(|e| Error::DatabaseError(format!("Failed to record schema version: {e}")))
}

/// Map a driver error into the core taxonomy.
pub(crate) fn db_error(e: sqlx::Error) -> Error {
    Error::DatabaseError(e.to_string())
}

/// True if the driver rejected a write on a UNIQUE index.
pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}
