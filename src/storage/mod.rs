//! Durable session log and small key/value caches
//!
//! [`SqliteStorage`] owns every piece of persisted state: the ordered
//! session log, event-label project assignments and the remote API token
//! history. Each call opens its own connection and every mutating call runs
//! in a single `IMMEDIATE` transaction, so the reconciliation tickers and the
//! command surface can interleave without ever observing two open sessions.

use crate::error::{AutoclockError, Result};
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod types;
pub use types::{AuthToken, NewSession, ProjectAssignment, Session};

/// How long a writer waits for a competing transaction before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SESSION_COLUMNS: &str =
    "id, project_id, description, started_at, completed_at, auto_completed, ticket_ref";

fn storage_error(context: &str, err: impl std::fmt::Display) -> AutoclockError {
    AutoclockError::Storage(format!("{}: {}", context, err))
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .ok_or_else(|| storage_error("Invalid stored timestamp", ms).into())
}

/// A session row before timestamp conversion.
struct SessionRow {
    id: String,
    project_id: Option<String>,
    description: String,
    started_at: i64,
    completed_at: Option<i64>,
    auto_completed: bool,
    ticket_ref: Option<String>,
}

impl SessionRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            project_id: row.get(1)?,
            description: row.get(2)?,
            started_at: row.get(3)?,
            completed_at: row.get(4)?,
            auto_completed: row.get(5)?,
            ticket_ref: row.get(6)?,
        })
    }

    fn into_session(self) -> Result<Session> {
        Ok(Session {
            id: self.id,
            project_id: self.project_id,
            description: self.description,
            started_at: from_millis(self.started_at)?,
            completed_at: self.completed_at.map(from_millis).transpose()?,
            auto_completed: self.auto_completed,
            ticket_ref: self.ticket_ref,
        })
    }
}

/// Storage backend for the session log
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    db_path: PathBuf,
}

impl SqliteStorage {
    /// Create a new storage instance
    ///
    /// Uses `AUTOCLOCK_DB` when set, otherwise `sessions.db` in the user's
    /// data directory.
    pub fn new() -> Result<Self> {
        if let Ok(override_path) = std::env::var("AUTOCLOCK_DB") {
            return Self::new_with_path(override_path);
        }

        let proj_dirs = ProjectDirs::from("dev", "autoclock", "autoclock")
            .ok_or_else(|| AutoclockError::Storage("Could not determine data directory".into()))?;

        Self::new_with_path(proj_dirs.data_dir().join("sessions.db"))
    }

    /// Create a new storage instance that uses the specified database path.
    ///
    /// # Examples
    ///
    /// ```
    /// use autoclock::storage::SqliteStorage;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let storage = SqliteStorage::new_with_path(dir.path().join("sessions.db")).unwrap();
    /// assert!(storage.latest_session().unwrap().is_none());
    /// ```
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| storage_error("Failed to create parent directory for database", e))?;
        }

        let storage = Self { db_path };
        storage.init()?;
        Ok(storage)
    }

    /// Path of the backing database file
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)
            .map_err(|e| storage_error("Failed to open database", e))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| storage_error("Failed to set busy timeout", e))?;
        Ok(conn)
    }

    fn init(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                project_id TEXT,
                description TEXT NOT NULL,
                started_at INTEGER NOT NULL,
                completed_at INTEGER,
                auto_completed INTEGER NOT NULL DEFAULT 0,
                ticket_ref TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_started_at ON sessions(started_at);
            CREATE TABLE IF NOT EXISTS event_assignments (
                label TEXT PRIMARY KEY,
                project_id TEXT,
                updated_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS auth_tokens (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                token TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );",
        )
        .map_err(|e| storage_error("Failed to create tables", e))?;
        Ok(())
    }

    /// Record a new session.
    ///
    /// Fails with [`AutoclockError::DuplicateId`] when the id already exists.
    /// Any session still open is closed at the new session's start inside the
    /// same transaction and returned, so the log never holds two open
    /// sessions.
    pub fn append_session(&self, session: &NewSession) -> Result<Option<Session>> {
        let mut conn = self.connect()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| storage_error("Failed to start transaction", e))?;

        let exists = tx
            .query_row(
                "SELECT 1 FROM sessions WHERE id = ?",
                params![session.id],
                |_| Ok(()),
            )
            .optional()
            .map_err(|e| storage_error("Failed to check session id", e))?
            .is_some();
        if exists {
            return Err(AutoclockError::DuplicateId(session.id.clone()).into());
        }

        let displaced = close_open_in(&tx, session.started_at, false)?;

        tx.execute(
            "INSERT INTO sessions (id, project_id, description, started_at, completed_at, auto_completed, ticket_ref)
            VALUES (?, ?, ?, ?, NULL, 0, ?)",
            params![
                session.id,
                session.project_id,
                session.description,
                session.started_at.timestamp_millis(),
                session.ticket_ref
            ],
        )
        .map_err(|e| storage_error("Failed to insert session", e))?;

        tx.commit()
            .map_err(|e| storage_error("Failed to commit transaction", e))?;

        if let Some(closed) = &displaced {
            tracing::debug!(session_id = %closed.id, "Closed open session displaced by new start");
        }
        Ok(displaced)
    }

    /// Close the most recently started open session.
    ///
    /// Returns the closed session, or `None` when nothing was open; calling it
    /// again is a no-op.
    pub fn close_open_session(
        &self,
        completed_at: DateTime<Utc>,
        auto_completed: bool,
    ) -> Result<Option<Session>> {
        let mut conn = self.connect()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| storage_error("Failed to start transaction", e))?;
        let closed = close_open_in(&tx, completed_at, auto_completed)?;
        tx.commit()
            .map_err(|e| storage_error("Failed to commit transaction", e))?;
        Ok(closed)
    }

    /// The session with the latest start, open or closed.
    pub fn latest_session(&self) -> Result<Option<Session>> {
        let conn = self.connect()?;
        query_one(
            &conn,
            &format!(
                "SELECT {} FROM sessions ORDER BY started_at DESC, rowid DESC LIMIT 1",
                SESSION_COLUMNS
            ),
        )
    }

    /// The currently open session, if any.
    pub fn open_session(&self) -> Result<Option<Session>> {
        let conn = self.connect()?;
        query_one(&conn, &open_session_query())
    }

    /// Look up a session by id.
    pub fn get_session(&self, id: &str) -> Result<Option<Session>> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM sessions WHERE id = ?", SESSION_COLUMNS),
                params![id],
                SessionRow::read,
            )
            .optional()
            .map_err(|e| storage_error("Failed to query session", e))?;
        row.map(SessionRow::into_session).transpose()
    }

    /// Most recent sessions first.
    pub fn list_sessions(&self, limit: usize) -> Result<Vec<Session>> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM sessions ORDER BY started_at DESC, rowid DESC LIMIT ?",
                SESSION_COLUMNS
            ))
            .map_err(|e| storage_error("Failed to prepare statement", e))?;

        let rows = stmt
            .query_map(params![limit as i64], SessionRow::read)
            .map_err(|e| storage_error("Failed to query sessions", e))?;

        let mut sessions = Vec::new();
        for row in rows {
            let row = row.map_err(|e| storage_error("Failed to read session row", e))?;
            sessions.push(row.into_session()?);
        }
        Ok(sessions)
    }

    /// Delete every session that started strictly before `cutoff`.
    ///
    /// Open sessions are not exempt.
    pub fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.connect()?;
        let removed = conn
            .execute(
                "DELETE FROM sessions WHERE started_at < ?",
                params![cutoff.timestamp_millis()],
            )
            .map_err(|e| storage_error("Failed to purge sessions", e))?;
        Ok(removed)
    }

    /// Remembered project for an event label.
    pub fn get_event_assignment(&self, label: &str) -> Result<Option<ProjectAssignment>> {
        let conn = self.connect()?;
        let row: Option<Option<String>> = conn
            .query_row(
                "SELECT project_id FROM event_assignments WHERE label = ?",
                params![label],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| storage_error("Failed to query event assignment", e))?;

        Ok(row.map(|project| match project {
            Some(project_id) => ProjectAssignment::Project(project_id),
            None => ProjectAssignment::Skip,
        }))
    }

    /// Remember a project (or skip) for an event label, replacing any
    /// previous choice.
    pub fn set_event_assignment(&self, label: &str, assignment: &ProjectAssignment) -> Result<()> {
        let project_id = match assignment {
            ProjectAssignment::Project(id) => Some(id.as_str()),
            ProjectAssignment::Skip => None,
        };
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO event_assignments (label, project_id, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(label) DO UPDATE SET project_id = excluded.project_id, updated_at = excluded.updated_at",
            params![label, project_id, Utc::now().timestamp_millis()],
        )
        .map_err(|e| storage_error("Failed to save event assignment", e))?;
        Ok(())
    }

    /// Append a remote API token to the history.
    pub fn append_token(&self, token: &str, created_at: DateTime<Utc>) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO auth_tokens (token, created_at) VALUES (?, ?)",
            params![token, created_at.timestamp_millis()],
        )
        .map_err(|e| storage_error("Failed to save token", e))?;
        Ok(())
    }

    /// The most recently created token.
    pub fn latest_token(&self) -> Result<Option<AuthToken>> {
        let conn = self.connect()?;
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT token, created_at FROM auth_tokens ORDER BY created_at DESC, id DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| storage_error("Failed to query token", e))?;

        row.map(|(token, created_at)| {
            Ok(AuthToken {
                token,
                created_at: from_millis(created_at)?,
            })
        })
        .transpose()
    }
}

fn open_session_query() -> String {
    format!(
        "SELECT {} FROM sessions WHERE completed_at IS NULL ORDER BY started_at DESC, rowid DESC LIMIT 1",
        SESSION_COLUMNS
    )
}

fn query_one(conn: &Connection, sql: &str) -> Result<Option<Session>> {
    let row = conn
        .query_row(sql, [], SessionRow::read)
        .optional()
        .map_err(|e| storage_error("Failed to query session", e))?;
    row.map(SessionRow::into_session).transpose()
}

/// Closes the open session inside an already started transaction.
fn close_open_in(
    conn: &Connection,
    completed_at: DateTime<Utc>,
    auto_completed: bool,
) -> Result<Option<Session>> {
    let Some(mut open) = query_one(conn, &open_session_query())? else {
        return Ok(None);
    };

    conn.execute(
        "UPDATE sessions SET completed_at = ?, auto_completed = ? WHERE id = ?",
        params![completed_at.timestamp_millis(), auto_completed, open.id],
    )
    .map_err(|e| storage_error("Failed to close session", e))?;

    // Reflect the stored millisecond precision back to the caller.
    open.completed_at = Some(from_millis(completed_at.timestamp_millis())?);
    open.auto_completed = auto_completed;
    Ok(Some(open))
}
