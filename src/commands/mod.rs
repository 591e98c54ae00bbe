/*!
Command handlers for the CLI

Handlers are invoked by the CLI entrypoint and are kept small: they wire
the configured store, remote client and ticket logger together and print
results. The logic they share with the reconciliation controller lives
in the library modules.

- `timer`   — explicit start, stop and status
- `history` — the local session log
- `watch`   — the presence watcher
- `admin`   — purge, credentials and label assignments
*/

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::remote::{ClockifyClient, TimerScope};
use crate::storage::{NewSession, Session, SqliteStorage};
use crate::ticket::{JiraWorklogClient, TicketLogger};

pub mod admin;
pub mod history;
pub mod timer;
pub mod watch;

/// Record that work started; the entry point shared by the `start`
/// command and the controller's resume.
///
/// Any session still open is closed at `started_at` with
/// `auto_completed = false`.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use autoclock::commands::record_session_start;
/// use autoclock::storage::SqliteStorage;
///
/// let dir = tempfile::tempdir().unwrap();
/// let storage = SqliteStorage::new_with_path(dir.path().join("s.db")).unwrap();
/// let session = record_session_start(&storage, Some("p".into()), "Review", Utc::now(), None).unwrap();
/// assert!(session.is_open());
/// ```
pub fn record_session_start(
    storage: &SqliteStorage,
    project_id: Option<String>,
    description: &str,
    started_at: DateTime<Utc>,
    ticket_ref: Option<String>,
) -> Result<Session> {
    let new = NewSession::new(project_id, description, started_at, ticket_ref);
    if let Some(displaced) = storage.append_session(&new)? {
        tracing::info!(session_id = %displaced.id, "Closed previous open session");
    }
    tracing::debug!(session_id = %new.id, description, "Recorded session start");

    Ok(Session {
        id: new.id,
        project_id: new.project_id,
        description: new.description,
        started_at: new.started_at,
        completed_at: None,
        auto_completed: false,
        ticket_ref: new.ticket_ref,
    })
}

/// Open the session store named by the config, or the default location.
pub fn open_storage(config: &Config) -> Result<SqliteStorage> {
    match &config.storage.db_path {
        Some(path) => SqliteStorage::new_with_path(path.clone()),
        None => SqliteStorage::new(),
    }
}

/// Build the remote client from the saved API key and resolve the scope.
pub async fn connect_remote(config: &Config, storage: &SqliteStorage) -> Result<(ClockifyClient, TimerScope)> {
    let client = ClockifyClient::from_storage(&config.remote, storage)?;
    let scope = client.resolve_scope(&config.remote).await?;
    tracing::debug!(workspace_id = %scope.workspace_id, user_id = %scope.user_id, "Resolved timer scope");
    Ok((client, scope))
}

/// The ticket logger, when Jira is configured and a token is saved.
pub fn ticket_logger(config: &Config) -> Result<Option<Arc<dyn TicketLogger>>> {
    let Some(jira) = &config.jira else {
        return Ok(None);
    };
    Ok(JiraWorklogClient::from_config(jira, config.remote.timeout())?
        .map(|client| Arc::new(client) as Arc<dyn TicketLogger>))
}
