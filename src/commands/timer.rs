//! Explicit start, stop and status

use chrono::{DateTime, Utc};
use colored::Colorize;
use std::time::Duration;

use crate::commands::{connect_remote, open_storage, record_session_start, ticket_logger};
use crate::config::Config;
use crate::error::{AutoclockError, Result};
use crate::remote::{with_timeout, Timer, TimerClient, TimerScope};
use crate::storage::{ProjectAssignment, Session, SqliteStorage};
use crate::ticket::{extract_ticket_key, log_closed_session, normalize_ticket_key, TicketLogger};

/// What the user asked to start
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub project: Option<String>,
    pub ticket: Option<String>,
    pub description: String,
}

/// Pick the project: explicit wins, then the label's stored assignment.
fn resolve_project(storage: &SqliteStorage, request: &StartRequest) -> Result<Option<String>> {
    if let Some(project) = &request.project {
        return Ok(Some(project.clone()));
    }
    match storage.get_event_assignment(&request.description)? {
        Some(ProjectAssignment::Project(project)) => Ok(Some(project)),
        Some(ProjectAssignment::Skip) => Err(AutoclockError::InvalidInput(format!(
            "'{}' is assigned to skip; pass --project to track it anyway",
            request.description
        ))
        .into()),
        None => Ok(None),
    }
}

/// Start a remote timer and record the session.
pub async fn start_session(
    storage: &SqliteStorage,
    client: &dyn TimerClient,
    scope: &TimerScope,
    timeout: Duration,
    request: StartRequest,
) -> Result<Session> {
    let description = request.description.trim().to_string();
    if description.is_empty() {
        return Err(AutoclockError::InvalidInput("description must not be empty".to_string()).into());
    }
    let request = StartRequest {
        description,
        ..request
    };

    let ticket = match &request.ticket {
        Some(ticket) => Some(normalize_ticket_key(ticket)?),
        None => extract_ticket_key(&request.description),
    };
    let project = resolve_project(storage, &request)?;

    let timer = with_timeout(
        timeout,
        client.start_timer(scope, project.as_deref(), &request.description),
    )
    .await?;
    tracing::info!(timer_id = %timer.id, "Started remote timer");

    record_session_start(storage, project, &request.description, timer.started_at, ticket)
}

/// Stop the remote timer and close the open session as a user stop.
///
/// Returns the closed session, or `None` when nothing was open locally.
pub async fn stop_session(
    storage: &SqliteStorage,
    client: &dyn TimerClient,
    scope: &TimerScope,
    timeout: Duration,
    tickets: Option<&dyn TicketLogger>,
    min_ticket_log_seconds: i64,
    now: DateTime<Utc>,
) -> Result<Option<Session>> {
    let stopped = with_timeout(timeout, client.stop_timer(scope, now)).await?;
    if stopped.is_none() {
        tracing::debug!("No remote timer was running");
    }

    let closed = storage.close_open_session(now, false)?;
    if let Some(session) = &closed {
        log_closed_session(tickets, session, now, min_ticket_log_seconds).await;
    }
    Ok(closed)
}

/// Remote and local view of what is being tracked
#[derive(Debug)]
pub struct StatusReport {
    pub remote: std::result::Result<Option<Timer>, String>,
    pub open: Option<Session>,
}

/// Collect status; a remote failure is reported, not raised.
pub async fn status_report(
    storage: &SqliteStorage,
    client: &dyn TimerClient,
    scope: &TimerScope,
    timeout: Duration,
) -> Result<StatusReport> {
    let remote = with_timeout(timeout, client.active_timer(scope))
        .await
        .map_err(|e| e.to_string());
    Ok(StatusReport {
        remote,
        open: storage.open_session()?,
    })
}

fn format_elapsed(elapsed: chrono::Duration) -> String {
    let minutes = elapsed.num_minutes().max(0);
    format!("{}h{:02}m", minutes / 60, minutes % 60)
}

pub async fn run_start(config: &Config, request: StartRequest) -> Result<()> {
    let storage = open_storage(config)?;
    let (client, scope) = connect_remote(config, &storage).await?;
    let session = start_session(&storage, &client, &scope, config.remote.timeout(), request).await?;

    println!(
        "{} {}{}",
        "Started".green().bold(),
        session.description,
        session
            .ticket_ref
            .as_deref()
            .map(|t| format!(" [{}]", t.cyan()))
            .unwrap_or_default()
    );
    Ok(())
}

pub async fn run_stop(config: &Config) -> Result<()> {
    let storage = open_storage(config)?;
    let (client, scope) = connect_remote(config, &storage).await?;
    let tickets = ticket_logger(config)?;

    let now = Utc::now();
    let closed = stop_session(
        &storage,
        &client,
        &scope,
        config.remote.timeout(),
        tickets.as_deref(),
        config.presence.min_ticket_log_seconds,
        now,
    )
    .await?;

    match closed {
        Some(session) => println!(
            "{} {} after {}",
            "Stopped".yellow().bold(),
            session.description,
            format_elapsed(session.elapsed(now))
        ),
        None => println!("{}", "Nothing was being tracked.".yellow()),
    }
    Ok(())
}

pub async fn run_status(config: &Config) -> Result<()> {
    let storage = open_storage(config)?;
    let report = match connect_remote(config, &storage).await {
        Ok((client, scope)) => status_report(&storage, &client, &scope, config.remote.timeout()).await?,
        Err(e) => StatusReport {
            remote: Err(e.to_string()),
            open: storage.open_session()?,
        },
    };
    let now = Utc::now();

    match &report.remote {
        Ok(Some(timer)) => println!(
            "Remote: {} ({}, running {})",
            timer.description.green(),
            timer.project_id.as_deref().unwrap_or("no project"),
            format_elapsed(now - timer.started_at)
        ),
        Ok(None) => println!("Remote: {}", "no timer running".yellow()),
        Err(e) => println!("Remote: {} {}", "unavailable:".red(), e),
    }

    match &report.open {
        Some(session) => println!(
            "Local:  {} (since {})",
            session.description.green(),
            session.started_at.with_timezone(&chrono::Local).format("%H:%M")
        ),
        None => println!("Local:  {}", "no open session".yellow()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::FakeTimerClient;
    use crate::ticket::RecordingTicketLogger;
    use chrono::TimeZone;
    use tempfile::TempDir;

    const TIMEOUT: Duration = Duration::from_secs(2);

    fn setup() -> (TempDir, SqliteStorage, FakeTimerClient, TimerScope) {
        let dir = TempDir::new().unwrap();
        let storage = SqliteStorage::new_with_path(dir.path().join("s.db")).unwrap();
        let scope = TimerScope {
            workspace_id: "ws".to_string(),
            user_id: "me".to_string(),
        };
        (dir, storage, FakeTimerClient::new(), scope)
    }

    fn request(project: Option<&str>, ticket: Option<&str>, description: &str) -> StartRequest {
        StartRequest {
            project: project.map(str::to_string),
            ticket: ticket.map(str::to_string),
            description: description.to_string(),
        }
    }

    #[tokio::test]
    async fn test_start_records_session_and_timer() {
        let (_dir, storage, client, scope) = setup();
        let session = start_session(&storage, &client, &scope, TIMEOUT, request(Some("p"), Some("ops-3"), "Review"))
            .await
            .unwrap();

        assert_eq!(session.ticket_ref.as_deref(), Some("OPS-3"));
        assert_eq!(client.current().unwrap().project_id.as_deref(), Some("p"));
        assert_eq!(storage.open_session().unwrap(), Some(session));
    }

    #[tokio::test]
    async fn test_start_uses_stored_assignment_and_description_ticket() {
        let (_dir, storage, client, scope) = setup();
        storage
            .set_event_assignment("Fix OPS-9 crash", &ProjectAssignment::Project("proj-7".to_string()))
            .unwrap();

        let session = start_session(&storage, &client, &scope, TIMEOUT, request(None, None, "Fix OPS-9 crash"))
            .await
            .unwrap();
        assert_eq!(session.project_id.as_deref(), Some("proj-7"));
        assert_eq!(session.ticket_ref.as_deref(), Some("OPS-9"));
    }

    #[tokio::test]
    async fn test_start_rejects_skipped_label_and_bad_ticket() {
        let (_dir, storage, client, scope) = setup();
        storage.set_event_assignment("Lunch", &ProjectAssignment::Skip).unwrap();

        assert!(start_session(&storage, &client, &scope, TIMEOUT, request(None, None, "Lunch"))
            .await
            .is_err());
        assert!(start_session(&storage, &client, &scope, TIMEOUT, request(None, Some("nope"), "Work"))
            .await
            .is_err());
        assert!(start_session(&storage, &client, &scope, TIMEOUT, request(None, None, "   "))
            .await
            .is_err());
        assert_eq!(client.start_calls(), 0);
        assert!(storage.latest_session().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_start_failure_records_nothing() {
        let (_dir, storage, client, scope) = setup();
        client.set_failing(true);
        assert!(start_session(&storage, &client, &scope, TIMEOUT, request(Some("p"), None, "Work"))
            .await
            .is_err());
        assert!(storage.latest_session().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stop_closes_as_user_stop_and_logs_ticket() {
        let (_dir, storage, client, scope) = setup();
        let tickets = RecordingTicketLogger::new();
        let t0 = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        client.set_active(Some("p"), "Review", t0);
        record_session_start(&storage, Some("p".into()), "Review", t0, Some("OPS-1".into())).unwrap();

        let stop_at = t0 + chrono::Duration::minutes(45);
        let closed = stop_session(&storage, &client, &scope, TIMEOUT, Some(&tickets), 60, stop_at)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(closed.completed_at, Some(stop_at));
        assert!(!closed.auto_completed);
        assert!(client.current().is_none());
        assert_eq!(tickets.entries()[0].seconds, 45 * 60);
    }

    #[tokio::test]
    async fn test_stop_with_nothing_running() {
        let (_dir, storage, client, scope) = setup();
        let closed = stop_session(&storage, &client, &scope, TIMEOUT, None, 60, Utc::now())
            .await
            .unwrap();
        assert!(closed.is_none());
    }

    #[tokio::test]
    async fn test_status_reports_remote_failure() {
        let (_dir, storage, client, scope) = setup();
        client.set_failing(true);
        let report = status_report(&storage, &client, &scope, TIMEOUT).await.unwrap();
        assert!(report.remote.is_err());
        assert!(report.open.is_none());
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(chrono::Duration::minutes(125)), "2h05m");
        assert_eq!(format_elapsed(chrono::Duration::seconds(-5)), "0h00m");
    }
}
