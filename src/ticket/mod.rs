//! Ticket work-log collaborator
//!
//! When a session tied to a ticket is closed, the tracked time is also
//! logged against the ticket. Logging is best effort: callers report
//! failures and move on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::{Mutex, OnceLock};

use crate::error::{AutoclockError, Result};
use crate::storage::Session;

pub mod credentials;
pub mod jira;

pub use jira::JiraWorklogClient;

fn ticket_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b([A-Z][A-Z0-9]+-[1-9][0-9]*)\b").expect("valid regex"))
}

/// Validate and upper-case a ticket key such as `ops-42`.
///
/// # Examples
///
/// ```
/// use autoclock::ticket::normalize_ticket_key;
///
/// assert_eq!(normalize_ticket_key(" ops-42 ").unwrap(), "OPS-42");
/// assert!(normalize_ticket_key("not a ticket").is_err());
/// ```
pub fn normalize_ticket_key(input: &str) -> Result<String> {
    let key = input.trim().to_uppercase();
    match ticket_pattern().find(&key) {
        Some(m) if m.as_str() == key => Ok(key),
        _ => Err(AutoclockError::InvalidInput(format!("not a ticket key: {}", input.trim())).into()),
    }
}

/// First ticket key mentioned in free text.
pub fn extract_ticket_key(text: &str) -> Option<String> {
    ticket_pattern()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Receives tracked time for a ticket
#[async_trait]
pub trait TicketLogger: Send + Sync {
    async fn log_work(&self, ticket: &str, started_at: DateTime<Utc>, seconds: i64) -> Result<()>;
}

/// Log a closed session against its ticket when it ran long enough.
///
/// Returns `true` when an entry was logged. Failures are logged at `warn`
/// and swallowed.
pub async fn log_closed_session(
    logger: Option<&dyn TicketLogger>,
    session: &Session,
    now: DateTime<Utc>,
    min_seconds: i64,
) -> bool {
    let (Some(logger), Some(ticket)) = (logger, session.ticket_ref.as_deref()) else {
        return false;
    };

    let seconds = session.elapsed(now).num_seconds();
    if seconds < min_seconds {
        tracing::debug!(ticket, seconds, "Session too short for a work-log entry");
        return false;
    }

    match logger.log_work(ticket, session.started_at, seconds).await {
        Ok(()) => {
            tracing::info!(ticket, seconds, "Logged work on ticket");
            true
        }
        Err(e) => {
            tracing::warn!(ticket, error = %e, "Failed to log work on ticket");
            false
        }
    }
}

/// One recorded work-log call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkLogEntry {
    pub ticket: String,
    pub started_at: DateTime<Utc>,
    pub seconds: i64,
}

/// [`TicketLogger`] that remembers calls instead of sending them
#[derive(Debug, Default)]
pub struct RecordingTicketLogger {
    entries: Mutex<Vec<WorkLogEntry>>,
    failing: Mutex<bool>,
}

impl RecordingTicketLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap_or_else(|p| p.into_inner()) = failing;
    }

    pub fn entries(&self) -> Vec<WorkLogEntry> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl TicketLogger for RecordingTicketLogger {
    async fn log_work(&self, ticket: &str, started_at: DateTime<Utc>, seconds: i64) -> Result<()> {
        if *self.failing.lock().unwrap_or_else(|p| p.into_inner()) {
            return Err(AutoclockError::Transport("work-log service unavailable".to_string()).into());
        }
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(WorkLogEntry {
                ticket: ticket.to_string(),
                started_at,
                seconds,
            });
        Ok(())
    }
}
