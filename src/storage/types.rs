use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One interval of tracked work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier, assigned at creation
    pub id: String,
    /// Remote project reference
    pub project_id: Option<String>,
    /// Free text label, reused as the remote timer description
    pub description: String,
    /// When the session started
    pub started_at: DateTime<Utc>,
    /// When the session ended; `None` while the session is open
    pub completed_at: Option<DateTime<Utc>>,
    /// True when the reconciliation controller closed the session
    pub auto_completed: bool,
    /// External ticket the work is logged against
    pub ticket_ref: Option<String>,
}

impl Session {
    /// Returns `true` while the session has no completion timestamp.
    pub fn is_open(&self) -> bool {
        self.completed_at.is_none()
    }

    /// Tracked duration, measured up to `now` for an open session.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        self.completed_at.unwrap_or(now) - self.started_at
    }
}

/// Fields supplied by the caller when a session is recorded
#[derive(Debug, Clone)]
pub struct NewSession {
    pub id: String,
    pub project_id: Option<String>,
    pub description: String,
    pub started_at: DateTime<Utc>,
    pub ticket_ref: Option<String>,
}

impl NewSession {
    /// Builds a session record with a fresh UUID.
    pub fn new(
        project_id: Option<String>,
        description: impl Into<String>,
        started_at: DateTime<Utc>,
        ticket_ref: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            project_id,
            description: description.into(),
            started_at,
            ticket_ref,
        }
    }
}

/// Remembered project choice for a recurring external label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectAssignment {
    /// Track the label against this project
    Project(String),
    /// Never track the label
    Skip,
}

/// Stored remote credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub token: String,
    pub created_at: DateTime<Utc>,
}
