//! Presence-driven reconciliation
//!
//! The controller watches two presence axes, idle time and screen lock.
//! When an axis turns inactive it stops the remote timer and closes the
//! local session. When activity returns it may resume the work that was
//! interrupted. Each axis runs the same small state machine
//! ([`AxisMachine`]) on its own ticker; both share one [`Controller`],
//! which owns the store handle, the remote client and the resume cooldown.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{PresenceConfig, RemoteConfig};
use crate::storage::Session;

pub mod controller;
pub mod ticker;

pub use controller::{AxisMachine, Controller, ResumeGate};

/// A presence signal that can drive stops and resumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Idle,
    Lock,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Idle => write!(f, "idle"),
            Axis::Lock => write!(f, "lock"),
        }
    }
}

/// Per-axis controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisState {
    /// Someone is at the machine
    Active,
    /// This axis stopped a running timer
    InactiveStopped,
    /// Inactive, but there was nothing to stop
    InactiveNoop,
}

impl AxisState {
    pub fn is_inactive(&self) -> bool {
        !matches!(self, AxisState::Active)
    }
}

/// Why the latest session cannot be resumed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligible {
    NoSession,
    StillOpen,
    StoppedByUser,
    Stale,
    NoProject,
    RemoteTimerRunning,
}

impl fmt::Display for Ineligible {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Ineligible::NoSession => "no session recorded",
            Ineligible::StillOpen => "latest session is still open",
            Ineligible::StoppedByUser => "latest session was stopped by the user",
            Ineligible::Stale => "latest session ended outside the resume window",
            Ineligible::NoProject => "latest session has no project",
            Ineligible::RemoteTimerRunning => "a remote timer is already running",
        };
        f.write_str(reason)
    }
}

/// Result of a resume attempt
#[derive(Debug, Clone, PartialEq)]
pub enum ResumeOutcome {
    /// A remote timer was started and this session recorded
    Resumed(Session),
    /// A resume happened too recently
    CoolingDown,
    Ineligible(Ineligible),
}

/// Check the local half of resume eligibility.
///
/// The session must be closed by the controller, have a project, and have
/// ended no longer than `window` before `now` (the boundary is inclusive).
/// Whether a remote timer is running is checked separately.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use autoclock::reconcile::{resume_eligibility, Ineligible};
///
/// assert_eq!(
///     resume_eligibility(None, Utc::now(), Duration::hours(2)),
///     Err(Ineligible::NoSession)
/// );
/// ```
pub fn resume_eligibility(
    session: Option<&Session>,
    now: DateTime<Utc>,
    window: Duration,
) -> std::result::Result<(), Ineligible> {
    let session = session.ok_or(Ineligible::NoSession)?;
    let completed_at = session.completed_at.ok_or(Ineligible::StillOpen)?;
    if !session.auto_completed {
        return Err(Ineligible::StoppedByUser);
    }
    if now - completed_at > window {
        return Err(Ineligible::Stale);
    }
    if session.project_id.is_none() {
        return Err(Ineligible::NoProject);
    }
    Ok(())
}

/// Timing and policy knobs for the controller
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub idle_threshold_seconds: u64,
    pub idle_poll: std::time::Duration,
    pub lock_poll: std::time::Duration,
    pub resume_window: Duration,
    pub resume_cooldown: Duration,
    pub settle_delay: std::time::Duration,
    pub min_ticket_log_seconds: i64,
    pub remote_timeout: std::time::Duration,
}

impl ControllerSettings {
    pub fn from_config(presence: &PresenceConfig, remote: &RemoteConfig) -> Self {
        Self {
            idle_threshold_seconds: presence.idle_threshold_seconds,
            idle_poll: std::time::Duration::from_secs(presence.idle_poll_seconds),
            lock_poll: std::time::Duration::from_secs(presence.lock_poll_seconds),
            resume_window: Duration::minutes(presence.resume_window_minutes),
            resume_cooldown: Duration::seconds(presence.resume_cooldown_seconds),
            settle_delay: std::time::Duration::from_millis(presence.settle_delay_ms),
            min_ticket_log_seconds: presence.min_ticket_log_seconds,
            remote_timeout: remote.timeout(),
        }
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::from_config(&PresenceConfig::default(), &RemoteConfig::default())
    }
}
