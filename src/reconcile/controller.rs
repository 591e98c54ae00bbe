use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::commands::record_session_start;
use crate::error::Result;
use crate::reconcile::{resume_eligibility, Axis, AxisState, ControllerSettings, Ineligible, ResumeOutcome};
use crate::remote::{with_timeout, Timer, TimerClient, TimerScope};
use crate::storage::{Session, SqliteStorage};
use crate::ticket::{log_closed_session, TicketLogger};

/// Serializes resumes across axes and remembers the last attempt
#[derive(Debug, Default)]
pub struct ResumeGate {
    last_attempt: Mutex<Option<DateTime<Utc>>>,
}

impl ResumeGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn last_attempt(&self) -> Option<DateTime<Utc>> {
        *self.last_attempt.lock().await
    }
}

/// Decisions shared by the idle and lock axes
///
/// The controller keeps no copy of the open session; every decision
/// re-reads the store.
pub struct Controller {
    storage: Arc<SqliteStorage>,
    client: Arc<dyn TimerClient>,
    scope: TimerScope,
    tickets: Option<Arc<dyn TicketLogger>>,
    settings: ControllerSettings,
    gate: ResumeGate,
    /// End of a remote stop whose local close failed
    unclosed_stop: Mutex<Option<DateTime<Utc>>>,
}

impl Controller {
    pub fn new(
        storage: Arc<SqliteStorage>,
        client: Arc<dyn TimerClient>,
        scope: TimerScope,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            storage,
            client,
            scope,
            tickets: None,
            settings,
            gate: ResumeGate::new(),
            unclosed_stop: Mutex::new(None),
        }
    }

    /// Also log closed ticket sessions through `logger`.
    pub fn with_ticket_logger(mut self, logger: Arc<dyn TicketLogger>) -> Self {
        self.tickets = Some(logger);
        self
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn gate(&self) -> &ResumeGate {
        &self.gate
    }

    async fn remote_active(&self) -> Result<Option<Timer>> {
        with_timeout(self.settings.remote_timeout, self.client.active_timer(&self.scope)).await
    }

    /// Close the open local session at `now` and log its ticket time.
    async fn close_local(&self, now: DateTime<Utc>) -> Result<Option<Session>> {
        let closed = self.storage.close_open_session(now, true)?;
        if let Some(session) = &closed {
            log_closed_session(
                self.tickets.as_deref(),
                session,
                now,
                self.settings.min_ticket_log_seconds,
            )
            .await;
        }
        Ok(closed)
    }

    /// Handle an axis turning inactive.
    ///
    /// Returns `true` when a running remote timer was stopped, even if the
    /// local session could not be closed; a later repair closes it at the
    /// remote end time. When nothing is running remotely, a leftover open
    /// local session is closed instead.
    pub async fn stop_for_inactivity(&self, axis: Axis, now: DateTime<Utc>) -> Result<bool> {
        if self.remote_active().await?.is_none() {
            debug!(axis = %axis, "Inactive with no remote timer running");
            self.repair_divergence(axis, now).await?;
            return Ok(false);
        }

        let stopped = with_timeout(
            self.settings.remote_timeout,
            self.client.stop_timer(&self.scope, now),
        )
        .await?;
        let ended_at = stopped.as_ref().and_then(|t| t.stopped_at).unwrap_or(now);
        let closed = match self.close_local(ended_at).await {
            Ok(closed) => closed,
            Err(e) => {
                warn!(axis = %axis, error = %e, "Remote timer stopped but local session is still open");
                *self.unclosed_stop.lock().await = Some(ended_at);
                None
            }
        };

        info!(
            axis = %axis,
            timer_id = stopped.as_ref().map(|t| t.id.as_str()).unwrap_or("-"),
            session_id = closed.as_ref().map(|s| s.id.as_str()).unwrap_or("-"),
            "Stopped timer for inactivity"
        );
        Ok(true)
    }

    /// Close an open local session that has no remote timer behind it.
    ///
    /// Returns the session that was closed, if any.
    ///
    /// The session is closed at the end of a remote stop whose local close
    /// failed earlier, when that stop happened after the session started.
    pub async fn repair_divergence(&self, axis: Axis, now: DateTime<Utc>) -> Result<Option<Session>> {
        let Some(open) = self.storage.open_session()? else {
            self.unclosed_stop.lock().await.take();
            return Ok(None);
        };
        if self.remote_active().await?.is_some() {
            return Ok(None);
        }

        let mut unclosed_stop = self.unclosed_stop.lock().await;
        let completed_at = unclosed_stop
            .filter(|ended_at| *ended_at >= open.started_at)
            .unwrap_or(now);
        let closed = self.close_local(completed_at).await?;
        unclosed_stop.take();
        drop(unclosed_stop);
        if let Some(session) = &closed {
            warn!(axis = %axis, session_id = %session.id, "Closed local session with no remote timer");
        }
        Ok(closed)
    }

    /// Resume the most recent auto-stopped session if policy allows.
    ///
    /// The cooldown is measured from the previous attempt that got past the
    /// eligibility checks, whether or not it succeeded.
    pub async fn try_resume(&self, axis: Axis, now: DateTime<Utc>) -> Result<ResumeOutcome> {
        let mut last_attempt = self.gate.last_attempt.lock().await;
        if let Some(previous) = *last_attempt {
            if now - previous < self.settings.resume_cooldown {
                debug!(axis = %axis, "Resume suppressed by cooldown");
                return Ok(ResumeOutcome::CoolingDown);
            }
        }

        if !self.settings.settle_delay.is_zero() {
            tokio::time::sleep(self.settings.settle_delay).await;
        }

        // Close a session left behind by a failed local close first.
        if self.storage.open_session()?.is_some() {
            self.repair_divergence(axis, now).await?;
        }

        let latest = self.storage.latest_session()?;
        if let Err(reason) = resume_eligibility(latest.as_ref(), now, self.settings.resume_window) {
            return Ok(ResumeOutcome::Ineligible(reason));
        }
        let Some(session) = latest else {
            return Ok(ResumeOutcome::Ineligible(Ineligible::NoSession));
        };
        if self.remote_active().await?.is_some() {
            return Ok(ResumeOutcome::Ineligible(Ineligible::RemoteTimerRunning));
        }

        *last_attempt = Some(now);
        let timer = with_timeout(
            self.settings.remote_timeout,
            self.client.start_timer(&self.scope, session.project_id.as_deref(), &session.description),
        )
        .await?;

        let resumed = record_session_start(
            &self.storage,
            session.project_id.clone(),
            &session.description,
            now,
            session.ticket_ref.clone(),
        )?;

        info!(
            axis = %axis,
            timer_id = %timer.id,
            session_id = %resumed.id,
            previous_session_id = %session.id,
            "Resumed timer after activity returned"
        );
        Ok(ResumeOutcome::Resumed(resumed))
    }
}

/// One axis of the presence state machine
#[derive(Debug, Clone)]
pub struct AxisMachine {
    axis: Axis,
    state: AxisState,
}

impl AxisMachine {
    pub fn new(axis: Axis) -> Self {
        Self {
            axis,
            state: AxisState::Active,
        }
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn state(&self) -> AxisState {
        self.state
    }

    /// Feed one presence sample into the machine.
    ///
    /// Errors are logged and leave the state where a later tick retries:
    /// a failed stop stays `Active`, and a failed or cooled-down resume
    /// stays `InactiveStopped`.
    pub async fn observe(&mut self, controller: &Controller, inactive: bool, now: DateTime<Utc>) -> AxisState {
        let axis = self.axis;
        match (self.state, inactive) {
            (AxisState::Active, false) => {}
            (AxisState::Active, true) => match controller.stop_for_inactivity(axis, now).await {
                Ok(true) => self.state = AxisState::InactiveStopped,
                Ok(false) => self.state = AxisState::InactiveNoop,
                Err(e) => warn!(axis = %axis, error = %e, "Failed to stop timer for inactivity"),
            },
            (AxisState::InactiveStopped | AxisState::InactiveNoop, true) => {
                if let Err(e) = controller.repair_divergence(axis, now).await {
                    warn!(axis = %axis, error = %e, "Failed to check local session against remote");
                }
            }
            (AxisState::InactiveNoop, false) => {
                debug!(axis = %axis, "Active again; nothing was stopped");
                self.state = AxisState::Active;
            }
            (AxisState::InactiveStopped, false) => match controller.try_resume(axis, now).await {
                Ok(ResumeOutcome::Resumed(_)) => self.state = AxisState::Active,
                Ok(ResumeOutcome::Ineligible(reason)) => {
                    info!(axis = %axis, reason = %reason, "Not resuming");
                    self.state = AxisState::Active;
                }
                Ok(ResumeOutcome::CoolingDown) => {}
                Err(e) => warn!(axis = %axis, error = %e, "Failed to resume timer"),
            },
        }
        self.state
    }
}
