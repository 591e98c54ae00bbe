//! Periodic sampling of the presence axes
//!
//! Each axis runs in its own task. A tick samples the signal, feeds the
//! axis state machine and waits for that work to finish before the next
//! tick; the two tasks interleave freely.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{AutoclockError, Result};
use crate::presence::{IdleSource, LockSource, LockState, PresenceSources};
use crate::reconcile::{Axis, AxisMachine, Controller};
use crate::remote::with_timeout;

/// How an axis decides that nobody is at the machine
pub enum Probe {
    Idle {
        source: Arc<dyn IdleSource>,
        threshold_seconds: u64,
    },
    Lock(Arc<dyn LockSource>),
}

impl Probe {
    pub fn axis(&self) -> Axis {
        match self {
            Probe::Idle { .. } => Axis::Idle,
            Probe::Lock(_) => Axis::Lock,
        }
    }

    /// Sample the signal; `true` means inactive.
    pub async fn inactive(&self) -> Result<bool> {
        match self {
            Probe::Idle {
                source,
                threshold_seconds,
            } => Ok(source.idle_seconds().await? >= *threshold_seconds),
            Probe::Lock(source) => Ok(source.lock_state().await? == LockState::Locked),
        }
    }
}

/// Consecutive failed samples before an axis warns that it is not reacting
const FAILED_SAMPLE_WARN_AFTER: u32 = 10;

/// Run of consecutive failed samples on one axis
#[derive(Debug, Default)]
struct FailureStreak {
    count: u32,
}

impl FailureStreak {
    /// Count a failure; `true` once per streak, when it reaches the threshold.
    fn failed(&mut self) -> bool {
        self.count = self.count.saturating_add(1);
        self.count == FAILED_SAMPLE_WARN_AFTER
    }

    /// End the streak and return its length.
    fn succeeded(&mut self) -> u32 {
        std::mem::take(&mut self.count)
    }
}

fn is_signal_unavailable(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<AutoclockError>()
        .map(AutoclockError::is_signal_unavailable)
        .unwrap_or(false)
}

/// Drive one axis until `token` is cancelled.
///
/// A `SignalUnavailable` sample disables the axis for the rest of the
/// process and the task returns. Other sampling errors skip the tick, with
/// one warning once they keep failing.
pub async fn run_axis(
    controller: Arc<Controller>,
    probe: Probe,
    period: Duration,
    token: CancellationToken,
) {
    let axis = probe.axis();
    let mut machine = AxisMachine::new(axis);
    let mut failures = FailureStreak::default();
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(axis = %axis, period_ms = period.as_millis() as u64, "Presence ticker started");

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                info!(axis = %axis, "Presence ticker stopped");
                break;
            }
            _ = interval.tick() => {
                let sample = with_timeout(controller.settings().remote_timeout, probe.inactive()).await;
                match sample {
                    Ok(inactive) => {
                        let streak = failures.succeeded();
                        if streak >= FAILED_SAMPLE_WARN_AFTER {
                            info!(axis = %axis, failed_samples = streak, "Presence samples recovered");
                        }
                        let before = machine.state();
                        let after = machine.observe(&controller, inactive, Utc::now()).await;
                        if before != after {
                            debug!(axis = %axis, from = ?before, to = ?after, "Axis state changed");
                        }
                    }
                    Err(e) if is_signal_unavailable(&e) => {
                        warn!(axis = %axis, error = %e, "Presence signal unavailable; axis disabled");
                        break;
                    }
                    Err(e) => {
                        debug!(axis = %axis, error = %e, "Skipping tick after failed sample");
                        if failures.failed() {
                            warn!(
                                axis = %axis,
                                failed_samples = FAILED_SAMPLE_WARN_AFTER,
                                error = %e,
                                "Presence samples keep failing; axis is not reacting"
                            );
                        }
                    }
                }
            }
        }
    }
}

impl Controller {
    /// Run the idle ticker and, when available, the lock ticker until
    /// `token` is cancelled.
    pub async fn run(self: Arc<Self>, sources: PresenceSources, token: CancellationToken) -> Result<()> {
        let settings = self.settings().clone();
        let mut tasks = Vec::with_capacity(2);

        tasks.push(tokio::spawn(run_axis(
            self.clone(),
            Probe::Idle {
                source: sources.idle,
                threshold_seconds: settings.idle_threshold_seconds,
            },
            settings.idle_poll,
            token.clone(),
        )));

        match sources.lock {
            Some(lock) => tasks.push(tokio::spawn(run_axis(
                self.clone(),
                Probe::Lock(lock),
                settings.lock_poll,
                token.clone(),
            ))),
            None => info!("Lock axis not available; idle time drives the controller"),
        }

        for task in tasks {
            task.await?;
        }
        Ok(())
    }
}
