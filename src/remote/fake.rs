//! In-memory [`TimerClient`] for tests and dry runs
//!
//! [`FakeTimerClient`] keeps a single running timer in memory, records every
//! start and stop, and can be switched into a failing mode to simulate an
//! unreachable service.
//!
//! # Example
//!
//! ```
//! use autoclock::remote::{FakeTimerClient, TimerClient, TimerScope};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let client = FakeTimerClient::new();
//! let scope = TimerScope { workspace_id: "ws".into(), user_id: "me".into() };
//!
//! client.start_timer(&scope, Some("proj"), "Review").await.unwrap();
//! assert!(client.active_timer(&scope).await.unwrap().is_some());
//! assert_eq!(client.start_calls(), 1);
//! # }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard};

use crate::error::{AutoclockError, Result};
use crate::remote::{Timer, TimerClient, TimerScope};

#[derive(Debug, Default)]
struct FakeState {
    active: Option<Timer>,
    started: Vec<Timer>,
    stopped: Vec<Timer>,
    next_id: u64,
    failing: bool,
}

/// In-process fake remote service
#[derive(Debug, Default)]
pub struct FakeTimerClient {
    state: Mutex<FakeState>,
}

impl FakeTimerClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        // A panicking test thread must not hide the state from the rest of the test.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Pretend a timer is already running remotely.
    pub fn set_active(&self, project_id: Option<&str>, description: &str, started_at: DateTime<Utc>) {
        let mut state = self.state();
        state.next_id += 1;
        state.active = Some(Timer {
            id: format!("fake-{}", state.next_id),
            project_id: project_id.map(str::to_string),
            description: description.to_string(),
            started_at,
            stopped_at: None,
        });
    }

    /// Make every call fail with a transport error until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.state().failing = failing;
    }

    pub fn current(&self) -> Option<Timer> {
        self.state().active.clone()
    }

    /// Timers started through [`TimerClient::start_timer`].
    pub fn started(&self) -> Vec<Timer> {
        self.state().started.clone()
    }

    pub fn start_calls(&self) -> usize {
        self.state().started.len()
    }

    pub fn stop_calls(&self) -> usize {
        self.state().stopped.len()
    }

    fn check_failing(state: &FakeState) -> Result<()> {
        if state.failing {
            return Err(AutoclockError::Transport("fake service unavailable".to_string()).into());
        }
        Ok(())
    }
}

#[async_trait]
impl TimerClient for FakeTimerClient {
    async fn active_timer(&self, _scope: &TimerScope) -> Result<Option<Timer>> {
        let state = self.state();
        Self::check_failing(&state)?;
        Ok(state.active.clone())
    }

    async fn start_timer(
        &self,
        _scope: &TimerScope,
        project_id: Option<&str>,
        description: &str,
    ) -> Result<Timer> {
        let mut state = self.state();
        Self::check_failing(&state)?;

        let now = Utc::now();
        if let Some(mut previous) = state.active.take() {
            previous.stopped_at = Some(now);
            state.stopped.push(previous);
        }

        state.next_id += 1;
        let timer = Timer {
            id: format!("fake-{}", state.next_id),
            project_id: project_id.map(str::to_string),
            description: description.to_string(),
            started_at: now,
            stopped_at: None,
        };
        state.active = Some(timer.clone());
        state.started.push(timer.clone());
        Ok(timer)
    }

    async fn stop_timer(&self, _scope: &TimerScope, at: DateTime<Utc>) -> Result<Option<Timer>> {
        let mut state = self.state();
        Self::check_failing(&state)?;

        let Some(mut timer) = state.active.take() else {
            return Ok(None);
        };
        timer.stopped_at = Some(at);
        state.stopped.push(timer.clone());
        Ok(Some(timer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> TimerScope {
        TimerScope {
            workspace_id: "ws".to_string(),
            user_id: "me".to_string(),
        }
    }

    #[tokio::test]
    async fn test_stop_without_active_returns_none() {
        let client = FakeTimerClient::new();
        assert!(client.stop_timer(&scope(), Utc::now()).await.unwrap().is_none());
        assert_eq!(client.stop_calls(), 0);
    }

    #[tokio::test]
    async fn test_failing_mode_rejects_calls() {
        let client = FakeTimerClient::new();
        client.set_failing(true);
        assert!(client.active_timer(&scope()).await.is_err());
        assert!(client.start_timer(&scope(), None, "x").await.is_err());

        client.set_failing(false);
        assert!(client.active_timer(&scope()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_start_replaces_running_timer() {
        let client = FakeTimerClient::new();
        client.start_timer(&scope(), Some("a"), "first").await.unwrap();
        client.start_timer(&scope(), Some("b"), "second").await.unwrap();

        assert_eq!(client.current().unwrap().description, "second");
        assert_eq!(client.stop_calls(), 1);
    }
}
