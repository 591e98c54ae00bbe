//! Remote timer collaborator
//!
//! The reconciliation engine only needs three capabilities from the remote
//! time-tracking service: read the running timer, start one, stop it. They
//! are expressed as the [`TimerClient`] trait so the controller can be driven
//! by [`FakeTimerClient`] in tests and by [`ClockifyClient`] in production.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::error::{AutoclockError, Result};

pub mod clockify;
pub mod fake;

pub use clockify::ClockifyClient;
pub use fake::FakeTimerClient;

/// Workspace and user a timer belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerScope {
    pub workspace_id: String,
    pub user_id: String,
}

/// A remote time entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timer {
    pub id: String,
    pub project_id: Option<String>,
    pub description: String,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
}

/// Capability interface to the remote time-tracking service
///
/// Every method may fail with a transport or authentication error; callers
/// in the reconciliation loop treat all failures as non-fatal.
#[async_trait]
pub trait TimerClient: Send + Sync {
    /// The running timer for the user, if any
    async fn active_timer(&self, scope: &TimerScope) -> Result<Option<Timer>>;

    /// Start a new timer now
    async fn start_timer(
        &self,
        scope: &TimerScope,
        project_id: Option<&str>,
        description: &str,
    ) -> Result<Timer>;

    /// Stop the running timer at `at`; `None` when nothing was running
    async fn stop_timer(&self, scope: &TimerScope, at: DateTime<Utc>) -> Result<Option<Timer>>;
}

/// Bound a remote call; an elapsed deadline becomes a transport error.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use autoclock::remote::with_timeout;
///
/// # tokio_test::block_on(async {
/// let value = with_timeout(Duration::from_secs(1), async { Ok(7) }).await.unwrap();
/// assert_eq!(value, 7);
/// # });
/// ```
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(AutoclockError::Transport(format!(
            "remote call timed out after {:?}",
            limit
        ))
        .into()),
    }
}
