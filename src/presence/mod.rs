//! Presence signals
//!
//! Two independent, sampled signals describe whether someone is at the
//! machine: seconds since the last input event ([`IdleSource`]) and whether
//! the session is locked ([`LockSource`]). Idle detection is required; lock
//! detection is optional and is selected once at startup by
//! [`PresenceSources::probe`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::config::LockDetection;
use crate::error::Result;

pub mod manual;
pub mod system;

pub use manual::ManualPresence;

/// Session lock state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockState {
    Locked,
    Unlocked,
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockState::Locked => write!(f, "locked"),
            LockState::Unlocked => write!(f, "unlocked"),
        }
    }
}

/// Seconds since the last keyboard or pointer input
#[async_trait]
pub trait IdleSource: Send + Sync {
    /// May fail transiently; the caller skips that sample.
    async fn idle_seconds(&self) -> Result<u64>;
}

/// Screen lock state
#[async_trait]
pub trait LockSource: Send + Sync {
    /// Fails with `SignalUnavailable` when the platform can no longer
    /// report lock state.
    async fn lock_state(&self) -> Result<LockState>;
}

/// The presence capabilities available in this process
#[derive(Clone)]
pub struct PresenceSources {
    pub idle: Arc<dyn IdleSource>,
    pub lock: Option<Arc<dyn LockSource>>,
}

impl PresenceSources {
    /// Select the platform's presence sources.
    ///
    /// The lock source is sampled once; if that fails it is dropped for the
    /// lifetime of the process and only idle time drives the controller.
    ///
    /// # Errors
    ///
    /// Returns `SignalUnavailable` when idle time cannot be read on this
    /// platform.
    pub async fn probe(detection: LockDetection) -> Result<Self> {
        let idle = system::idle_source()?;

        let lock = match detection {
            LockDetection::Disabled => {
                tracing::info!("Lock detection disabled by configuration");
                None
            }
            LockDetection::Auto => match system::lock_source() {
                None => {
                    tracing::warn!("No lock-state source on this platform; using idle time only");
                    None
                }
                Some(source) => match source.lock_state().await {
                    Ok(state) => {
                        tracing::debug!(state = %state, "Lock-state source available");
                        Some(source)
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Lock-state source unusable; using idle time only");
                        None
                    }
                },
            },
        };

        Ok(Self { idle, lock })
    }
}
