//! Presence source whose readings are set by the caller
//!
//! Used by tests to drive the reconciliation controller through exact
//! idle/lock sequences.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use crate::error::{AutoclockError, Result};
use crate::presence::{IdleSource, LockSource, LockState};

/// Manually driven idle and lock readings
#[derive(Debug)]
pub struct ManualPresence {
    idle_seconds: AtomicU64,
    lock: Mutex<LockState>,
    idle_failing: AtomicBool,
    lock_unavailable: AtomicBool,
}

impl Default for ManualPresence {
    fn default() -> Self {
        Self {
            idle_seconds: AtomicU64::new(0),
            lock: Mutex::new(LockState::Unlocked),
            idle_failing: AtomicBool::new(false),
            lock_unavailable: AtomicBool::new(false),
        }
    }
}

impl ManualPresence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_idle(&self, seconds: u64) {
        self.idle_seconds.store(seconds, Ordering::SeqCst);
    }

    pub fn set_lock(&self, state: LockState) {
        *self.lock.lock().unwrap_or_else(|p| p.into_inner()) = state;
    }

    /// Make idle sampling fail transiently.
    pub fn set_idle_failing(&self, failing: bool) {
        self.idle_failing.store(failing, Ordering::SeqCst);
    }

    /// Make lock sampling report `SignalUnavailable`.
    pub fn set_lock_unavailable(&self, unavailable: bool) {
        self.lock_unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl IdleSource for ManualPresence {
    async fn idle_seconds(&self) -> Result<u64> {
        if self.idle_failing.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("idle sample failed"));
        }
        Ok(self.idle_seconds.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl LockSource for ManualPresence {
    async fn lock_state(&self) -> Result<LockState> {
        if self.lock_unavailable.load(Ordering::SeqCst) {
            return Err(AutoclockError::SignalUnavailable("lock source gone".to_string()).into());
        }
        Ok(*self.lock.lock().unwrap_or_else(|p| p.into_inner()))
    }
}
