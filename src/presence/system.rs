//! Platform presence sources backed by system utilities
//!
//! - Linux: `xprintidle` for idle time, `loginctl` `LockedHint` for lock state
//! - macOS: `ioreg` `HIDIdleTime` for idle time and
//!   `CGSSessionScreenIsLocked` for lock state

use anyhow::anyhow;
use async_trait::async_trait;
use std::io;
use std::sync::Arc;
use tokio::process::Command;

use crate::error::{AutoclockError, Result};
use crate::presence::{IdleSource, LockSource, LockState};

/// Run a utility and return its stdout.
///
/// A missing binary means the signal does not exist on this machine.
async fn run_utility(program: &str, args: &[&str]) -> Result<String> {
    let output = match Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
    {
        Ok(output) => output,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(AutoclockError::SignalUnavailable(format!("{} not found", program)).into())
        }
        Err(e) => return Err(e.into()),
    };

    if !output.status.success() {
        return Err(anyhow!(
            "{} exited with {}: {}",
            program,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// `xprintidle` prints idle milliseconds.
pub fn parse_xprintidle(output: &str) -> Result<u64> {
    let millis: u64 = output
        .trim()
        .parse()
        .map_err(|e| anyhow!("unexpected xprintidle output {:?}: {}", output.trim(), e))?;
    Ok(millis / 1000)
}

/// `ioreg -c IOHIDSystem` reports `"HIDIdleTime" = <nanoseconds>`.
pub fn parse_ioreg_idle(output: &str) -> Result<u64> {
    let line = output
        .lines()
        .find(|line| line.contains("\"HIDIdleTime\""))
        .ok_or_else(|| AutoclockError::SignalUnavailable("HIDIdleTime not reported".to_string()))?;

    let nanos: u64 = line
        .rsplit('=')
        .next()
        .map(str::trim)
        .and_then(|value| value.parse().ok())
        .ok_or_else(|| anyhow!("unexpected HIDIdleTime line: {}", line.trim()))?;
    Ok(nanos / 1_000_000_000)
}

/// `loginctl show-session -p LockedHint` prints `LockedHint=yes|no`.
pub fn parse_locked_hint(output: &str) -> Result<LockState> {
    let value = output
        .lines()
        .find_map(|line| line.trim().strip_prefix("LockedHint="))
        .ok_or_else(|| AutoclockError::SignalUnavailable("LockedHint not reported".to_string()))?;

    match value.trim() {
        "yes" => Ok(LockState::Locked),
        "no" => Ok(LockState::Unlocked),
        other => Err(anyhow!("unexpected LockedHint value: {}", other)),
    }
}

/// The root `ioreg` node only carries `CGSSessionScreenIsLocked` while locked.
pub fn parse_ioreg_lock(output: &str) -> LockState {
    let locked = output.lines().any(|line| {
        line.contains("\"CGSSessionScreenIsLocked\"=Yes")
            || line.contains("\"CGSSessionScreenIsLocked\" = Yes")
    });
    if locked {
        LockState::Locked
    } else {
        LockState::Unlocked
    }
}

/// Idle time from `xprintidle`
pub struct XprintidleSource;

#[async_trait]
impl IdleSource for XprintidleSource {
    async fn idle_seconds(&self) -> Result<u64> {
        parse_xprintidle(&run_utility("xprintidle", &[]).await?)
    }
}

/// Idle time from the IOHIDSystem registry entry
pub struct IoregIdleSource;

#[async_trait]
impl IdleSource for IoregIdleSource {
    async fn idle_seconds(&self) -> Result<u64> {
        parse_ioreg_idle(&run_utility("ioreg", &["-c", "IOHIDSystem", "-d", "4"]).await?)
    }
}

/// Lock state from systemd-logind
pub struct LoginctlLockSource {
    session: String,
}

impl LoginctlLockSource {
    /// Uses `XDG_SESSION_ID`, falling back to logind's `auto` session.
    pub fn from_env() -> Self {
        Self {
            session: std::env::var("XDG_SESSION_ID").unwrap_or_else(|_| "auto".to_string()),
        }
    }
}

#[async_trait]
impl LockSource for LoginctlLockSource {
    async fn lock_state(&self) -> Result<LockState> {
        let output = run_utility(
            "loginctl",
            &["show-session", &self.session, "-p", "LockedHint"],
        )
        .await?;
        parse_locked_hint(&output)
    }
}

/// Lock state from the macOS window server session
pub struct IoregLockSource;

#[async_trait]
impl LockSource for IoregLockSource {
    async fn lock_state(&self) -> Result<LockState> {
        Ok(parse_ioreg_lock(&run_utility("ioreg", &["-n", "Root", "-d1"]).await?))
    }
}

/// The idle source for this platform.
pub fn idle_source() -> Result<Arc<dyn IdleSource>> {
    if cfg!(target_os = "macos") {
        Ok(Arc::new(IoregIdleSource))
    } else if cfg!(target_os = "linux") {
        Ok(Arc::new(XprintidleSource))
    } else {
        Err(AutoclockError::SignalUnavailable(format!(
            "idle detection is not supported on {}",
            std::env::consts::OS
        ))
        .into())
    }
}

/// The lock source for this platform, if it has one.
pub fn lock_source() -> Option<Arc<dyn LockSource>> {
    if cfg!(target_os = "macos") {
        Some(Arc::new(IoregLockSource))
    } else if cfg!(target_os = "linux") {
        Some(Arc::new(LoginctlLockSource::from_env()))
    } else {
        None
    }
}
