//! autoclock - presence-aware time tracking library
//!
//! This library keeps a remote time-tracking timer in step with whether
//! someone is actually at the machine: it stops the timer when the session
//! goes idle or locks and resumes the interrupted work when activity
//! returns.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `storage`: SQLite session log, label assignments and API tokens
//! - `remote`: Remote timer trait, Clockify client and an in-memory fake
//! - `presence`: Idle and lock-state sources
//! - `reconcile`: Per-axis state machines, resume policy and tickers
//! - `ticket`: Work-log collaborator (Jira) for ticket-linked sessions
//! - `commands`: CLI command handlers
//! - `config`: Configuration management and validation
//! - `logging`: Tracing subscriber setup
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use autoclock::Config;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml", &Default::default())?;
//!     config.validate()?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod presence;
pub mod reconcile;
pub mod remote;
pub mod storage;
pub mod ticket;

// Re-export commonly used types
pub use config::Config;
pub use error::{AutoclockError, Result};
pub use reconcile::{Axis, AxisState, Controller, ControllerSettings, ResumeOutcome};
pub use remote::{TimerClient, TimerScope};
pub use storage::{Session, SqliteStorage};
