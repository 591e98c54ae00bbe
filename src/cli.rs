//! Command-line interface definition for autoclock
//!
//! This module defines the CLI structure using clap's derive API: explicit
//! start/stop commands, the presence watcher, and small maintenance
//! commands for the local session log.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// autoclock - presence-aware time tracking
///
/// Stops the running timer when you walk away and resumes it when you
/// come back.
#[derive(Parser, Debug, Clone)]
#[command(name = "autoclock")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Session database path (overrides config)
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start a timer and record the session
    Start {
        /// Remote project id; defaults to the assignment stored for the description
        #[arg(short, long)]
        project: Option<String>,

        /// Ticket to log the time against (e.g. OPS-42)
        #[arg(short, long)]
        ticket: Option<String>,

        /// What you are working on
        #[arg(required = true, trailing_var_arg = true)]
        description: Vec<String>,
    },

    /// Stop the running timer and close the open session
    Stop,

    /// Show the running timer and the open session
    Status,

    /// List recent sessions
    Log {
        /// Number of sessions to show
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },

    /// Watch presence and stop/resume the timer automatically
    Watch,

    /// Delete old sessions from the local log
    Purge {
        /// Delete sessions started more than this many days ago
        #[arg(long)]
        days: Option<i64>,
    },

    /// Save the remote service API key
    Auth {
        /// API key for the time-tracking service
        api_key: String,
    },

    /// Remember which project a recurring label belongs to
    Assign {
        /// Label, usually a calendar event title
        label: String,

        /// Project id to use for the label
        #[arg(required_unless_present = "skip", conflicts_with = "skip")]
        project: Option<String>,

        /// Never track this label
        #[arg(long)]
        skip: bool,
    },

    /// Save a Jira API token in the OS keyring
    JiraLogin {
        /// Jira account email
        #[arg(long)]
        email: String,

        /// Jira API token
        token: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            db: None,
            command: Commands::Status,
        }
    }
}
