//! autoclock - presence-aware time tracking
//!
//! Main entry point for the autoclock command-line tool.

use anyhow::Result;

use autoclock::cli::{Cli, Commands};
use autoclock::commands;
use autoclock::commands::timer::StartRequest;
use autoclock::config::Config;
use autoclock::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    init_logging(&config.logging)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Start {
            project,
            ticket,
            description,
        } => {
            tracing::info!("Starting timer");
            let request = StartRequest {
                project,
                ticket,
                description: description.join(" "),
            };
            commands::timer::run_start(&config, request).await
        }
        Commands::Stop => {
            tracing::info!("Stopping timer");
            commands::timer::run_stop(&config).await
        }
        Commands::Status => commands::timer::run_status(&config).await,
        Commands::Log { limit } => commands::history::show_log(&config, limit),
        Commands::Watch => {
            tracing::info!("Starting presence watcher");
            commands::watch::run_watch(config).await
        }
        Commands::Purge { days } => commands::admin::run_purge(&config, days),
        Commands::Auth { api_key } => commands::admin::run_auth(&config, &api_key),
        Commands::Assign {
            label,
            project,
            skip,
        } => commands::admin::run_assign(&config, &label, project, skip),
        Commands::JiraLogin { email, token } => commands::admin::run_jira_login(&email, &token),
    }
}
