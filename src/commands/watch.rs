//! Presence watcher command
//!
//! Opens the store once, purges sessions past retention, probes the
//! presence sources and runs the reconciliation controller until Ctrl-C
//! (or SIGTERM on unix).

use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::commands::{open_storage, ticket_logger};
use crate::config::{Config, RemoteConfig};
use crate::error::{AutoclockError, Result};
use crate::presence::PresenceSources;
use crate::reconcile::{Controller, ControllerSettings};
use crate::remote::{ClockifyClient, TimerScope};

/// Cancel `token` on the first termination signal.
async fn cancel_on_signal(token: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM; only Ctrl-C stops the watcher");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("Shutdown requested");
    token.cancel();
}

/// Resolve the timer scope, retrying every `retry` while the service is
/// unreachable.
///
/// Returns `None` when `token` is cancelled first. Errors other than
/// transport failures are returned at once.
pub async fn resolve_scope_until_ready(
    client: &ClockifyClient,
    config: &RemoteConfig,
    retry: std::time::Duration,
    token: &CancellationToken,
) -> Result<Option<TimerScope>> {
    let mut attempts: u32 = 0;
    loop {
        match client.resolve_scope(config).await {
            Ok(scope) => return Ok(Some(scope)),
            Err(e)
                if e.downcast_ref::<AutoclockError>()
                    .map(AutoclockError::is_transport)
                    .unwrap_or(false) =>
            {
                attempts += 1;
                warn!(
                    attempt = attempts,
                    retry_ms = retry.as_millis() as u64,
                    error = %e,
                    "Cannot reach Clockify to resolve workspace; retrying"
                );
            }
            Err(e) => return Err(e),
        }

        tokio::select! {
            _ = token.cancelled() => return Ok(None),
            _ = tokio::time::sleep(retry) => {}
        }
    }
}

pub async fn run_watch(config: Config) -> Result<()> {
    let storage = Arc::new(open_storage(&config)?);

    let cutoff = Utc::now() - Duration::days(config.storage.retention_days);
    let purged = storage.purge_older_than(cutoff)?;
    if purged > 0 {
        info!(purged, retention_days = config.storage.retention_days, "Purged old sessions");
    }

    let client = ClockifyClient::from_storage(&config.remote, &storage)?;
    let tickets = ticket_logger(&config)?;
    let sources = PresenceSources::probe(config.presence.lock_detection).await?;
    let settings = ControllerSettings::from_config(&config.presence, &config.remote);

    let token = CancellationToken::new();
    let signal_task = tokio::spawn(cancel_on_signal(token.clone()));

    let scope = match resolve_scope_until_ready(&client, &config.remote, settings.idle_poll, &token).await {
        Ok(Some(scope)) => scope,
        Ok(None) => {
            signal_task.abort();
            info!("Watcher stopped before connecting");
            return Ok(());
        }
        Err(e) => {
            signal_task.abort();
            return Err(e);
        }
    };

    let mut controller = Controller::new(storage.clone(), Arc::new(client), scope, settings);
    if let Some(tickets) = tickets {
        controller = controller.with_ticket_logger(tickets);
    }

    info!(
        idle_threshold_seconds = config.presence.idle_threshold_seconds,
        lock_axis = sources.lock.is_some(),
        db = %storage.db_path().display(),
        "Watching presence"
    );
    let result = Arc::new(controller).run(sources, token).await;

    signal_task.abort();
    info!("Watcher stopped");
    result
}
