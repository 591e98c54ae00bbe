//! Clockify implementation of [`TimerClient`]
//!
//! Talks to the Clockify REST API with the `X-Api-Key` header. The API key is
//! the latest token appended to the session store by `autoclock auth`.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::RemoteConfig;
use crate::error::{AutoclockError, Result};
use crate::remote::{Timer, TimerClient, TimerScope};
use crate::storage::SqliteStorage;

const API_KEY_HEADER: &str = "X-Api-Key";

/// Clockify REST client
pub struct ClockifyClient {
    client: Client,
    api_base: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserResponse {
    id: String,
    active_workspace: Option<String>,
    default_workspace: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimeEntryResponse {
    id: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    project_id: Option<String>,
    time_interval: TimeInterval,
}

#[derive(Debug, Deserialize)]
struct TimeInterval {
    start: DateTime<Utc>,
    #[serde(default)]
    end: Option<DateTime<Utc>>,
}

impl From<TimeEntryResponse> for Timer {
    fn from(entry: TimeEntryResponse) -> Self {
        Timer {
            id: entry.id,
            project_id: entry.project_id,
            description: entry.description.unwrap_or_default(),
            started_at: entry.time_interval.start,
            stopped_at: entry.time_interval.end,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartRequest<'a> {
    start: String,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct StopRequest {
    end: String,
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn transport(context: &str, err: impl std::fmt::Display) -> AutoclockError {
    AutoclockError::Transport(format!("{}: {}", context, err))
}

/// Turn a non-success response into a transport error carrying the body.
async fn ensure_success(response: Response, context: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::error!("Clockify returned error {}: {}", status, body);
    Err(AutoclockError::Transport(format!("{} failed ({}): {}", context, status, body)).into())
}

impl ClockifyClient {
    /// Create a client for `api_base` authenticating with `api_key`.
    ///
    /// `timeout` bounds each HTTP request.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use autoclock::remote::ClockifyClient;
    ///
    /// let client = ClockifyClient::new("https://api.clockify.me/api/v1", "key", Duration::from_secs(10));
    /// assert!(client.is_ok());
    /// ```
    pub fn new(api_base: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("autoclock/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| transport("Failed to create HTTP client", e))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Create a client using the most recent API key saved in the store.
    ///
    /// # Errors
    ///
    /// Returns [`AutoclockError::MissingCredentials`] when no key was saved.
    pub fn from_storage(config: &RemoteConfig, storage: &SqliteStorage) -> Result<Self> {
        let token = storage.latest_token()?.ok_or_else(|| {
            AutoclockError::MissingCredentials(
                "Clockify (run `autoclock auth <API_KEY>` first)".to_string(),
            )
        })?;
        Self::new(&config.api_base, &token.token, config.timeout())
    }

    /// Resolve the workspace and user to track time for.
    ///
    /// Ids pinned in the config win; anything missing is read from the
    /// authenticated user's profile.
    pub async fn resolve_scope(&self, config: &RemoteConfig) -> Result<TimerScope> {
        if let (Some(workspace_id), Some(user_id)) = (&config.workspace_id, &config.user_id) {
            return Ok(TimerScope {
                workspace_id: workspace_id.clone(),
                user_id: user_id.clone(),
            });
        }

        let response = self
            .client
            .get(format!("{}/user", self.api_base))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| transport("Failed to reach Clockify", e))?;
        let user: UserResponse = ensure_success(response, "Fetching user")
            .await?
            .json()
            .await
            .map_err(|e| transport("Failed to parse user", e))?;

        let workspace_id = config
            .workspace_id
            .clone()
            .or(user.active_workspace)
            .or(user.default_workspace)
            .ok_or_else(|| AutoclockError::Config("No Clockify workspace available".to_string()))?;

        Ok(TimerScope {
            workspace_id,
            user_id: config.user_id.clone().unwrap_or(user.id),
        })
    }

    fn user_entries_url(&self, scope: &TimerScope) -> String {
        format!(
            "{}/workspaces/{}/user/{}/time-entries",
            self.api_base, scope.workspace_id, scope.user_id
        )
    }
}

#[async_trait]
impl TimerClient for ClockifyClient {
    async fn active_timer(&self, scope: &TimerScope) -> Result<Option<Timer>> {
        let response = self
            .client
            .get(self.user_entries_url(scope))
            .query(&[("in-progress", "true")])
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| transport("Failed to reach Clockify", e))?;

        let entries: Vec<TimeEntryResponse> = ensure_success(response, "Fetching active timer")
            .await?
            .json()
            .await
            .map_err(|e| transport("Failed to parse time entries", e))?;

        Ok(entries.into_iter().next().map(Timer::from))
    }

    async fn start_timer(
        &self,
        scope: &TimerScope,
        project_id: Option<&str>,
        description: &str,
    ) -> Result<Timer> {
        let body = StartRequest {
            start: timestamp(Utc::now()),
            description,
            project_id,
        };

        let response = self
            .client
            .post(format!(
                "{}/workspaces/{}/time-entries",
                self.api_base, scope.workspace_id
            ))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport("Failed to reach Clockify", e))?;

        let entry: TimeEntryResponse = ensure_success(response, "Starting timer")
            .await?
            .json()
            .await
            .map_err(|e| transport("Failed to parse started timer", e))?;

        tracing::debug!(timer_id = %entry.id, "Started remote timer");
        Ok(entry.into())
    }

    async fn stop_timer(&self, scope: &TimerScope, at: DateTime<Utc>) -> Result<Option<Timer>> {
        let response = self
            .client
            .patch(self.user_entries_url(scope))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&StopRequest { end: timestamp(at) })
            .send()
            .await
            .map_err(|e| transport("Failed to reach Clockify", e))?;

        // Clockify answers 404 when there is no running timer to stop.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let entry: TimeEntryResponse = ensure_success(response, "Stopping timer")
            .await?
            .json()
            .await
            .map_err(|e| transport("Failed to parse stopped timer", e))?;

        tracing::debug!(timer_id = %entry.id, "Stopped remote timer");
        Ok(Some(entry.into()))
    }
}
