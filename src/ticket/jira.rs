//! Jira work-log client

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::config::JiraConfig;
use crate::error::{AutoclockError, Result};
use crate::ticket::credentials::JiraCredentials;
use crate::ticket::TicketLogger;

/// Posts work-log entries to `/rest/api/2/issue/{key}/worklog`
pub struct JiraWorklogClient {
    client: Client,
    base_url: String,
    email: String,
    api_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WorklogRequest {
    started: String,
    time_spent_seconds: i64,
}

/// Jira wants `2026-03-02T09:00:00.000+0000`.
fn jira_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.3f%z").to_string()
}

impl JiraWorklogClient {
    pub fn new(base_url: &str, email: &str, api_token: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AutoclockError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            email: email.to_string(),
            api_token: api_token.to_string(),
        })
    }

    /// Build a client from config and the token saved in the OS keyring.
    ///
    /// Returns `Ok(None)` when Jira is configured but no token has been saved
    /// yet, so the caller can run without work-log support.
    pub fn from_config(config: &JiraConfig, timeout: Duration) -> Result<Option<Self>> {
        match JiraCredentials.load_token(&config.email)? {
            Some(token) => Ok(Some(Self::new(&config.base_url, &config.email, &token, timeout)?)),
            None => {
                tracing::warn!(email = %config.email, "No Jira token saved; ticket work logging disabled");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl TicketLogger for JiraWorklogClient {
    async fn log_work(&self, ticket: &str, started_at: DateTime<Utc>, seconds: i64) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/rest/api/2/issue/{}/worklog", self.base_url, ticket))
            .basic_auth(&self.email, Some(&self.api_token))
            .json(&WorklogRequest {
                started: jira_timestamp(started_at),
                time_spent_seconds: seconds,
            })
            .send()
            .await
            .map_err(|e| AutoclockError::Transport(format!("Failed to reach Jira: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AutoclockError::Transport(format!(
                "Jira work-log for {} failed ({}): {}",
                ticket, status, body
            ))
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_jira_timestamp_format() {
        let at = Utc.with_ymd_and_hms(2026, 3, 2, 9, 5, 7).unwrap();
        assert_eq!(jira_timestamp(at), "2026-03-02T09:05:07.000+0000");
    }

    #[test]
    fn test_worklog_request_serialization() {
        let body = WorklogRequest {
            started: "x".to_string(),
            time_spent_seconds: 90,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["timeSpentSeconds"], 90);
        assert_eq!(json["started"], "x");
    }
}
