//! Maintenance commands: purge, credentials and label assignments

use chrono::{DateTime, Duration, Utc};
use colored::Colorize;

use crate::commands::open_storage;
use crate::config::Config;
use crate::error::{AutoclockError, Result};
use crate::storage::{ProjectAssignment, SqliteStorage};
use crate::ticket::credentials::JiraCredentials;

/// Delete sessions that started more than `days` before `now`.
pub fn purge_sessions(storage: &SqliteStorage, days: i64, now: DateTime<Utc>) -> Result<usize> {
    if days < 0 {
        return Err(AutoclockError::InvalidInput("days must not be negative".to_string()).into());
    }
    storage.purge_older_than(now - Duration::days(days))
}

pub fn run_purge(config: &Config, days: Option<i64>) -> Result<()> {
    let storage = open_storage(config)?;
    let days = days.unwrap_or(config.storage.retention_days);
    let removed = purge_sessions(&storage, days, Utc::now())?;
    println!(
        "{}",
        format!("Removed {} session(s) older than {} day(s)", removed, days).green()
    );
    Ok(())
}

pub fn run_auth(config: &Config, api_key: &str) -> Result<()> {
    let api_key = api_key.trim();
    if api_key.is_empty() {
        return Err(AutoclockError::InvalidInput("API key must not be empty".to_string()).into());
    }
    let storage = open_storage(config)?;
    storage.append_token(api_key, Utc::now())?;
    println!("{}", "API key saved.".green());
    Ok(())
}

pub fn run_assign(config: &Config, label: &str, project: Option<String>, skip: bool) -> Result<()> {
    let assignment = match (project, skip) {
        (_, true) => ProjectAssignment::Skip,
        (Some(project), false) => ProjectAssignment::Project(project),
        (None, false) => {
            return Err(AutoclockError::InvalidInput(
                "give a project id or --skip".to_string(),
            )
            .into())
        }
    };

    let storage = open_storage(config)?;
    storage.set_event_assignment(label, &assignment)?;
    match assignment {
        ProjectAssignment::Project(project) => {
            println!("{} -> {}", label.cyan(), project.green())
        }
        ProjectAssignment::Skip => println!("{} -> {}", label.cyan(), "skip".yellow()),
    }
    Ok(())
}

pub fn run_jira_login(email: &str, token: &str) -> Result<()> {
    if email.trim().is_empty() || token.trim().is_empty() {
        return Err(AutoclockError::InvalidInput("email and token are required".to_string()).into());
    }
    JiraCredentials.save_token(email.trim(), token.trim())?;
    println!("{}", format!("Jira token saved for {}", email.trim()).green());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::record_session_start;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.storage.db_path = Some(dir.path().join("s.db"));
        config
    }

    #[test]
    fn test_purge_sessions_by_days() {
        let dir = TempDir::new().unwrap();
        let storage = SqliteStorage::new_with_path(dir.path().join("s.db")).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();

        record_session_start(&storage, None, "old", now - Duration::days(6), None).unwrap();
        record_session_start(&storage, None, "new", now - Duration::days(1), None).unwrap();

        assert_eq!(purge_sessions(&storage, 5, now).unwrap(), 1);
        let left = storage.list_sessions(10).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].description, "new");
        assert!(purge_sessions(&storage, -1, now).is_err());
    }

    #[test]
    fn test_auth_appends_token() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        run_auth(&config, "  key-1 ").unwrap();
        run_auth(&config, "key-2").unwrap();

        let storage = open_storage(&config).unwrap();
        assert_eq!(storage.latest_token().unwrap().unwrap().token, "key-2");
        assert!(run_auth(&config, " ").is_err());
    }

    #[test]
    fn test_assign_project_then_skip() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        run_assign(&config, "Standup", Some("proj-1".to_string()), false).unwrap();
        run_assign(&config, "Standup", None, true).unwrap();

        let storage = open_storage(&config).unwrap();
        assert_eq!(
            storage.get_event_assignment("Standup").unwrap(),
            Some(ProjectAssignment::Skip)
        );
        assert!(run_assign(&config, "Other", None, false).is_err());
    }

    #[test]
    fn test_jira_login_rejects_blank_input() {
        assert!(run_jira_login("", "tok").is_err());
        assert!(run_jira_login("me@x.io", " ").is_err());
    }
}
