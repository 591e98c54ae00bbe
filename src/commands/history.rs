use crate::commands::open_storage;
use crate::config::Config;
use crate::error::Result;
use crate::storage::Session;
use chrono::{Local, Utc};
use colored::Colorize;
use prettytable::{format, Table};

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let kept: String = text.chars().take(max - 3).collect();
        format!("{}...", kept)
    } else {
        text.to_string()
    }
}

/// Render sessions as a table, newest first.
pub fn render_sessions(sessions: &[Session]) -> Table {
    let now = Utc::now();
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

    table.add_row(prettytable::row![
        "ID".bold(),
        "Description".bold(),
        "Project".bold(),
        "Ticket".bold(),
        "Started".bold(),
        "Duration".bold(),
        "End".bold()
    ]);

    for session in sessions {
        let id_short: String = session.id.chars().take(8).collect();
        let minutes = session.elapsed(now).num_minutes().max(0);
        let duration = format!("{}h{:02}m", minutes / 60, minutes % 60);
        let end = match (session.completed_at, session.auto_completed) {
            (None, _) => "running".green(),
            (Some(_), true) => "auto".yellow(),
            (Some(_), false) => "stopped".normal(),
        };

        let description = truncate(&session.description, 40);
        let project = session.project_id.as_deref().unwrap_or("-");
        let ticket = session.ticket_ref.as_deref().unwrap_or("-");
        let started = session
            .started_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M")
            .to_string();

        table.add_row(prettytable::row![
            id_short.cyan(),
            description,
            project,
            ticket,
            started,
            duration,
            end
        ]);
    }
    table
}

/// Print the most recent sessions
pub fn show_log(config: &Config, limit: usize) -> Result<()> {
    let storage = open_storage(config)?;
    let sessions = storage.list_sessions(limit)?;

    if sessions.is_empty() {
        println!("{}", "No sessions recorded.".yellow());
        return Ok(());
    }

    println!("\nRecent sessions:");
    render_sessions(&sessions).printstd();
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 40), "short");
        let long = "x".repeat(50);
        assert_eq!(truncate(&long, 40).chars().count(), 40);
        assert!(truncate(&long, 40).ends_with("..."));
    }

    #[test]
    fn test_render_sessions_has_header_and_rows() {
        let started = Utc::now() - Duration::minutes(90);
        let sessions = vec![Session {
            id: "0123456789abcdef".to_string(),
            project_id: Some("proj".to_string()),
            description: "Review".to_string(),
            started_at: started,
            completed_at: Some(started + Duration::minutes(75)),
            auto_completed: true,
            ticket_ref: Some("OPS-1".to_string()),
        }];

        let table = render_sessions(&sessions);
        assert_eq!(table.len(), 2);
        let rendered = table.to_string();
        assert!(rendered.contains("01234567"));
        assert!(rendered.contains("1h15m"));
        assert!(rendered.contains("OPS-1"));
    }
}
