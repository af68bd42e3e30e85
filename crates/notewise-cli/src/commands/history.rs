use anyhow::Result;
use chrono::{DateTime, Utc};
use comfy_table::Cell;
use notewise_memory::{HistoryManager, MessageRole, NotewiseConfig};
use serde::Serialize;
use serde_json::json;

use crate::cli::HistoryCommands;
use crate::commands::utils::{format_timestamp, preview_text};
use crate::output::table::{new_table, print_table};
use crate::output::{OutputFormat, json::print_json};

#[derive(Debug, Serialize)]
struct SessionOverview {
    session_id: String,
    messages: usize,
    rounds: usize,
    has_summary: bool,
    last_message_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct MessageView {
    role: &'static str,
    content: String,
    timestamp: String,
}

pub async fn run(
    config: &NotewiseConfig,
    command: HistoryCommands,
    format: OutputFormat,
) -> Result<()> {
    // Inspection never rolls anything up, so no generator is needed.
    let manager = HistoryManager::from_config(config, None)?;
    match command {
        HistoryCommands::List => list_sessions(&manager, format).await,
        HistoryCommands::Show { session_id } => show_session(&manager, &session_id, format).await,
        HistoryCommands::Clear { session_id } => clear_session(&manager, &session_id, format).await,
    }
}

async fn list_sessions(manager: &HistoryManager, format: OutputFormat) -> Result<()> {
    let mut overviews = Vec::new();
    for session_id in manager.list_sessions()? {
        let log = manager.get_history(&session_id)?.load().await?;
        overviews.push(SessionOverview {
            messages: log.messages.len(),
            rounds: log.round_count(),
            has_summary: log.summary.is_some(),
            last_message_at: log.messages.last().map(|m| m.timestamp),
            session_id,
        });
    }

    if format.is_json() {
        return print_json(&overviews);
    }
    if overviews.is_empty() {
        println!("No sessions found in {}", manager.sessions_dir().display());
        return Ok(());
    }

    let mut table = new_table(&["Session", "Messages", "Rounds", "Summary", "Last message"]);
    for overview in overviews {
        table.add_row(vec![
            Cell::new(overview.session_id),
            Cell::new(overview.messages),
            Cell::new(overview.rounds),
            Cell::new(if overview.has_summary { "yes" } else { "no" }),
            Cell::new(format_timestamp(overview.last_message_at)),
        ]);
    }
    print_table(table)
}

async fn show_session(
    manager: &HistoryManager,
    session_id: &str,
    format: OutputFormat,
) -> Result<()> {
    let history = manager.get_history(session_id)?;
    let messages = history.read().await?;

    if format.is_json() {
        let views: Vec<MessageView> = messages
            .iter()
            .map(|m| MessageView {
                role: role_name(m.role),
                content: m.content.clone(),
                timestamp: m.timestamp.to_rfc3339(),
            })
            .collect();
        return print_json(&json!({ "session_id": session_id, "messages": views }));
    }

    if messages.is_empty() {
        println!("Session {session_id} has no history");
        return Ok(());
    }

    println!("Session: {session_id}");
    println!("File: {}", history.path().display());
    println!("Messages: {}", messages.len());
    println!();
    for message in &messages {
        println!(
            "[{}] {}: {}",
            format_timestamp(Some(message.timestamp)),
            message.role.label(),
            preview_text(&message.content, 200)
        );
    }
    Ok(())
}

async fn clear_session(
    manager: &HistoryManager,
    session_id: &str,
    format: OutputFormat,
) -> Result<()> {
    manager.get_history(session_id)?.clear().await?;

    if format.is_json() {
        return print_json(&json!({ "session_id": session_id, "cleared": true }));
    }
    println!("Cleared history for {session_id}");
    Ok(())
}

fn role_name(role: MessageRole) -> &'static str {
    match role {
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::System => "system",
    }
}
