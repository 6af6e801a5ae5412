//! Session management CLI commands: list, show, delete.

use std::io::Write;

use anyhow::Result;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use dialoguer::Confirm;

use parley_types::chat::{ChatMessage, ChatRole, MessageStatus, SessionId};

use crate::state::AppState;

/// List sessions, most recently active first.
///
/// # Examples
///
/// ```bash
/// parley sessions list
/// parley sessions list --json
/// ```
pub async fn list_sessions(state: &AppState, json: bool) -> Result<()> {
    let sessions = state.context.session_summaries().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!();
        println!(
            "  {} No sessions yet. Start one with: {}",
            style("i").blue().bold(),
            style("parley chat").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Title").fg(Color::White),
        Cell::new("Id").fg(Color::White),
        Cell::new("Messages").fg(Color::White),
        Cell::new("Last Active").fg(Color::White),
        Cell::new("Status").fg(Color::White),
    ]);

    for session in &sessions {
        let status_cell = if session.busy {
            Cell::new("● streaming").fg(Color::Yellow)
        } else if session.error.is_some() {
            Cell::new("✗ error").fg(Color::Red)
        } else {
            Cell::new("○ idle").fg(Color::Green)
        };

        table.add_row(vec![
            Cell::new(truncate(&session.title, 40)).fg(Color::Cyan),
            Cell::new(session.id.to_string()).fg(Color::DarkGrey),
            Cell::new(session.message_count.to_string()).fg(Color::White),
            Cell::new(format_relative_time(&session.updated_at)).fg(Color::DarkGrey),
            status_cell,
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} session{}",
        style(sessions.len()).bold(),
        if sessions.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}

/// Print a session's transcript.
pub async fn show_session(state: &AppState, id: &SessionId, json: bool) -> Result<()> {
    let session = state.context.get_session(id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&session)?);
        return Ok(());
    }

    println!();
    println!("  {}", style(&session.title).cyan().bold());
    println!(
        "  {}",
        style(format!(
            "{} · started {}",
            session.id,
            session.created_at.format("%Y-%m-%d %H:%M")
        ))
        .dim()
    );
    println!();

    if session.messages.is_empty() {
        println!("  {}", style("(no messages)").dim());
        println!();
    }
    let mut stdout = std::io::stdout().lock();
    for message in &session.messages {
        write_message(&mut stdout, message)?;
    }
    drop(stdout);

    if let Some(error) = &session.error {
        println!("  {} {}", style("!").red().bold(), style(error).red());
        println!();
    }
    Ok(())
}

/// Delete a session, asking for confirmation unless `force` is set.
pub async fn delete_session(state: &AppState, id: &SessionId, force: bool, json: bool) -> Result<()> {
    let session = state.context.get_session(id).await?;

    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete '{}' ({} messages)?",
                session.title,
                session.messages.len()
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("  {}", style("Cancelled.").dim());
            return Ok(());
        }
    }

    state.context.delete_session(id).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "deleted": id }))?
        );
    } else {
        println!();
        println!(
            "  {} Deleted '{}'",
            style("✓").green().bold(),
            style(&session.title).cyan()
        );
        println!();
    }
    Ok(())
}

/// Write one transcript entry. Line endings are left to the writer.
pub(crate) fn write_message(out: &mut impl Write, message: &ChatMessage) -> std::io::Result<()> {
    let label = match message.role {
        ChatRole::User => style("You").green().bold(),
        ChatRole::Assistant => style("Assistant").cyan().bold(),
    };
    let marker = match message.status {
        MessageStatus::Final => String::new(),
        other => format!(" {}", style(format!("[{other}]")).yellow()),
    };

    writeln!(out, "  {label}{marker}")?;
    for line in message.content.lines() {
        writeln!(out, "    {line}")?;
    }
    writeln!(out)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars - 3).collect();
    format!("{cut}...")
}

fn format_relative_time(at: &chrono::DateTime<chrono::Utc>) -> String {
    let elapsed = chrono::Utc::now().signed_duration_since(*at);
    if elapsed.num_seconds() < 60 {
        "just now".to_string()
    } else if elapsed.num_minutes() < 60 {
        format!("{}m ago", elapsed.num_minutes())
    } else if elapsed.num_hours() < 24 {
        format!("{}h ago", elapsed.num_hours())
    } else if elapsed.num_days() < 30 {
        format!("{}d ago", elapsed.num_days())
    } else {
        at.format("%Y-%m-%d").to_string()
    }
}
