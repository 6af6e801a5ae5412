//! Main chat loop.
//!
//! Reads input, runs turns through the chat context, and prints fragments as
//! they arrive on the event bus. Input is still read while a reply streams,
//! so Ctrl+C can cancel it. All output goes through the readline writer to
//! keep the prompt intact.

use std::io::Write;
use std::time::Instant;

use anyhow::{Context, Result};
use console::style;
use rustyline_async::SharedWriter;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use parley_core::chat::title::title_from_message;
use parley_types::chat::{MessageStatus, SessionId};
use parley_types::error::ChatError;
use parley_types::event::ChatEvent;

use super::banner::print_welcome_banner;
use super::commands::{self, ChatCommand};
use super::input::{ChatInput, InputEvent};
use crate::cli::session::write_message;
use crate::state::AppState;

/// Messages of a resumed session replayed under the banner.
const RESUME_CONTEXT_MESSAGES: usize = 6;

/// What the loop should do once a reply has settled.
enum AfterReply {
    Continue,
    Exit,
}

/// Run the interactive chat until the user exits.
///
/// With `resume`, the conversation continues an existing session; otherwise
/// a session is created from the first message.
pub async fn run_chat_loop(state: &AppState, resume: Option<SessionId>) -> Result<()> {
    let ctx = &state.context;

    let mut session_id = None;
    let mut title = "New conversation".to_string();
    let mut recent = Vec::new();
    if let Some(id) = resume {
        let session = ctx.get_session(&id).await?;
        session_id = Some(session.id);
        title = session.title.clone();
        let skip = session.messages.len().saturating_sub(RESUME_CONTEXT_MESSAGES);
        recent = session.messages.into_iter().skip(skip).collect();
    }

    let id_text = session_id.map(|id| id.to_string());
    print_welcome_banner(&title, state.model(), id_text.as_deref(), ctx.is_persistent());

    let prompt = format!("  {} ", style("You >").green().bold());
    let (mut chat_input, mut out) =
        ChatInput::new(prompt).context("failed to initialize terminal input")?;

    for message in &recent {
        write_message(&mut out, message)?;
    }

    loop {
        let text = match chat_input.read_line().await {
            InputEvent::Eof => {
                writeln!(out, "\n  {}", style("Session ended.").dim())?;
                break;
            }
            InputEvent::Interrupted => {
                writeln!(out, "  {}", style("Press Ctrl+D to exit, or keep chatting.").dim())?;
                continue;
            }
            InputEvent::Message(text) if text.is_empty() => continue,
            InputEvent::Message(text) => text,
        };

        if let Some(command) = commands::parse(&text) {
            match command {
                ChatCommand::Help => commands::write_help(&mut out)?,
                ChatCommand::Clear => chat_input.clear(),
                ChatCommand::Exit => {
                    writeln!(out, "\n  {}", style("Session ended.").dim())?;
                    break;
                }
                ChatCommand::New => {
                    session_id = None;
                    writeln!(
                        out,
                        "\n  {} New session starts with your next message.\n",
                        style("*").cyan().bold()
                    )?;
                }
                ChatCommand::History => match session_id {
                    Some(id) => {
                        let session = ctx.get_session(&id).await?;
                        writeln!(out)?;
                        for message in &session.messages {
                            write_message(&mut out, message)?;
                        }
                    }
                    None => writeln!(out, "  {}", style("No messages yet.").dim())?,
                },
                ChatCommand::Sessions => write_sessions(state, session_id, &mut out).await?,
                ChatCommand::Title(new_title) => match session_id {
                    Some(id) => {
                        let session = ctx.rename_session(&id, new_title).await?;
                        writeln!(
                            out,
                            "\n  {} Renamed to {}\n",
                            style("✓").green().bold(),
                            style(&session.title).cyan()
                        )?;
                    }
                    None => writeln!(
                        out,
                        "  {}",
                        style("Send a message first; the session is created with it.").dim()
                    )?,
                },
                ChatCommand::Unknown(name) => writeln!(
                    out,
                    "\n  {} Unknown command: {}. Type /help for available commands.\n",
                    style("?").yellow().bold(),
                    style(name).dim()
                )?,
            }
            continue;
        }

        let id = match session_id {
            Some(id) => id,
            None => {
                let session = ctx.create_session(title_from_message(&text)).await;
                session_id = Some(session.id);
                session.id
            }
        };

        if let AfterReply::Exit = stream_reply(state, &mut chat_input, &mut out, id, text).await? {
            writeln!(out, "\n  {}", style("Session ended.").dim())?;
            break;
        }
    }

    chat_input.flush();
    Ok(())
}

/// Run one turn, printing fragments until the assistant message settles.
async fn stream_reply(
    state: &AppState,
    chat_input: &mut ChatInput,
    out: &mut SharedWriter,
    session_id: SessionId,
    text: String,
) -> Result<AfterReply> {
    let ctx = &state.context;
    let mut events = ctx.events().subscribe();

    let turn = match ctx.orchestrator().begin_turn(&session_id, text).await {
        Ok(turn) => turn,
        Err(ChatError::Busy(_)) => {
            writeln!(out, "  {}", style("Still answering the previous message.").yellow())?;
            return Ok(AfterReply::Continue);
        }
        Err(e) => return Err(e.into()),
    };
    let message_id = turn.assistant_message_id();
    let started = Instant::now();
    let mut task = tokio::spawn(turn.run());

    write!(out, "\n  {} ", style("Assistant").cyan().bold())?;

    let mut printed = String::new();
    let mut events_open = true;
    let mut after = AfterReply::Continue;

    // Events are polled first so every fragment is printed before the
    // finished turn is observed.
    let outcome = loop {
        tokio::select! {
            biased;
            event = events.recv(), if events_open => match event {
                Ok(ChatEvent::Fragment { message_id: id, text, .. }) if id == message_id => {
                    write!(out, "{text}")?;
                    printed.push_str(&text);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "chat loop lagged behind the event bus");
                }
                Err(RecvError::Closed) => events_open = false,
            },
            joined = &mut task => break joined.context("chat turn task failed")?,
            input = chat_input.read_line() => match input {
                InputEvent::Interrupted => {
                    ctx.cancel(&session_id).await?;
                }
                InputEvent::Eof => {
                    ctx.cancel(&session_id).await?;
                    after = AfterReply::Exit;
                }
                InputEvent::Message(_) => {
                    writeln!(out, "\n  {}", style("(still answering; Ctrl+C to stop)").dim())?;
                }
            },
        }
    };

    // Anything missed while lagging, or the fallback notice.
    if let Some(rest) = outcome.content.strip_prefix(printed.as_str()) {
        write!(out, "{rest}")?;
    }
    writeln!(out)?;

    match outcome.status {
        MessageStatus::Final | MessageStatus::Pending => {
            writeln!(
                out,
                "\n  {}\n",
                style(format!("{} · {:.1}s", state.model(), started.elapsed().as_secs_f64())).dim()
            )?;
        }
        MessageStatus::Cancelled => {
            writeln!(out, "\n  {}\n", style("(stopped)").dim())?;
        }
        MessageStatus::Failed => {
            let error = outcome.error.as_deref().unwrap_or("request failed");
            writeln!(out, "\n  {} {error}", style("!").red().bold())?;
            writeln!(out, "  {}\n", style("Type a message to retry, /exit to quit.").dim())?;
        }
    }

    Ok(after)
}

async fn write_sessions(state: &AppState, current: Option<SessionId>, out: &mut SharedWriter) -> Result<()> {
    let sessions = state.context.session_summaries().await;
    writeln!(out)?;
    if sessions.is_empty() {
        writeln!(out, "  {}", style("No sessions yet.").dim())?;
    }
    for session in &sessions {
        let marker = if Some(session.id) == current {
            style("●").green().to_string()
        } else {
            " ".to_string()
        };
        let id = session.id.to_string();
        writeln!(
            out,
            "  {marker} {}  {} {}",
            style(&id[..8]).dim(),
            session.title,
            style(format!("({} messages)", session.message_count)).dim()
        )?;
    }
    writeln!(out)?;
    Ok(())
}
