//! Slash command parsing for the chat loop.

use std::io::Write;

use console::style;

/// Available slash commands in the chat loop.
#[derive(Debug, PartialEq)]
pub enum ChatCommand {
    /// Show available commands.
    Help,
    /// Clear the terminal screen.
    Clear,
    /// Exit the chat.
    Exit,
    /// Start a fresh session.
    New,
    /// Show the transcript of this session.
    History,
    /// Rename this session.
    Title(String),
    /// List sessions.
    Sessions,
    /// Unknown command, or a known one with bad arguments.
    Unknown(String),
}

/// Parse user input as a slash command.
///
/// Returns `None` if the input doesn't start with `/`.
pub fn parse(input: &str) -> Option<ChatCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (cmd, arg) = match trimmed.split_once(char::is_whitespace) {
        Some((cmd, arg)) => (cmd.to_lowercase(), arg.trim()),
        None => (trimmed.to_lowercase(), ""),
    };

    match cmd.as_str() {
        "/help" | "/h" | "/?" => Some(ChatCommand::Help),
        "/clear" | "/cls" => Some(ChatCommand::Clear),
        "/exit" | "/quit" | "/q" => Some(ChatCommand::Exit),
        "/new" => Some(ChatCommand::New),
        "/history" => Some(ChatCommand::History),
        "/sessions" | "/ls" => Some(ChatCommand::Sessions),
        "/title" if arg.is_empty() => Some(ChatCommand::Unknown("/title requires a title".to_string())),
        "/title" => Some(ChatCommand::Title(arg.to_string())),
        other => Some(ChatCommand::Unknown(other.to_string())),
    }
}

/// Write the help text listing all available commands.
pub fn write_help(out: &mut impl Write) -> std::io::Result<()> {
    let entries = [
        ("/help", "Show this help message"),
        ("/clear", "Clear the screen"),
        ("/exit", "End the chat"),
        ("/new", "Start a new session"),
        ("/history", "Show this session's messages"),
        ("/sessions", "List sessions"),
        ("/title <text>", "Rename this session"),
    ];

    writeln!(out)?;
    writeln!(out, "  {}", style("Available commands:").bold())?;
    writeln!(out)?;
    for (command, help) in entries {
        writeln!(out, "  {}  {help}", style(format!("{command:<14}")).cyan())?;
    }
    writeln!(out)?;
    writeln!(out, "  {}", style("Ctrl+C stops the current reply, Ctrl+D exits").dim())?;
    writeln!(out)
}
