//! Welcome banner display for chat sessions.

use console::style;

/// Print the welcome banner at the start of a chat.
///
/// `session_id` is `None` until the first message creates the session.
pub fn print_welcome_banner(title: &str, model: &str, session_id: Option<&str>, persistent: bool) {
    println!();
    println!("  {} {}", style("*").cyan().bold(), style(title).cyan().bold());
    println!();
    println!("  {}  {}", style("Model:").bold(), style(model).dim());
    println!(
        "  {}  {}",
        style("Session:").bold(),
        style(session_id.map_or("new", |id| &id[..8.min(id.len())])).dim()
    );
    if !persistent {
        println!(
            "  {}  {}",
            style("Storage:").bold(),
            style("in-memory, nothing is saved").yellow()
        );
    }
    println!();
    println!(
        "  {}",
        style("Type /help for commands, Ctrl+C to stop a reply, Ctrl+D to exit").dim()
    );
    println!("  {}", style("---").dim());
    println!();
}
