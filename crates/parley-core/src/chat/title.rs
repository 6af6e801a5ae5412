//! Session titles derived from the opening message.
//!
//! Titles are taken from the text the user typed instead of asking the model,
//! so starting a conversation costs no extra completion request.

/// Maximum title length in characters.
pub const MAX_TITLE_CHARS: usize = 30;

/// Derive a session title from the first user message.
///
/// Whitespace runs collapse to single spaces, and text longer than
/// [`MAX_TITLE_CHARS`] is cut on a character boundary and marked with an
/// ellipsis. Returns `None` for blank input.
pub fn title_from_message(content: &str) -> Option<String> {
    let collapsed = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }

    if collapsed.chars().count() <= MAX_TITLE_CHARS {
        return Some(collapsed);
    }

    let cut: String = collapsed.chars().take(MAX_TITLE_CHARS).collect();
    Some(format!("{}...", cut.trim_end()))
}
