//! One-shot question command.

use std::time::{Duration, Instant};

use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::state::AppState;

/// Spinner shown while waiting for the model.
pub fn thinking_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::default_spinner().template("  {spinner:.cyan} {msg}") {
        spinner.set_style(template);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Ask a single question outside any session and print the answer.
///
/// # Examples
///
/// ```bash
/// parley ask "What is a mutex?"
/// parley ask "Explain ownership" --model reasoning --json
/// ```
pub async fn ask(state: &AppState, question: &str, json: bool, quiet: bool) -> Result<()> {
    let spinner = (!json && !quiet).then(|| thinking_spinner("thinking..."));
    let started = Instant::now();

    let answer = state.context.orchestrator().ask(question).await;
    if let Some(spinner) = &spinner {
        spinner.finish_and_clear();
    }
    let answer = answer?;

    if json {
        let body = serde_json::json!({
            "model": state.model(),
            "question": question,
            "answer": answer,
            "response_ms": started.elapsed().as_millis() as u64,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!();
    println!("  {}", answer.trim());
    if !quiet {
        println!();
        println!(
            "  {}",
            style(format!(
                "{} · {:.1}s",
                state.model(),
                started.elapsed().as_secs_f64()
            ))
            .dim()
        );
    }
    println!();
    Ok(())
}
