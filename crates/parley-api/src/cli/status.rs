//! Status dashboard and model listing commands.

use anyhow::Result;
use console::style;

use crate::state::AppState;

/// Display configuration and check that the completion service answers.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let sessions = state.context.session_summaries().await;
    let messages: usize = sessions.iter().map(|s| s.message_count).sum();
    let connection = state.context.orchestrator().check_connection().await;

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "persistent": state.context.is_persistent(),
            "provider": {
                "base_url": state.config.provider.base_url,
                "api_key_env": state.config.provider.api_key_env,
                "api_key_set": state.has_api_key,
                "reachable": connection.is_ok(),
                "error": connection.as_ref().err().map(|e| e.to_string()),
            },
            "model": state.model(),
            "sessions": sessions.len(),
            "messages": messages,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!("  {} Parley v{}", style("⚡").bold(), env!("CARGO_PKG_VERSION"));
    println!();

    println!("  {}", style("── Provider ──").dim());
    println!("  Endpoint: {}", style(&state.config.provider.base_url).cyan());
    println!("  Model:    {}", style(state.model()).bold());
    let key_status = if state.has_api_key {
        style("set".to_string()).green()
    } else {
        style(format!("missing (export {})", state.config.provider.api_key_env)).red()
    };
    println!("  API key:  {key_status}");
    match &connection {
        Ok(()) => println!("  Status:   {}", style("reachable").green()),
        Err(e) => println!("  Status:   {} {}", style("unreachable").red(), style(e).dim()),
    }
    println!();

    println!("  {}", style("── Sessions ──").dim());
    println!("  Sessions: {}", style(sessions.len()).bold());
    println!("  Messages: {messages}");
    println!();

    println!("  {}", style("── System ──").dim());
    println!("  Data dir: {}", style(state.data_dir.display()).dim());
    let storage = if state.context.is_persistent() {
        "SQLite (WAL mode)"
    } else {
        "in-memory"
    };
    println!("  Storage:  {}", style(storage).dim());
    println!();

    Ok(())
}

/// List the models the service offers, marking the configured presets.
///
/// Falls back to the presets alone when the service cannot be reached.
pub async fn list_models(state: &AppState, json: bool) -> Result<()> {
    let presets = state.config.models.all();
    let (models, offline) = match state.context.orchestrator().list_models().await {
        Ok(models) => (models, None),
        Err(e) => {
            tracing::warn!(error = %e, "model listing failed; showing configured presets");
            (presets.clone(), Some(e.to_string()))
        }
    };

    if json {
        let body = serde_json::json!({
            "models": models,
            "presets": {
                "chat": state.config.models.chat,
                "reasoning": state.config.models.reasoning,
                "coding": state.config.models.coding,
                "fallback": state.config.models.fallback,
            },
            "error": offline,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!();
    if let Some(error) = &offline {
        println!(
            "  {} Could not reach the service ({error}); showing configured presets.",
            style("!").yellow().bold()
        );
        println!();
    }
    for model in &models {
        let marker = if model == state.model() {
            style("●").green().to_string()
        } else if presets.contains(model) {
            style("○").cyan().to_string()
        } else {
            " ".to_string()
        };
        println!("  {marker} {model}");
    }
    println!();
    println!(
        "  {} model{}",
        style(models.len()).bold(),
        if models.len() == 1 { "" } else { "s" }
    );
    println!();
    Ok(())
}
