//! Parley CLI and REST API entry point.
//!
//! Binary name: `parley`
//!
//! Parses CLI arguments, initializes the chat context, then dispatches to the
//! appropriate command handler or starts the REST API server.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;
use console::style;

use parley_observe::tracing_setup::{init_tracing, shutdown_tracing, LogOptions};

use cli::{Cli, Commands, SessionCommand};
use state::{AppState, InitOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut log_options = LogOptions::cli(cli.verbose > 0);
    if cli.quiet {
        log_options.default_filter = "error".to_string();
    } else if cli.verbose > 1 {
        log_options.default_filter = "trace".to_string();
    } else if matches!(cli.command, Commands::Serve { .. }) && cli.verbose == 0 {
        log_options.default_filter = "info".to_string();
    }
    if let Err(e) = init_tracing(&log_options) {
        eprintln!("Warning: failed to initialize logging: {e}");
    }

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "parley", &mut std::io::stdout());
        return Ok(());
    }

    let model = match &cli.command {
        Commands::Chat { model, .. } | Commands::Ask { model, .. } => model.clone(),
        _ => None,
    };
    let state = AppState::init(&InitOptions {
        model,
        ephemeral: cli.ephemeral,
    })
    .await?;

    let result = run(cli, state.clone()).await;
    state.close().await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli, state: AppState) -> anyhow::Result<()> {
    match cli.command {
        Commands::Chat { session, .. } => {
            let session = session.as_deref().map(cli::parse_session_id).transpose()?;
            cli::chat::loop_runner::run_chat_loop(&state, session).await?;
        }

        Commands::Ask { question, .. } => {
            cli::ask::ask(&state, &question, cli.json, cli.quiet).await?;
        }

        Commands::Sessions { action } => match action {
            SessionCommand::List => {
                cli::session::list_sessions(&state, cli.json).await?;
            }
            SessionCommand::Show { id } => {
                let id = cli::parse_session_id(&id)?;
                cli::session::show_session(&state, &id, cli.json).await?;
            }
            SessionCommand::Delete { id, force } => {
                let id = cli::parse_session_id(&id)?;
                cli::session::delete_session(&state, &id, force, cli.json).await?;
            }
        },

        Commands::Models => {
            cli::status::list_models(&state, cli.json).await?;
        }

        Commands::Status => {
            cli::status::status(&state, cli.json).await?;
        }

        Commands::Serve { host, port } => {
            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            let router = http::router::build_router(state);

            if !cli.quiet {
                println!();
                println!(
                    "  {} Parley API listening on {}",
                    style("▶").green().bold(),
                    style(format!("http://{addr}")).cyan()
                );
                println!("  {}", style("Press Ctrl+C to stop").dim());
                println!();
            }
            tracing::info!(%addr, "server started");

            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            tracing::info!("server stopped");
        }

        // Handled before state init
        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
