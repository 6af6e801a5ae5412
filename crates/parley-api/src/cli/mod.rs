//! CLI command definitions for the `parley` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod ask;
pub mod chat;
pub mod session;
pub mod status;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Chat with an OpenAI-compatible model from the terminal or over HTTP.
#[derive(Parser)]
#[command(name = "parley", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Keep sessions in memory only; nothing is read from or written to disk.
    #[arg(long, global = true)]
    pub ephemeral: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive chat.
    Chat {
        /// Resume an existing session.
        #[arg(long)]
        session: Option<String>,

        /// Model id or preset (chat, reasoning, coding, fallback).
        #[arg(long, short)]
        model: Option<String>,
    },

    /// Ask a single question without creating a session.
    Ask {
        /// The question to send.
        question: String,

        /// Model id or preset (chat, reasoning, coding, fallback).
        #[arg(long, short)]
        model: Option<String>,
    },

    /// Manage stored chat sessions.
    Sessions {
        #[command(subcommand)]
        action: SessionCommand,
    },

    /// List the models the completion service offers.
    Models,

    /// Show configuration and check the completion service.
    Status,

    /// Start the REST API server.
    Serve {
        /// Address to bind.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on.
        #[arg(long, default_value_t = 3000)]
        port: u16,
    },

    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum SessionCommand {
    /// List sessions, most recently active first.
    #[command(alias = "ls")]
    List,

    /// Print a session transcript.
    Show {
        /// Session id.
        id: String,
    },

    /// Delete a session.
    #[command(alias = "rm")]
    Delete {
        /// Session id.
        id: String,

        /// Skip the confirmation prompt.
        #[arg(long, short)]
        force: bool,
    },
}

/// Parse a session id argument.
pub fn parse_session_id(raw: &str) -> anyhow::Result<parley_types::chat::SessionId> {
    raw.trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("'{raw}' is not a valid session id"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_chat_with_session_and_model() {
        let cli = Cli::try_parse_from(["parley", "chat", "--session", "abc", "-m", "reasoning"]).unwrap();
        match cli.command {
            Commands::Chat { session, model } => {
                assert_eq!(session.as_deref(), Some("abc"));
                assert_eq!(model.as_deref(), Some("reasoning"));
            }
            _ => panic!("expected chat command"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["parley", "sessions", "list", "--json", "-vv"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Commands::Sessions { action: SessionCommand::List }
        ));
    }

    #[test]
    fn serve_defaults() {
        let cli = Cli::try_parse_from(["parley", "serve"]).unwrap();
        match cli.command {
            Commands::Serve { host, port } => {
                assert_eq!(host, "127.0.0.1");
                assert_eq!(port, 3000);
            }
            _ => panic!("expected serve command"),
        }
    }

    #[test]
    fn session_id_parsing() {
        let id = parley_types::chat::SessionId::new();
        assert_eq!(parse_session_id(&format!(" {id} ")).unwrap(), id);
        assert!(parse_session_id("not-a-uuid").is_err());
    }
}
