//! Interactive CLI chat.
//!
//! Streams assistant replies into the terminal as fragments arrive, with
//! slash commands and Ctrl+C cancellation of the in-flight reply. Entry point:
//! `loop_runner::run_chat_loop`.

pub mod banner;
pub mod commands;
pub mod input;
pub mod loop_runner;
