//! Completion-service clients.

pub mod openai_compat;
