//! Chat orchestration and port trait definitions for Parley.
//!
//! This crate defines the "ports" (completion client and persistence traits)
//! that the infrastructure layer implements, plus the session registry and
//! the per-session turn state machine. It depends only on `parley-types` --
//! never on `parley-infra` or any network/database crate.

pub mod chat;
pub mod event;
pub mod llm;
