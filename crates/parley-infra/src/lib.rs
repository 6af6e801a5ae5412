//! Infrastructure layer for Parley.
//!
//! Implements the ports defined in `parley-core`: the OpenAI-compatible
//! streaming completion client and the SQLite chat repository. Also owns
//! configuration loading, data-directory resolution, and API-key lookup.

pub mod config;
pub mod filesystem;
pub mod llm;
pub mod secret;
pub mod sqlite;
