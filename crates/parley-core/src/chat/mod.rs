//! Chat sessions: registry, turn orchestration, and the persistence port.

pub mod context;
pub mod orchestrator;
pub mod registry;
pub mod repository;
pub mod title;

#[cfg(test)]
pub(crate) mod testing;
