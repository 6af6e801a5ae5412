//! Completion-service abstractions for Parley.
//!
//! - `ChatClient`: RPITIT trait for concrete streaming chat clients
//! - `BoxChatClient`: object-safe wrapper for dynamic dispatch
//! - `FragmentStream`: cancellable lazy sequence of stream items

pub mod box_client;
pub mod client;
pub mod stream;
