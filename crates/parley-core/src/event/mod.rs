//! Live chat event distribution.

pub mod bus;
