//! Shared error types, result aliases, and logging setup.

pub mod error;
pub mod logging;
pub mod result;
