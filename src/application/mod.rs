//! Application layer: description parsing, per-entity reconciliation and
//! the use case that walks the whole source tree.

pub mod services;
pub mod use_cases;
