//! Common test utilities and helpers
//!
//! Shared fixtures for the integration tests: an in-memory version control
//! fake that records every call, and helpers to lay out source trees.

#![allow(dead_code)]

pub mod fake_scm;
pub mod fixtures;
