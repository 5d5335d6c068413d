// ABOUTME: Library root for ephemeron - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod deploy;
pub mod diagnostics;
pub mod error;
pub mod output;
pub mod provider;
pub mod ssh;
pub mod types;
pub mod wait;
