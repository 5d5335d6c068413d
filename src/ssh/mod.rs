// ABOUTME: SSH client module for the ephemeral instance.
// ABOUTME: Key-file authentication, per-run known_hosts, command execution and file transfer.

mod client;
mod error;

pub use client::{CommandOutput, Session, SessionConfig};
pub use error::{Error, Result};
