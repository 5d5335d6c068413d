// ABOUTME: Errors raised while talking to an ephemeral instance over SSH.
// ABOUTME: Connect, key, command, and upload failures; russh errors pass through.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("could not reach instance: {0}")]
    Connection(String),

    #[error("no SSH answer from {host}:{port} within {timeout:?}")]
    ConnectTimeout {
        host: String,
        port: u16,
        timeout: Duration,
    },

    #[error("instance rejected the run credential for user {0}")]
    AuthenticationFailed(String),

    #[error("run credential {path} is not a usable private key: {reason}")]
    KeyLoadFailed { path: PathBuf, reason: String },

    #[error("remote command could not be started: {0}")]
    CommandFailed(String),

    #[error("remote command still running after {0:?}")]
    CommandTimeout(Duration),

    #[error("instance closed the channel before reporting an exit status")]
    ChannelClosed,

    #[error("copying {path} to the instance failed: {reason}")]
    UploadFailed { path: String, reason: String },

    #[error("SSH protocol error: {0}")]
    Protocol(#[from] russh::Error),

    #[error("SSH key error: {0}")]
    Key(#[from] russh::keys::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
