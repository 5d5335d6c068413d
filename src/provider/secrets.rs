// ABOUTME: Key pair lookup and secret store operations.
// ABOUTME: Maps a key pair name to its id and fetches the decrypted private key.

use crate::types::KeyPairId;
use async_trait::async_trait;

/// Resolves key pair names to provider-assigned ids.
#[async_trait]
pub trait KeyPairOps: Send + Sync {
    /// All key pair ids registered under `name`. Unknown names yield an empty list.
    async fn key_pair_ids(&self, name: &str) -> Result<Vec<KeyPairId>, SecretError>;
}

/// Opaque identifier -> decrypted blob fetch.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn fetch_private_key(&self, id: &KeyPairId) -> Result<String, SecretError>;
}

/// Errors from key pair lookup and secret retrieval.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("secret not found: {0}")]
    NotFound(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("provider error: {0}")]
    Provider(String),
}
