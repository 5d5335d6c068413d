// ABOUTME: Resolves a key pair name to decrypted private key material.
// ABOUTME: Writes the material to an owner-only file inside the run's work directory.

use std::fs::OpenOptions;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use super::DeployError;
use crate::provider::{KeyPairOps, SecretError, SecretStore};
use crate::types::KeyPairId;

/// Decrypted private key for one run. Never logged, never cached.
pub struct SecretMaterial {
    pub key_id: KeyPairId,
    plaintext: String,
}

impl SecretMaterial {
    pub fn new(key_id: KeyPairId, plaintext: impl Into<String>) -> Self {
        Self {
            key_id,
            plaintext: plaintext.into(),
        }
    }

    pub fn expose(&self) -> &str {
        &self.plaintext
    }

    /// Persist to `path` with mode 0600, replacing any previous file.
    pub fn write_to(&self, path: &Path) -> Result<(), DeployError> {
        let write = || -> std::io::Result<()> {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(path)?;
            file.write_all(self.plaintext.as_bytes())?;
            // OpenSSH-format keys fail to parse without the trailing newline.
            if !self.plaintext.ends_with('\n') {
                file.write_all(b"\n")?;
            }
            file.sync_all()
        };

        write().map_err(|source| DeployError::CredentialWrite {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl std::fmt::Debug for SecretMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretMaterial")
            .field("key_id", &self.key_id)
            .field("plaintext", &"<redacted>")
            .finish()
    }
}

/// Exchanges a key pair name for its private key.
pub struct SecretResolver<'a> {
    key_pairs: &'a dyn KeyPairOps,
    store: &'a dyn SecretStore,
}

impl<'a> SecretResolver<'a> {
    pub fn new(key_pairs: &'a dyn KeyPairOps, store: &'a dyn SecretStore) -> Self {
        Self { key_pairs, store }
    }

    pub async fn resolve(&self, key_pair_name: &str) -> Result<SecretMaterial, DeployError> {
        let ids = self
            .key_pairs
            .key_pair_ids(key_pair_name)
            .await
            .map_err(|e| classify(key_pair_name, e))?;

        let key_id = match ids.as_slice() {
            [id] => id.clone(),
            [] => {
                return Err(DeployError::LookupError(format!(
                    "no key pair named {key_pair_name}"
                )));
            }
            many => {
                return Err(DeployError::LookupError(format!(
                    "key pair name {key_pair_name} matches {} identifiers",
                    many.len()
                )));
            }
        };

        tracing::debug!(key_pair = %key_pair_name, key_id = %key_id, "resolved key pair");

        let plaintext = self
            .store
            .fetch_private_key(&key_id)
            .await
            .map_err(|e| classify(key_pair_name, e))?;

        Ok(SecretMaterial::new(key_id, plaintext))
    }
}

fn classify(key_pair_name: &str, err: SecretError) -> DeployError {
    match err {
        SecretError::AccessDenied(reason) => DeployError::AccessDenied(reason),
        SecretError::NotFound(what) => {
            DeployError::LookupError(format!("{key_pair_name}: {what}"))
        }
        SecretError::Provider(reason) => {
            DeployError::LookupError(format!("{key_pair_name}: {reason}"))
        }
    }
}
