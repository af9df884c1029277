//! How the token secret is written into saved snapshots.
//!
//! Secrets are persisted verbatim today ([`PlaintextSecrets`]). The store
//! only talks to the [`SecretCodec`] trait so an encrypting codec can be
//! dropped in without touching anything else.

use crate::StoreError;

/// Converts a token secret to and from its stored form.
pub trait SecretCodec {
    /// Stored form of `secret`.
    fn seal(&self, secret: &str) -> String;

    /// Recovers the secret from its stored form.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Secret`] if the stored form cannot be decoded.
    fn open(&self, stored: &str) -> Result<String, StoreError>;
}

/// Stores secrets exactly as entered.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaintextSecrets;

impl SecretCodec for PlaintextSecrets {
    fn seal(&self, secret: &str) -> String {
        secret.to_string()
    }

    fn open(&self, stored: &str) -> Result<String, StoreError> {
        Ok(stored.to_string())
    }
}
