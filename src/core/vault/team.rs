//! Sharing operations.
//!
//! Fan the environment key out to devices and deployment tokens, rotate it,
//! and manage the tokens themselves.

use super::Vault;
use crate::core::deploy;
use crate::core::domain::{DeploymentCredential, DeploymentToken, EnvironmentKeyRecord};
use crate::core::keys::CachedKey;
use crate::error::Result;

impl Vault {
    /// Re-share the current environment key with everyone currently
    /// authorized, e.g. after a device was granted access.
    ///
    /// # Returns
    ///
    /// The published record, or `None` if nobody is authorized.
    pub fn share(&self) -> Result<Option<EnvironmentKeyRecord>> {
        self.keys.share(&self.scope, &self.device)
    }

    /// Rotate the environment key.
    ///
    /// Existing secrets stay readable through the retained key until
    /// [`reencrypt_all`](Self::reencrypt_all) rewrites them.
    pub fn rotate(&self) -> Result<CachedKey> {
        self.keys.rotate(&self.scope, &self.device)
    }

    /// Create a deployment token and share the environment key with it.
    pub fn create_token(&self) -> Result<(DeploymentCredential, DeploymentToken)> {
        deploy::create_token(self.remote.as_ref(), &self.keys, &self.scope, &self.device)
    }

    /// Replace a deployment token with a fresh one.
    pub fn rotate_token(&self, token_id: &str) -> Result<(DeploymentCredential, DeploymentToken)> {
        deploy::rotate_token(
            self.remote.as_ref(),
            &self.keys,
            &self.scope,
            &self.device,
            token_id,
        )
    }

    /// Revoke a deployment token and re-share without it.
    ///
    /// Rotate afterwards to make sure it cannot read new values.
    pub fn revoke_token(&self, token_id: &str) -> Result<()> {
        deploy::revoke_token(
            self.remote.as_ref(),
            &self.keys,
            &self.scope,
            &self.device,
            token_id,
        )
    }
}
