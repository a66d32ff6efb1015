//! Deployment-token decryption path.
//!
//! A deployment credential recovers the environment key from the
//! `deployment` entry of the key envelope, exactly like a device does from
//! its `device` entry, then reads secrets through the regular codec. When
//! the key has not been shared with the token yet, the credential can fall
//! back to the KDF hierarchy, but only if it carries the organization root
//! secret.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::core::domain::{
    DeploymentCredential, DeploymentToken, PullReport, RecipientKind, Scope, TokenStatus,
};
use crate::core::identity::DeviceKeys;
use crate::core::keys::{wrap, CachedKey, EnvironmentKeys};
use crate::core::remote::Remote;
use crate::core::secrets::{self, Keyring};
use crate::core::kdf;
use crate::error::{AccessError, Error, RemoteError, Result};

/// Version reported for keys derived from the organization root. They are
/// not published, so they have no remote version.
pub const DERIVED_KEY_VERSION: u32 = 0;

/// Resolves environment keys and pulls secrets on behalf of a deployment
/// credential.
pub struct DeploymentDecryptor {
    remote: Arc<dyn Remote>,
}

impl DeploymentDecryptor {
    pub fn new(remote: Arc<dyn Remote>) -> Self {
        Self { remote }
    }

    fn token(&self, credential: &DeploymentCredential, scope: &Scope) -> Result<DeploymentToken> {
        self.remote
            .deployment_tokens(&scope.environment_id())?
            .into_iter()
            .find(|t| t.id == credential.token_id())
            .ok_or_else(|| {
                RemoteError::NotFound(format!(
                    "deployment token {} for {}",
                    credential.token_id(),
                    scope.environment_id()
                ))
                .into()
            })
    }

    fn open_shared(&self, credential: &DeploymentCredential, scope: &Scope) -> Result<CachedKey> {
        let not_shared = || AccessError::NotSharedWithToken {
            scope: scope.to_string(),
        };
        let record = self
            .remote
            .fetch_environment_key(&scope.project, &scope.env)?
            .ok_or_else(not_shared)?;
        let envelope = record.envelope.as_ref().ok_or_else(not_shared)?;
        let entry = envelope
            .recipient(RecipientKind::Deployment, credential.token_id())
            .ok_or_else(not_shared)?;
        let key = wrap::open_key_envelope(
            envelope,
            entry,
            &credential.secret()?,
            scope,
            &record.fingerprint,
        )?;
        Ok(CachedKey::new(key, record.version))
    }

    /// Recover the environment key for `scope`.
    ///
    /// # Errors
    ///
    /// - `AccessError::TokenRevoked` if the token is revoked
    /// - `AccessError::NotSharedWithToken` if no usable entry exists and the
    ///   credential has no organization root
    /// - `RemoteError` passed through from the remote
    pub fn resolve_environment_key(
        &self,
        credential: &DeploymentCredential,
        scope: &Scope,
    ) -> Result<CachedKey> {
        let token = self.token(credential, scope)?;
        if token.status == TokenStatus::Revoked {
            return Err(AccessError::TokenRevoked(token.id).into());
        }

        let reason = match self.open_shared(credential, scope) {
            Ok(key) => {
                debug!(scope = %scope, token_id = %token.id, version = key.version, "opened deployment key entry");
                return Ok(key);
            }
            // transport and store failures are not a sharing problem
            Err(e @ (Error::Remote(_) | Error::Store(_) | Error::Io(_))) => return Err(e),
            Err(e) => e,
        };
        warn!(
            scope = %scope,
            token_id = %token.id,
            "environment key not yet shared with this token, re-share required: {}",
            reason
        );

        match credential.org_root() {
            Some(seed) => {
                warn!(scope = %scope, "falling back to organization root derivation");
                let key = kdf::env_kek_from_master(seed, &scope.org, &scope.project, &scope.env)?;
                Ok(CachedKey::new(key, DERIVED_KEY_VERSION))
            }
            None => Err(AccessError::NotSharedWithToken {
                scope: scope.to_string(),
            }
            .into()),
        }
    }

    /// Pull and decrypt every secret in `scope`.
    ///
    /// Records declaring a fingerprint other than the resolved key's fail
    /// individually and are reported in [`PullReport::failures`].
    pub fn decrypt_bundle(&self, credential: &DeploymentCredential, scope: &Scope) -> Result<PullReport> {
        let key = self.resolve_environment_key(credential, scope)?;
        let records = self.remote.pull_secrets(&scope.project, &scope.env)?;
        Ok(secrets::decrypt_bundle(
            &records,
            scope,
            &Keyring::single(scope, key),
        ))
    }
}

/// Create a deployment token for `scope` and share the environment key
/// with it.
///
/// The caller must hand the returned credential to the deploy target; it
/// is never stored.
pub fn create_token(
    remote: &dyn Remote,
    keys: &EnvironmentKeys,
    scope: &Scope,
    device: &DeviceKeys,
) -> Result<(DeploymentCredential, DeploymentToken)> {
    let (credential, token) = DeploymentCredential::generate(&scope.environment_id())?;
    remote.create_deployment_token(&token)?;
    keys.share(scope, device)?;
    info!(scope = %scope, token_id = %token.id, "created deployment token");
    Ok((credential, token))
}

/// Revoke a token. Already-revoked or unknown tokens are not an error.
///
/// The environment key is re-shared without the token, but a key it
/// already recovered stays valid until [`EnvironmentKeys::rotate`].
pub fn revoke_token(
    remote: &dyn Remote,
    keys: &EnvironmentKeys,
    scope: &Scope,
    device: &DeviceKeys,
    token_id: &str,
) -> Result<()> {
    match remote.revoke_deployment_token(token_id) {
        Ok(()) => {}
        Err(Error::Remote(RemoteError::NotFound(_))) => {
            debug!(token_id = %token_id, "token already gone");
        }
        Err(e) => return Err(e),
    }
    keys.share(scope, device)?;
    info!(scope = %scope, token_id = %token_id, "revoked deployment token");
    Ok(())
}

/// Replace a token with a fresh one for the same environment.
pub fn rotate_token(
    remote: &dyn Remote,
    keys: &EnvironmentKeys,
    scope: &Scope,
    device: &DeviceKeys,
    token_id: &str,
) -> Result<(DeploymentCredential, DeploymentToken)> {
    let (credential, token) = DeploymentCredential::generate(&scope.environment_id())?;
    remote.create_deployment_token(&token)?;
    revoke_token(remote, keys, scope, device, token_id)?;
    info!(scope = %scope, from = %token_id, to = %token.id, "rotated deployment token");
    Ok((credential, token))
}
