//! Environment key resolution, publication and rotation.

use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use super::cache::{CachedKey, KeyCache};
use super::wrap;
use crate::core::cipher::SymmetricKey;
use crate::core::domain::{
    AddEnvelopeRequest, CreateKeyRequest, EnvironmentKeyRecord, Recipient, RecipientKind, Scope,
};
use crate::core::identity::DeviceKeys;
use crate::core::remote::Remote;
use crate::error::{AccessError, Error, RemoteError, Result};

/// Result of [`EnvironmentKeys::ensure_environment_key`].
#[derive(Debug, Clone)]
pub struct EnsuredKey {
    pub key: CachedKey,
    /// No key exists remotely yet: the caller must publish this one.
    pub created: bool,
}

/// Keeps one live environment key per scope and fans it out to every
/// authorized recipient.
pub struct EnvironmentKeys {
    remote: Arc<dyn Remote>,
    cache: Arc<KeyCache>,
}

impl EnvironmentKeys {
    pub fn new(remote: Arc<dyn Remote>, cache: Arc<KeyCache>) -> Self {
        Self { remote, cache }
    }

    pub fn cache(&self) -> &Arc<KeyCache> {
        &self.cache
    }

    /// Resolve the current key for `scope`, minting one if none exists.
    ///
    /// Serialized per scope: concurrent callers never mint two different
    /// first keys.
    ///
    /// # Errors
    ///
    /// - `AccessError::NotSharedWithDevice` if the key exists but has no
    ///   entry for this device
    /// - `CipherError` if the entry fails to open
    /// - `RemoteError` passed through from the remote
    pub fn ensure_environment_key(&self, scope: &Scope, device: &DeviceKeys) -> Result<EnsuredKey> {
        let flight = self.cache.flight(scope);
        let _guard = flight.lock().unwrap_or_else(|p| p.into_inner());
        self.ensure_locked(scope, device)
    }

    fn ensure_locked(&self, scope: &Scope, device: &DeviceKeys) -> Result<EnsuredKey> {
        let cached = self.cache.get(scope)?;
        let record = self
            .remote
            .fetch_environment_key(&scope.project, &scope.env)?;

        let Some(record) = record else {
            // First writer. Reuse a key minted by an earlier, unpublished attempt.
            let key = match cached {
                Some(key) => key,
                None => {
                    let key = CachedKey::new(SymmetricKey::generate(), 1);
                    self.cache.put(scope, key.clone())?;
                    info!(scope = %scope, fingerprint = %key.fingerprint, "minted environment key");
                    key
                }
            };
            return Ok(EnsuredKey { key, created: true });
        };

        if let Some(cached) = cached {
            if cached.matches(record.version, &record.fingerprint) {
                trace!(scope = %scope, version = cached.version, "environment key cache hit");
                return Ok(EnsuredKey {
                    key: cached,
                    created: false,
                });
            }
            self.cache.evict(scope)?;
        }

        // A retained key may already match (e.g. after a rollback).
        if let Some(known) = self.cache.key_for_fingerprint(scope, &record.fingerprint)? {
            if known.version == record.version {
                self.cache.put(scope, known.clone())?;
                return Ok(EnsuredKey {
                    key: known,
                    created: false,
                });
            }
        }

        let key = self.unwrap_record(scope, device, &record)?;
        let key = CachedKey::new(key, record.version);
        self.cache.put(scope, key.clone())?;
        debug!(scope = %scope, version = key.version, "resolved environment key");
        Ok(EnsuredKey {
            key,
            created: false,
        })
    }

    fn unwrap_record(
        &self,
        scope: &Scope,
        device: &DeviceKeys,
        record: &EnvironmentKeyRecord,
    ) -> Result<SymmetricKey> {
        let device_id = &device.identity.device_id;
        let not_shared = || AccessError::NotSharedWithDevice {
            scope: scope.to_string(),
            device_id: device_id.clone(),
        };
        let envelope = record.envelope.as_ref().ok_or_else(not_shared)?;
        let entry = envelope
            .recipient(RecipientKind::Device, device_id)
            .ok_or_else(not_shared)?;
        wrap::open_key_envelope(
            envelope,
            entry,
            &device.encryption_key,
            scope,
            &record.fingerprint,
        )
    }

    /// Every recipient the key must reach: authorized devices and active
    /// deployment tokens.
    pub fn recipients(&self, scope: &Scope) -> Result<Vec<Recipient>> {
        let mut recipients = Vec::new();
        for device in self.remote.environment_devices(&scope.project, &scope.env)? {
            recipients.push(Recipient::new(
                RecipientKind::Device,
                device.device_id,
                device.encryption_public_key,
            )?);
        }
        for token in self.remote.deployment_tokens(&scope.environment_id())? {
            if !token.is_active() {
                debug!(token_id = %token.id, "skipping revoked deployment token");
                continue;
            }
            recipients.push(Recipient::new(
                RecipientKind::Deployment,
                token.id,
                token.public_key,
            )?);
        }
        Ok(recipients)
    }

    /// Wrap `ensured` for every recipient and publish it.
    ///
    /// First publication sends a create request, later ones replace the
    /// envelope. Returns `None` when there is nobody to publish to.
    pub fn publish_key_envelopes(
        &self,
        scope: &Scope,
        device: &DeviceKeys,
        ensured: &EnsuredKey,
    ) -> Result<Option<EnvironmentKeyRecord>> {
        let flight = self.cache.flight(scope);
        let _guard = flight.lock().unwrap_or_else(|p| p.into_inner());
        self.publish_locked(scope, device, ensured)
    }

    fn publish_locked(
        &self,
        scope: &Scope,
        device: &DeviceKeys,
        ensured: &EnsuredKey,
    ) -> Result<Option<EnvironmentKeyRecord>> {
        let recipients = self.recipients(scope)?;
        if recipients.is_empty() {
            debug!(scope = %scope, "no recipients, nothing to publish");
            return Ok(None);
        }

        let key = &ensured.key;
        let envelope = wrap::seal_key_envelope(
            &device.identity,
            &device.signing_key,
            scope,
            &key.key,
            &recipients,
        )?;

        let record = if ensured.created {
            self.remote.create_environment_key(
                &scope.project,
                &scope.env,
                &CreateKeyRequest {
                    version: key.version,
                    fingerprint: key.fingerprint.clone(),
                    envelope,
                },
            )?
        } else {
            self.remote.add_key_envelope(
                &scope.project,
                &scope.env,
                &AddEnvelopeRequest {
                    version: key.version,
                    fingerprint: key.fingerprint.clone(),
                    envelope,
                },
            )?
        };

        self.cache.put(
            scope,
            CachedKey {
                key: key.key.clone(),
                version: record.version,
                fingerprint: record.fingerprint.clone(),
            },
        )?;
        info!(
            scope = %scope,
            version = record.version,
            recipients = recipients.len(),
            "published environment key"
        );
        Ok(Some(record))
    }

    /// Resolve the current key, publishing it first if it was just minted.
    /// The write path for secrets: a value is never encrypted under a key
    /// nobody else can recover.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::NoRecipients` if a new key has nobody to be
    /// published to.
    pub fn ensure_published(&self, scope: &Scope, device: &DeviceKeys) -> Result<CachedKey> {
        let flight = self.cache.flight(scope);
        let _guard = flight.lock().unwrap_or_else(|p| p.into_inner());
        let ensured = self.ensure_locked(scope, device)?;
        if !ensured.created {
            return Ok(ensured.key);
        }
        match self.publish_locked(scope, device, &ensured) {
            Ok(Some(_)) => Ok(ensured.key),
            Ok(None) => Err(AccessError::NoRecipients(scope.to_string()).into()),
            Err(Error::Remote(RemoteError::Conflict(reason))) => {
                Ok(self.adopt_published(scope, device, &ensured.key, &reason)?.key)
            }
            Err(e) => Err(e),
        }
    }

    /// Another writer published a first key before ours. Drop ours and
    /// resolve theirs.
    fn adopt_published(
        &self,
        scope: &Scope,
        device: &DeviceKeys,
        minted: &CachedKey,
        reason: &str,
    ) -> Result<EnsuredKey> {
        warn!(scope = %scope, "environment key published concurrently: {}", reason);
        self.cache.discard(scope, &minted.fingerprint)?;
        let adopted = self.ensure_locked(scope, device)?;
        if adopted.created {
            return Err(RemoteError::Conflict(reason.to_string()).into());
        }
        Ok(adopted)
    }

    /// Re-share the current key with the current recipient set, e.g. after
    /// onboarding a device or creating a deployment token.
    pub fn share(&self, scope: &Scope, device: &DeviceKeys) -> Result<Option<EnvironmentKeyRecord>> {
        let flight = self.cache.flight(scope);
        let _guard = flight.lock().unwrap_or_else(|p| p.into_inner());
        let ensured = self.ensure_locked(scope, device)?;
        match self.publish_locked(scope, device, &ensured) {
            Err(Error::Remote(RemoteError::Conflict(reason))) if ensured.created => {
                let adopted = self.adopt_published(scope, device, &ensured.key, &reason)?;
                self.publish_locked(scope, device, &adopted)
            }
            published => published,
        }
    }

    /// Replace the key with a fresh one at `version + 1`.
    ///
    /// The superseded key stays in the cache history so records encrypted
    /// under it remain readable until re-encrypted. Existing secret records
    /// are not touched.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::NoRecipients` when nobody is authorized.
    pub fn rotate(&self, scope: &Scope, device: &DeviceKeys) -> Result<CachedKey> {
        let flight = self.cache.flight(scope);
        let _guard = flight.lock().unwrap_or_else(|p| p.into_inner());

        let published = self
            .remote
            .fetch_environment_key(&scope.project, &scope.env)?;
        let current = match &published {
            None => {
                // Nothing to supersede; a minted but unpublished key is dropped.
                if let Some(unpublished) = self.cache.get(scope)? {
                    self.cache.discard(scope, &unpublished.fingerprint)?;
                }
                None
            }
            Some(_) => match self.ensure_locked(scope, device) {
                Ok(ensured) => Some(ensured.key),
                Err(e) if e.is_access() => {
                    warn!(scope = %scope, "rotating without access to the current key: {}", e);
                    None
                }
                Err(e) => return Err(e),
            },
        };
        let version = published.map_or(1, |record| record.version + 1);

        let next = EnsuredKey {
            key: CachedKey::new(SymmetricKey::generate(), version),
            created: true,
        };
        if self.publish_locked(scope, device, &next)?.is_none() {
            return Err(AccessError::NoRecipients(scope.to_string()).into());
        }
        info!(
            scope = %scope,
            from = current.as_ref().map(|k| k.version),
            to = version,
            "rotated environment key"
        );
        Ok(next.key)
    }
}
