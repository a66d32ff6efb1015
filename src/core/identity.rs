//! Device identity and prekey management.
//!
//! [`IdentityManager`] creates the asymmetric material a device uses to
//! take part in envelope exchange and keeps the private halves in the
//! injected [`SecretStore`]. It never holds keys in memory longer than an
//! operation.

use std::sync::Arc;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use tracing::{debug, info, warn};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::core::cipher::envelope::{self, OpenOptions, Opened};
use crate::core::constants::{
    MAX_ONE_TIME_PREKEY_BATCH, ONE_TIME_PREKEY_BATCH, SIGNED_PREKEY_TTL_DAYS,
};
use crate::core::domain::identity::{encryption_key_name, signing_key_name, IDENTITY_VERSION};
use crate::core::domain::prekey::prekey_key_name;
use crate::core::domain::{DeviceIdentity, EncryptedEnvelope, OneTimePrekey, Scope, SignedPrekey};
use crate::core::encoding;
use crate::core::keys::KeyCache;
use crate::core::remote::Remote;
use crate::core::store::{require_key32, SecretStore};
use crate::core::types::PrekeyId;
use crate::error::{CipherError, Error, RemoteError, Result, StoreError, ValidationError};

/// Prekey lifetimes and batch sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrekeyPolicy {
    pub signed_ttl: Duration,
    pub one_time_batch: usize,
}

impl Default for PrekeyPolicy {
    fn default() -> Self {
        Self {
            signed_ttl: Duration::days(SIGNED_PREKEY_TTL_DAYS),
            one_time_batch: ONE_TIME_PREKEY_BATCH,
        }
    }
}

/// A device's loaded private keys.
pub struct DeviceKeys {
    pub identity: DeviceIdentity,
    pub signing_key: SigningKey,
    pub encryption_key: StaticSecret,
}

impl std::fmt::Debug for DeviceKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceKeys")
            .field("identity", &self.identity)
            .field("signing_key", &"[REDACTED]")
            .field("encryption_key", &"[REDACTED]")
            .finish()
    }
}

/// Outcome of [`IdentityManager::rotate_signed_prekey_if_expired`].
#[derive(Debug, Clone)]
pub struct PrekeyRotation {
    /// The prekey to publish and use from now on
    pub current: SignedPrekey,
    pub rotated: bool,
    /// The replaced prekey, marked revoked. Its private half is still in
    /// the store until [`IdentityManager::purge_signed_prekey`] runs.
    pub retired: Option<SignedPrekey>,
}

/// Creates, loads and rotates device keys.
pub struct IdentityManager {
    store: Arc<dyn SecretStore>,
    policy: PrekeyPolicy,
}

impl IdentityManager {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self::with_policy(store, PrekeyPolicy::default())
    }

    pub fn with_policy(store: Arc<dyn SecretStore>, policy: PrekeyPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &Arc<dyn SecretStore> {
        &self.store
    }

    pub fn policy(&self) -> PrekeyPolicy {
        self.policy
    }

    /// Generate a device identity and persist both private keys.
    ///
    /// `name` defaults to the host's device name, `platform` to the OS.
    pub fn create_device_identity(
        &self,
        name: Option<&str>,
        platform: Option<&str>,
    ) -> Result<DeviceIdentity> {
        let signing_key = SigningKey::generate(&mut OsRng);
        let encryption_key = StaticSecret::random_from_rng(OsRng);

        let identity = DeviceIdentity {
            device_id: uuid::Uuid::new_v4().to_string(),
            name: name.map(str::to_string).unwrap_or_else(whoami::devicename),
            platform: platform
                .map(str::to_string)
                .unwrap_or_else(|| std::env::consts::OS.to_string()),
            signing_public_key: encoding::encode(signing_key.verifying_key().as_bytes()),
            encryption_public_key: encoding::encode(
                X25519PublicKey::from(&encryption_key).as_bytes(),
            ),
            created_at: Utc::now(),
            version: IDENTITY_VERSION,
        };

        self.store
            .set_key(&signing_key_name(&identity.device_id), signing_key.as_bytes())?;
        let scalar = Zeroizing::new(encryption_key.to_bytes());
        self.store
            .set_key(&encryption_key_name(&identity.device_id), &scalar[..])?;

        info!(device_id = %identity.device_id, name = %identity.name, "created device identity");
        Ok(identity)
    }

    pub fn load_signing_key(&self, device_id: &str) -> Result<SigningKey> {
        let seed = require_key32(self.store.as_ref(), &signing_key_name(device_id))?;
        Ok(SigningKey::from_bytes(&seed))
    }

    pub fn load_encryption_key(&self, device_id: &str) -> Result<StaticSecret> {
        let scalar = require_key32(self.store.as_ref(), &encryption_key_name(device_id))?;
        Ok(StaticSecret::from(*scalar))
    }

    /// Load both private keys and check they match the public identity.
    pub fn load_device(&self, identity: &DeviceIdentity) -> Result<DeviceKeys> {
        let signing_key = self.load_signing_key(&identity.device_id)?;
        let encryption_key = self.load_encryption_key(&identity.device_id)?;

        let mismatch = |which: &str| StoreError::InvalidFormat {
            name: identity.device_id.clone(),
            reason: format!("stored {} does not match the device identity", which),
        };
        if signing_key.verifying_key() != identity.verifying_key()? {
            return Err(mismatch("signing key").into());
        }
        if X25519PublicKey::from(&encryption_key) != identity.encryption_key()? {
            return Err(mismatch("encryption key").into());
        }

        Ok(DeviceKeys {
            identity: identity.clone(),
            signing_key,
            encryption_key,
        })
    }

    /// Create a signed prekey expiring after the policy TTL.
    pub fn create_signed_prekey(&self, identity: &DeviceIdentity) -> Result<SignedPrekey> {
        self.create_signed_prekey_at(identity, Utc::now())
    }

    pub fn create_signed_prekey_at(
        &self,
        identity: &DeviceIdentity,
        now: DateTime<Utc>,
    ) -> Result<SignedPrekey> {
        let signing_key = self.load_signing_key(&identity.device_id)?;
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = X25519PublicKey::from(&secret);
        let signature = signing_key.sign(public.as_bytes());

        let prekey = SignedPrekey {
            id: uuid::Uuid::new_v4().to_string(),
            public_key: encoding::encode(public.as_bytes()),
            signature: encoding::encode(&signature.to_bytes()),
            created_at: now,
            expires_at: (now + self.policy.signed_ttl).to_rfc3339_opts(SecondsFormat::Secs, true),
            revoked: false,
        };

        let scalar = Zeroizing::new(secret.to_bytes());
        self.store.set_key(&prekey_key_name(&prekey.id), &scalar[..])?;
        debug!(prekey_id = %prekey.id, expires_at = %prekey.expires_at, "created signed prekey");
        Ok(prekey)
    }

    /// Replace `current` when absent or expired.
    ///
    /// An unparsable expiry is treated as non-expiring. The retired prekey
    /// is returned revoked; purging its private half is the caller's call.
    pub fn rotate_signed_prekey_if_expired(
        &self,
        identity: &DeviceIdentity,
        current: Option<&SignedPrekey>,
        now: DateTime<Utc>,
    ) -> Result<PrekeyRotation> {
        let Some(current) = current else {
            return Ok(PrekeyRotation {
                current: self.create_signed_prekey_at(identity, now)?,
                rotated: true,
                retired: None,
            });
        };

        if current.expiry().is_none() {
            warn!(prekey_id = %current.id, expires_at = %current.expires_at, "unparsable prekey expiry, keeping");
        }
        if !current.is_expired(now) {
            return Ok(PrekeyRotation {
                current: current.clone(),
                rotated: false,
                retired: None,
            });
        }

        let replacement = self.create_signed_prekey_at(identity, now)?;
        info!(old = %current.id, new = %replacement.id, "rotated signed prekey");
        Ok(PrekeyRotation {
            current: replacement,
            rotated: true,
            retired: Some(SignedPrekey {
                revoked: true,
                ..current.clone()
            }),
        })
    }

    /// Delete a signed prekey's private half. Idempotent.
    pub fn purge_signed_prekey(&self, prekey: &SignedPrekey) -> Result<()> {
        self.store.delete_key(&prekey_key_name(&prekey.id))
    }

    /// Generate `count` one-time prekeys, persisting each private half.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::BatchTooLarge` above the batch cap.
    pub fn create_one_time_prekeys(&self, count: usize) -> Result<Vec<OneTimePrekey>> {
        if count > MAX_ONE_TIME_PREKEY_BATCH {
            return Err(ValidationError::BatchTooLarge(count).into());
        }

        let mut batch = Vec::with_capacity(count);
        for _ in 0..count {
            let secret = StaticSecret::random_from_rng(OsRng);
            let prekey = OneTimePrekey {
                id: uuid::Uuid::new_v4().to_string(),
                public_key: encoding::encode(X25519PublicKey::from(&secret).as_bytes()),
                private_key: Some(Zeroizing::new(secret.to_bytes())),
                consumed_at: None,
            };
            if let Some(private) = &prekey.private_key {
                self.store.set_key(&prekey_key_name(&prekey.id), &private[..])?;
            }
            batch.push(prekey);
        }

        debug!(count, "created one-time prekeys");
        Ok(batch)
    }

    /// Purge private material of consumed one-time prekeys.
    ///
    /// Consumed entries come back without a private key; unconsumed
    /// entries pass through unchanged.
    pub fn scrub_consumed_one_time_prekeys(
        &self,
        prekeys: Vec<OneTimePrekey>,
    ) -> Result<Vec<OneTimePrekey>> {
        let mut scrubbed = 0usize;
        let out = prekeys
            .into_iter()
            .map(|mut prekey| {
                if prekey.is_consumed() {
                    self.store.delete_key(&prekey_key_name(&prekey.id))?;
                    prekey.private_key = None;
                    scrubbed += 1;
                }
                Ok(prekey)
            })
            .collect::<Result<Vec<_>>>()?;
        if scrubbed > 0 {
            debug!(scrubbed, "scrubbed consumed one-time prekeys");
        }
        Ok(out)
    }

    /// Open an envelope addressed to this device's long-term key.
    pub fn decrypt_on_this_device(
        &self,
        envelope: &EncryptedEnvelope,
        device_id: &str,
    ) -> Result<Opened> {
        self.decrypt_on_this_device_with(envelope, device_id, OpenOptions::default())
    }

    pub fn decrypt_on_this_device_with(
        &self,
        envelope: &EncryptedEnvelope,
        device_id: &str,
        options: OpenOptions,
    ) -> Result<Opened> {
        let secret = self.load_encryption_key(device_id)?;
        envelope::open_with_secret(envelope, &secret, options)
    }

    /// Publish the identity and its prekeys.
    ///
    /// The signed prekey is checked against the identity first so a bad
    /// signature never leaves the device.
    pub fn register_device(
        &self,
        remote: &dyn Remote,
        identity: &DeviceIdentity,
        signed_prekey: &SignedPrekey,
        one_time_prekeys: &[OneTimePrekey],
    ) -> Result<()> {
        signed_prekey.verify(&identity.verifying_key()?)?;
        remote.register_device(identity)?;
        remote.publish_signed_prekey(&identity.device_id, signed_prekey)?;
        remote.publish_one_time_prekeys(&identity.device_id, one_time_prekeys)?;
        info!(
            device_id = %identity.device_id,
            one_time = one_time_prekeys.len(),
            "registered device"
        );
        Ok(())
    }

    /// Publish enough new one-time prekeys to reach `target` unconsumed.
    ///
    /// Returns the newly created prekeys (empty when already at target).
    pub fn top_up_one_time_prekeys(
        &self,
        remote: &dyn Remote,
        identity: &DeviceIdentity,
        target: usize,
    ) -> Result<Vec<OneTimePrekey>> {
        let available = remote.count_one_time_prekeys(&identity.device_id)?;
        let shortfall = target.saturating_sub(available);
        if shortfall == 0 {
            return Ok(Vec::new());
        }
        let mut added = Vec::with_capacity(shortfall);
        while added.len() < shortfall {
            let count = (shortfall - added.len()).min(MAX_ONE_TIME_PREKEY_BATCH);
            let batch = self.create_one_time_prekeys(count)?;
            remote.publish_one_time_prekeys(&identity.device_id, &batch)?;
            added.extend(batch);
        }
        info!(device_id = %identity.device_id, added = added.len(), "topped up one-time prekeys");
        Ok(added)
    }

    /// Mark locally held prekeys the service reports consumed, then scrub.
    pub fn sync_consumed_one_time_prekeys(
        &self,
        remote: &dyn Remote,
        device_id: &str,
        local: Vec<OneTimePrekey>,
    ) -> Result<Vec<OneTimePrekey>> {
        let consumed = remote.consumed_one_time_prekeys(device_id)?;
        let marked = local
            .into_iter()
            .map(|mut prekey| {
                if prekey.consumed_at.is_none() {
                    prekey.consumed_at = consumed
                        .iter()
                        .find(|c| c.id == prekey.id)
                        .and_then(|c| c.consumed_at);
                }
                prekey
            })
            .collect();
        self.scrub_consumed_one_time_prekeys(marked)
    }

    /// Remove a device: local private keys and the cached environment keys
    /// of `scopes` first, then the remote record.
    ///
    /// Safe to retry. A device already gone server-side counts as success.
    pub fn unlink_device(
        &self,
        remote: &dyn Remote,
        device_id: &str,
        prekey_ids: &[PrekeyId],
        scopes: &[Scope],
    ) -> Result<()> {
        let cache = KeyCache::shared(self.store.clone());
        for scope in scopes {
            cache.clear(scope)?;
        }
        for id in prekey_ids {
            self.store.delete_key(&prekey_key_name(id))?;
        }
        self.store.delete_key(&signing_key_name(device_id))?;
        self.store.delete_key(&encryption_key_name(device_id))?;

        match remote.revoke_device(device_id) {
            Ok(()) => {}
            Err(Error::Remote(RemoteError::NotFound(_))) => {
                debug!(device_id = %device_id, "device already revoked remotely");
            }
            Err(e) => return Err(e),
        }
        info!(device_id = %device_id, "unlinked device");
        Ok(())
    }
}

/// Check that a prekey bundle fetched for `device_id` is signed by that
/// device.
pub fn verify_bundle(bundle: &crate::core::domain::PrekeyBundle) -> Result<()> {
    let signer = bundle.identity.verifying_key()?;
    bundle.signed_prekey.verify(&signer)?;
    if bundle.signed_prekey.revoked {
        return Err(CipherError::BadSignature.into());
    }
    Ok(())
}
