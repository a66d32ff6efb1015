//! The device-side interface for one environment.
//!
//! Vault ties a device's keys, the environment-key service and the remote
//! together for a single `org/project/env` scope, and provides the secret
//! and sharing operations.

mod secrets;
mod team;

use std::sync::Arc;

use crate::core::domain::{DeviceIdentity, Scope};
use crate::core::identity::{DeviceKeys, IdentityManager};
use crate::core::keys::{EnvironmentKeys, KeyCache};
use crate::core::remote::Remote;
use crate::core::store::SecretStore;
use crate::error::Result;

/// The device-side interface for one environment.
///
/// Owns the loaded device keys and talks to the remote through
/// [`EnvironmentKeys`]. Cheap to build; build one per scope.
pub struct Vault {
    pub(super) scope: Scope,
    pub(super) device: DeviceKeys,
    pub(super) keys: EnvironmentKeys,
    pub(super) remote: Arc<dyn Remote>,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("scope", &self.scope)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl Vault {
    /// Open a vault for `scope` as the device described by `identity`.
    ///
    /// Vaults opened over the same store share one [`KeyCache`], so their
    /// key resolution for a scope is serialized.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NoPrivateKey` if the device's private keys are
    /// not in `store`, or a validation error if they don't match
    /// `identity`.
    pub fn open(
        store: Arc<dyn SecretStore>,
        remote: Arc<dyn Remote>,
        identity: &DeviceIdentity,
        scope: Scope,
    ) -> Result<Self> {
        let cache = KeyCache::shared(store.clone());
        Self::with_cache(store, remote, cache, identity, scope)
    }

    /// Like [`open`](Self::open), with an explicit key cache.
    pub fn with_cache(
        store: Arc<dyn SecretStore>,
        remote: Arc<dyn Remote>,
        cache: Arc<KeyCache>,
        identity: &DeviceIdentity,
        scope: Scope,
    ) -> Result<Self> {
        let device = IdentityManager::new(store).load_device(identity)?;
        Ok(Self {
            scope,
            device,
            keys: EnvironmentKeys::new(remote.clone(), cache),
            remote,
        })
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.device.identity
    }

    /// Environment-key service, for callers that need lower-level control.
    pub fn keys(&self) -> &EnvironmentKeys {
        &self.keys
    }
}
