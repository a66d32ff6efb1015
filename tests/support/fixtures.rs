//! Test fixtures and constants.

use std::sync::Arc;

use coffer::core::domain::{DeviceIdentity, OneTimePrekey, Scope, SignedPrekey};
use coffer::core::identity::{DeviceKeys, IdentityManager};
use coffer::core::keys::{EnvironmentKeys, KeyCache};
use coffer::core::remote::MemoryRemote;
use coffer::core::store::Memory;
use coffer::core::vault::Vault;

pub const ORG: &str = "acme";
pub const PROJECT: &str = "api";
pub const ENV: &str = "prod";

/// Standard test secrets used across multiple tests.
pub const STANDARD_SECRETS: &[(&str, &str)] = &[
    ("DATABASE_URL", "postgres://localhost/mydb"),
    ("API_KEY", "sk-test-12345"),
    ("JWT_SECRET", "super-secret-jwt-token"),
    ("REDIS_URL", "redis://localhost:6379"),
];

/// `acme/api/prod`
pub fn scope() -> Scope {
    Scope::new(ORG, PROJECT, ENV).expect("valid scope")
}

/// A device with its own in-memory secret store.
pub struct Device {
    pub store: Arc<Memory>,
    pub manager: IdentityManager,
    pub identity: DeviceIdentity,
    pub signed_prekey: SignedPrekey,
    pub one_time_prekeys: Vec<OneTimePrekey>,
}

impl Device {
    /// Create identity, signed prekey and 10 one-time prekeys.
    pub fn new(name: &str) -> Self {
        let store = Arc::new(Memory::new());
        let manager = IdentityManager::new(store.clone());
        let identity = manager
            .create_device_identity(Some(name), Some("test"))
            .expect("create identity");
        let signed_prekey = manager.create_signed_prekey(&identity).expect("signed prekey");
        let one_time_prekeys = manager.create_one_time_prekeys(10).expect("one-time prekeys");
        Self {
            store,
            manager,
            identity,
            signed_prekey,
            one_time_prekeys,
        }
    }

    /// Register with `remote` and grant access to `acme/api/prod`.
    pub fn join(name: &str, remote: &MemoryRemote) -> Self {
        let device = Self::new(name);
        device
            .manager
            .register_device(
                remote,
                &device.identity,
                &device.signed_prekey,
                &device.one_time_prekeys,
            )
            .expect("register device");
        remote
            .grant(PROJECT, ENV, &device.identity.device_id)
            .expect("grant");
        device
    }

    pub fn keys(&self) -> DeviceKeys {
        self.manager.load_device(&self.identity).expect("load device")
    }

    pub fn id(&self) -> &str {
        &self.identity.device_id
    }

    /// Vault on `acme/api/prod`.
    pub fn vault(&self, remote: &Arc<MemoryRemote>) -> Vault {
        Vault::open(self.store.clone(), remote.clone(), &self.identity, scope()).expect("open vault")
    }

    /// Environment-key service over this device's store.
    pub fn environment_keys(&self, remote: &Arc<MemoryRemote>) -> EnvironmentKeys {
        EnvironmentKeys::new(remote.clone(), KeyCache::shared(self.store.clone()))
    }
}

/// A fresh in-memory remote service.
pub fn remote() -> Arc<MemoryRemote> {
    Arc::new(MemoryRemote::new())
}
