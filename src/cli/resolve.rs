//! Local device resolution shared by commands.

use std::path::PathBuf;
use std::sync::Arc;

use crate::core::config::{self, Config, DeviceSection};
use crate::core::identity::{DeviceKeys, IdentityManager};
use crate::core::store::SecretStore;
use crate::error::Result;

/// The initialized local device: config, store and identity manager.
pub struct Local {
    pub home: PathBuf,
    pub config: Config,
    pub store: Arc<dyn SecretStore>,
    pub manager: IdentityManager,
}

impl Local {
    /// Load the coffer home.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotInitialized` before `coffer init`.
    pub fn load() -> Result<Self> {
        let home = config::home()?;
        let config = Config::load(&home)?;
        config.device()?;
        let store = config.secret_store(&home)?;
        let manager = IdentityManager::with_policy(store.clone(), config.prekey_policy());
        Ok(Self {
            home,
            config,
            store,
            manager,
        })
    }

    pub fn device(&self) -> Result<&DeviceSection> {
        self.config.device()
    }

    pub fn device_mut(&mut self) -> Result<&mut DeviceSection> {
        self.config
            .device
            .as_mut()
            .ok_or_else(|| crate::error::ConfigError::NotInitialized.into())
    }

    /// Load this device's private keys.
    pub fn keys(&self) -> Result<DeviceKeys> {
        self.manager.load_device(&self.device()?.identity)
    }

    pub fn save(&self) -> Result<()> {
        self.config.save(&self.home)
    }
}
