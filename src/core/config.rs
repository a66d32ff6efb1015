//! Configuration file management.
//!
//! Handles reading, writing, and validating `config.toml` inside the coffer
//! home (`$COFFER_HOME`, default `~/.coffer`). The file holds the local
//! device's public records and policy; private keys live in the secret
//! store.

use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::constants;
use crate::core::domain::{DeviceIdentity, OneTimePrekey, SignedPrekey};
use crate::core::identity::PrekeyPolicy;
use crate::core::store::{self, Backend, SecretStore};
use crate::error::{ConfigError, Result, StoreError};

/// Device configuration stored in `config.toml`
#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    /// Metadata about the configuration
    pub coffer: Meta,
    #[serde(default)]
    pub prekeys: PrekeySettings,
    #[serde(default)]
    pub store: StoreSettings,
    /// The local device, once `init` has run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceSection>,
}

/// Metadata section of the configuration
#[derive(Debug, Serialize, Deserialize)]
pub struct Meta {
    /// Configuration version
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrekeySettings {
    pub signed_ttl_days: i64,
    pub one_time_batch: usize,
}

impl Default for PrekeySettings {
    fn default() -> Self {
        Self {
            signed_ttl_days: constants::SIGNED_PREKEY_TTL_DAYS,
            one_time_batch: constants::ONE_TIME_PREKEY_BATCH,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default)]
    pub backend: Backend,
}

/// Public records of the local device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSection {
    pub identity: DeviceIdentity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_prekey: Option<SignedPrekey>,
    #[serde(default)]
    pub one_time_prekeys: Vec<OneTimePrekey>,
}

/// Coffer home: `$COFFER_HOME`, else `~/.coffer`.
///
/// # Errors
///
/// Returns `StoreError::NoHomeDir` if neither is available.
pub fn home() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(constants::HOME_ENV) {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    dirs::home_dir()
        .map(|h| h.join(constants::HOME_DIR))
        .ok_or_else(|| StoreError::NoHomeDir.into())
}

impl Config {
    /// Create a new empty configuration with current version
    pub fn new() -> Self {
        Self {
            coffer: Meta {
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            prekeys: PrekeySettings::default(),
            store: StoreSettings::default(),
            device: None,
        }
    }

    /// Path to the configuration file under `home`
    pub fn config_path(home: &Path) -> PathBuf {
        home.join(constants::CONFIG_FILE)
    }

    /// Key directory used by the filesystem store
    pub fn key_dir(home: &Path) -> PathBuf {
        home.join(constants::KEY_DIR)
    }

    pub fn exists(home: &Path) -> bool {
        Self::config_path(home).exists()
    }

    /// Load configuration from `<home>/config.toml`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotInitialized` if the file doesn't exist,
    /// or `ConfigError::Parse` if the TOML is malformed.
    pub fn load(home: &Path) -> Result<Self> {
        let path = Self::config_path(home);
        debug!(path = %path.display(), "loading config");

        if !path.exists() {
            return Err(ConfigError::NotInitialized.into());
        }
        let contents = std::fs::read_to_string(&path).map_err(ConfigError::ReadFile)?;
        let config: Self = toml::from_str(&contents).map_err(ConfigError::Parse)?;

        debug!(
            device = config.device.as_ref().map(|d| d.identity.device_id.as_str()),
            "config loaded"
        );

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `<home>/config.toml`, creating `home` if needed
    pub fn save(&self, home: &Path) -> Result<()> {
        debug!("saving config");
        self.validate()?;

        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::create_dir_all(home)?;
        std::fs::write(Self::config_path(home), contents)?;
        Ok(())
    }

    /// The local device section.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotInitialized` before `init`.
    pub fn device(&self) -> Result<&DeviceSection> {
        self.device
            .as_ref()
            .ok_or_else(|| ConfigError::NotInitialized.into())
    }

    pub fn prekey_policy(&self) -> PrekeyPolicy {
        PrekeyPolicy {
            signed_ttl: Duration::days(self.prekeys.signed_ttl_days),
            one_time_batch: self.prekeys.one_time_batch,
        }
    }

    /// Secret store selected by `[store] backend`.
    pub fn secret_store(&self, home: &Path) -> Result<std::sync::Arc<dyn SecretStore>> {
        store::default_backend(self.store.backend, &Self::key_dir(home))
    }

    /// Validate the configuration structure and contents
    ///
    /// Checks:
    /// - Version field is non-empty and looks like semver
    /// - Prekey policy is in range
    /// - Device public keys parse, and the signed prekey verifies
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` on validation failure.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| ConfigError::Invalid(reason);

        if self.coffer.version.split('.').count() < 2 {
            return Err(invalid(format!("not a valid version: '{}'", self.coffer.version)).into());
        }

        if self.prekeys.signed_ttl_days <= 0 {
            return Err(invalid("prekeys.signed_ttl_days must be positive".to_string()).into());
        }
        if self.prekeys.one_time_batch == 0
            || self.prekeys.one_time_batch > constants::MAX_ONE_TIME_PREKEY_BATCH
        {
            return Err(invalid(format!(
                "prekeys.one_time_batch must be between 1 and {}",
                constants::MAX_ONE_TIME_PREKEY_BATCH
            ))
            .into());
        }

        if let Some(device) = &self.device {
            let signer = device
                .identity
                .verifying_key()
                .map_err(|e| invalid(format!("device.identity: {}", e)))?;
            device
                .identity
                .encryption_key()
                .map_err(|e| invalid(format!("device.identity: {}", e)))?;
            if let Some(prekey) = &device.signed_prekey {
                prekey
                    .verify(&signer)
                    .map_err(|e| invalid(format!("device.signed_prekey: {}", e)))?;
            }
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::IdentityManager;
    use crate::core::store::Memory;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn device() -> DeviceSection {
        let manager = IdentityManager::new(Arc::new(Memory::new()));
        let identity = manager.create_device_identity(Some("laptop"), Some("linux")).unwrap();
        let signed_prekey = manager.create_signed_prekey(&identity).unwrap();
        let one_time_prekeys = manager.create_one_time_prekeys(2).unwrap();
        DeviceSection {
            identity,
            signed_prekey: Some(signed_prekey),
            one_time_prekeys,
        }
    }

    #[test]
    fn test_config_save_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::new();
        config.device = Some(device());
        config.save(tmp.path()).unwrap();
        assert!(Config::exists(tmp.path()));

        let loaded = Config::load(tmp.path()).unwrap();
        let section = loaded.device().unwrap();
        assert_eq!(section.identity, config.device.as_ref().unwrap().identity);
        assert_eq!(section.one_time_prekeys.len(), 2);
        assert!(section.one_time_prekeys.iter().all(|p| !p.has_private_key()));
    }

    #[test]
    fn test_load_missing_is_not_initialized() {
        let tmp = TempDir::new().unwrap();
        let err = Config::load(tmp.path()).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Config(ConfigError::NotInitialized)
        ));
        assert!(Config::new().device().is_err());
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(Config::config_path(tmp.path()), "[coffer]\nversion = \"0.1.0\"\n").unwrap();
        let config = Config::load(tmp.path()).unwrap();
        assert_eq!(config.prekeys.one_time_batch, constants::ONE_TIME_PREKEY_BATCH);
        assert_eq!(config.store.backend, Backend::Auto);
        assert_eq!(
            config.prekey_policy().signed_ttl,
            Duration::days(constants::SIGNED_PREKEY_TTL_DAYS)
        );
    }

    #[test]
    fn test_validate_rejects_bad_policy() {
        let mut config = Config::new();
        config.prekeys.one_time_batch = constants::MAX_ONE_TIME_PREKEY_BATCH + 1;
        assert!(config.validate().is_err());

        let mut config = Config::new();
        config.prekeys.signed_ttl_days = 0;
        assert!(config.validate().is_err());

        let mut config = Config::new();
        config.coffer.version = "1".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_forged_prekey() {
        let mut config = Config::new();
        let mut section = device();
        let other = device();
        section.signed_prekey = other.signed_prekey;
        config.device = Some(section);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_error() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(Config::config_path(tmp.path()), "[coffer\n").unwrap();
        assert!(matches!(
            Config::load(tmp.path()).unwrap_err(),
            crate::error::Error::Config(ConfigError::Parse(_))
        ));
    }
}
