//! Init command - create the local device.

use tracing::info;

use crate::cli::output;
use crate::core::config::{self, Config, DeviceSection};
use crate::core::identity::IdentityManager;
use crate::error::{ConfigError, Result};

/// Create this device's identity, signed prekey and first one-time batch.
pub fn execute(name: Option<String>, platform: Option<String>, force: bool) -> Result<()> {
    let home = config::home()?;
    if Config::exists(&home) && !force {
        return Err(ConfigError::AlreadyInitialized(
            Config::config_path(&home).display().to_string(),
        )
        .into());
    }

    let mut config = if force && Config::exists(&home) {
        Config::load(&home)?
    } else {
        Config::new()
    };

    let store = config.secret_store(&home)?;
    let manager = IdentityManager::with_policy(store, config.prekey_policy());

    let identity = manager.create_device_identity(name.as_deref(), platform.as_deref())?;
    let signed_prekey = manager.create_signed_prekey(&identity)?;
    let one_time_prekeys = manager.create_one_time_prekeys(config.prekeys.one_time_batch)?;
    let one_time = one_time_prekeys.len();

    if let Some(old) = config.device.take() {
        info!(device_id = %old.identity.device_id, "replacing device");
        let prekey_ids: Vec<String> = old
            .signed_prekey
            .iter()
            .map(|p| p.id.clone())
            .chain(old.one_time_prekeys.iter().map(|p| p.id.clone()))
            .collect();
        forget_local(&manager, &old.identity.device_id, &prekey_ids)?;
    }

    config.device = Some(DeviceSection {
        identity: identity.clone(),
        signed_prekey: Some(signed_prekey),
        one_time_prekeys,
    });
    config.save(&home)?;

    output::success(&format!("initialized device {}", identity));
    output::kv("config:", output::path(&Config::config_path(&home).display().to_string()));
    output::kv("one-time prekeys:", one_time);
    info!(device_id = %identity.device_id, "initialized");
    Ok(())
}

fn forget_local(manager: &IdentityManager, device_id: &str, prekey_ids: &[String]) -> Result<()> {
    use crate::core::domain::identity::{encryption_key_name, signing_key_name};
    use crate::core::domain::prekey::prekey_key_name;

    let store = manager.store();
    for id in prekey_ids {
        store.delete_key(&prekey_key_name(id))?;
    }
    store.delete_key(&signing_key_name(device_id))?;
    store.delete_key(&encryption_key_name(device_id))
}
