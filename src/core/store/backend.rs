//! Backend selection logic for secret storage
//!
//! Chooses Keychain or Filesystem from the configured [`Backend`], the
//! platform, and `COFFER_NO_KEYCHAIN`.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
#[cfg(target_os = "macos")]
use tracing::warn;

use super::{Filesystem, SecretStore};
#[cfg(target_os = "macos")]
use super::keychain::Keychain;
use crate::error::Result;
#[cfg(not(target_os = "macos"))]
use crate::error::ConfigError;
#[cfg(target_os = "macos")]
use zeroize::Zeroizing;

/// Configured storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Keychain on macOS (unless disabled), filesystem elsewhere
    #[default]
    Auto,
    Filesystem,
    Keychain,
}

/// Build the store for `backend`, with filesystem keys under `key_dir`.
///
/// On macOS `Auto` reads from Keychain first and falls back to the
/// filesystem; writes go to Keychain. `COFFER_NO_KEYCHAIN=1` forces the
/// filesystem.
///
/// # Errors
///
/// Returns `ConfigError::Invalid` when `Keychain` is requested on a
/// platform without one.
pub fn default_backend(backend: Backend, key_dir: &Path) -> Result<Arc<dyn SecretStore>> {
    let filesystem = Filesystem::new(key_dir);

    match backend {
        Backend::Filesystem => {
            info!(dir = %key_dir.display(), "using filesystem backend");
            Ok(Arc::new(filesystem))
        }
        Backend::Keychain => keychain_only(),
        Backend::Auto => {
            #[cfg(target_os = "macos")]
            {
                if should_use_keychain() {
                    match Keychain::new() {
                        Ok(keychain) => {
                            info!("using macOS Keychain backend");
                            return Ok(Arc::new(KeychainThenFilesystem {
                                keychain,
                                filesystem,
                            }));
                        }
                        Err(e) => warn!("failed to initialize Keychain backend: {}", e),
                    }
                } else {
                    info!("Keychain disabled (COFFER_NO_KEYCHAIN=1)");
                }
            }
            info!(dir = %key_dir.display(), "using filesystem backend");
            Ok(Arc::new(filesystem))
        }
    }
}

#[cfg(target_os = "macos")]
fn keychain_only() -> Result<Arc<dyn SecretStore>> {
    Ok(Arc::new(Keychain::new()?))
}

#[cfg(not(target_os = "macos"))]
fn keychain_only() -> Result<Arc<dyn SecretStore>> {
    Err(ConfigError::Invalid("the keychain backend is only available on macOS".to_string()).into())
}

/// macOS: enabled by default, disabled if COFFER_NO_KEYCHAIN is set
#[cfg(target_os = "macos")]
fn should_use_keychain() -> bool {
    std::env::var("COFFER_NO_KEYCHAIN").is_err()
}

#[cfg(target_os = "macos")]
struct KeychainThenFilesystem {
    keychain: Keychain,
    filesystem: Filesystem,
}

#[cfg(target_os = "macos")]
impl SecretStore for KeychainThenFilesystem {
    fn get_key(&self, name: &str) -> Result<Option<Zeroizing<Vec<u8>>>> {
        match self.keychain.get_key(name) {
            Ok(Some(bytes)) => Ok(Some(bytes)),
            _ => self.filesystem.get_key(name),
        }
    }

    fn set_key(&self, name: &str, bytes: &[u8]) -> Result<()> {
        self.keychain.set_key(name, bytes)
    }

    fn delete_key(&self, name: &str) -> Result<()> {
        self.keychain.delete_key(name)?;
        self.filesystem.delete_key(name)
    }
}
