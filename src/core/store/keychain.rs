//! macOS Keychain backend for secret storage.
//!
//! Every key name becomes a generic password under the `com.coffer`
//! service, with the key name as the account.

#![cfg(target_os = "macos")]

use security_framework::passwords::{
    delete_generic_password, get_generic_password, set_generic_password,
};
use tracing::{debug, error, info};
use zeroize::Zeroizing;

use super::SecretStore;
use crate::error::{Result, StoreError};

/// errSecItemNotFound
const ITEM_NOT_FOUND: i32 = -25300;
/// errSecUserCanceled / authorization denied
const USER_CANCELED: i32 = -128;

/// Keychain backend for storing key material
pub struct Keychain {
    service: String,
}

impl Keychain {
    /// Service name for all coffer items in Keychain
    const SERVICE_NAME: &'static str = "com.coffer";

    /// Create a new Keychain backend
    pub fn new() -> Result<Self> {
        Ok(Self {
            service: Self::SERVICE_NAME.to_string(),
        })
    }

    fn map_error(account: &str, e: security_framework::base::Error) -> StoreError {
        let code = e.code();
        error!(account = %account, error_code = code, error = %e, "keychain operation failed");
        if code == USER_CANCELED {
            StoreError::KeychainAccessDenied
        } else {
            StoreError::KeychainError(e.to_string())
        }
    }
}

impl SecretStore for Keychain {
    fn get_key(&self, name: &str) -> Result<Option<Zeroizing<Vec<u8>>>> {
        match get_generic_password(&self.service, name) {
            Ok(bytes) => {
                debug!(account = %name, "loaded key from Keychain");
                Ok(Some(Zeroizing::new(bytes)))
            }
            Err(e) if e.code() == ITEM_NOT_FOUND => Ok(None),
            Err(e) => Err(Self::map_error(name, e).into()),
        }
    }

    fn set_key(&self, name: &str, bytes: &[u8]) -> Result<()> {
        set_generic_password(&self.service, name, bytes)
            .map_err(|e| Self::map_error(name, e))?;
        info!(account = %name, service = %self.service, "stored key in Keychain");
        Ok(())
    }

    fn delete_key(&self, name: &str) -> Result<()> {
        match delete_generic_password(&self.service, name) {
            Ok(()) => {
                info!(account = %name, "deleted key from Keychain");
                Ok(())
            }
            // Item not found is not an error for delete
            Err(e) if e.code() == ITEM_NOT_FOUND => Ok(()),
            Err(e) => Err(Self::map_error(name, e).into()),
        }
    }
}
