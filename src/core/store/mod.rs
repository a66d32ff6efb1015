//! Secret store abstraction.
//!
//! Private key material (device keys, prekeys, cached environment keys)
//! lives behind [`SecretStore`], a flat name → bytes map. The engine never
//! assumes a particular backend.
//!
//! ## Adding a New Storage Backend
//!
//! 1. Implement the `SecretStore` trait
//! 2. Add the implementation in a new file (e.g., `vault.rs`)
//! 3. Re-export from this module and wire it into [`default_backend`]
//!
//! ## Key names
//!
//! | Name | Contents |
//! |---|---|
//! | `device:<id>:signingKey` | Ed25519 seed |
//! | `device:<id>:encryptionKey` | X25519 scalar |
//! | `prekey:<id>` | X25519 scalar of a signed or one-time prekey |
//! | `env:<project>:<env>:kek` | cached environment key record |

use zeroize::Zeroizing;

use crate::error::Result;

mod backend;
mod fs;
mod memory;

#[cfg(target_os = "macos")]
pub mod keychain;

pub use backend::{default_backend, Backend};
pub use fs::Filesystem;
pub use memory::Memory;

/// Key-value store for private key material.
///
/// Implementations must be safe to share across threads.
pub trait SecretStore: Send + Sync {
    /// Fetch the bytes stored under `name`.
    ///
    /// # Returns
    ///
    /// `None` if nothing is stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend cannot be read.
    fn get_key(&self, name: &str) -> Result<Option<Zeroizing<Vec<u8>>>>;

    /// Store `bytes` under `name`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend cannot be written.
    fn set_key(&self, name: &str, bytes: &[u8]) -> Result<()>;

    /// Remove `name`. Deleting an absent name succeeds.
    fn delete_key(&self, name: &str) -> Result<()>;

    /// Check whether anything is stored under `name`.
    fn has_key(&self, name: &str) -> bool {
        matches!(self.get_key(name), Ok(Some(_)))
    }
}

/// Fetch `name` or fail with `StoreError::NoPrivateKey`.
pub fn require_key(store: &dyn SecretStore, name: &str) -> Result<Zeroizing<Vec<u8>>> {
    store
        .get_key(name)?
        .ok_or_else(|| crate::error::StoreError::NoPrivateKey(name.to_string()).into())
}

/// Fetch `name` as a fixed 32-byte secret.
pub fn require_key32(store: &dyn SecretStore, name: &str) -> Result<Zeroizing<[u8; 32]>> {
    let bytes = require_key(store, name)?;
    if bytes.len() != 32 {
        return Err(crate::error::StoreError::InvalidFormat {
            name: name.to_string(),
            reason: format!("expected 32 bytes, got {}", bytes.len()),
        }
        .into());
    }
    let mut out = Zeroizing::new([0u8; 32]);
    out.copy_from_slice(&bytes);
    Ok(out)
}
