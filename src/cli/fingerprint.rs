//! Fingerprint command.

use std::path::Path;

use zeroize::Zeroizing;

use crate::cli::output;
use crate::core::cipher::SymmetricKey;
use crate::error::Result;

/// Print `hex(SHA-256(key))` for a raw 32-byte key file.
pub fn execute(file: &Path) -> Result<()> {
    let bytes = Zeroizing::new(std::fs::read(file)?);
    let key = SymmetricKey::from_slice(&bytes)?;
    output::data(&key.fingerprint());
    Ok(())
}
