//! Key derivation hierarchy.
//!
//! HKDF-SHA256 over versioned context strings of the form
//! `<kdf-version>:<scope>:<id>:<suffix>`:
//!
//! ```text
//! masterSeed ─ org:<orgId>:kek ─> orgKEK
//!   orgKEK   ─ proj:<projectId>:kek ─> projKEK
//!   projKEK  ─ env:<envName>:kek ─> envKEK
//!   envKEK   ─ var:<varName>:v<version> ─> varDEK
//! ```
//!
//! Every function here is pure. Nothing is memoized; callers cache.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::core::cipher::SymmetricKey;
use crate::core::constants::{KDF_VERSION, KEY_LEN};
use crate::error::{CipherError, Result, ValidationError};

/// Largest HKDF-SHA256 output (255 blocks of 32 bytes).
pub const MAX_OUTPUT_LEN: usize = 255 * 32;

/// Salt used when none is given (RFC 5869: a string of HashLen zeros).
pub const DEFAULT_SALT: [u8; 32] = [0u8; 32];

/// Derive `length` bytes from `root` with HKDF-SHA256.
///
/// # Errors
///
/// Returns `ValidationError` for an empty root, an empty `info`, or a
/// `length` of zero or above [`MAX_OUTPUT_LEN`].
pub fn derive(
    root: &[u8],
    info: &str,
    salt: Option<&[u8]>,
    length: usize,
) -> Result<Zeroizing<Vec<u8>>> {
    if root.is_empty() {
        return Err(ValidationError::Empty("root key material").into());
    }
    if info.is_empty() {
        return Err(ValidationError::Empty("derivation info").into());
    }
    if length == 0 || length > MAX_OUTPUT_LEN {
        return Err(ValidationError::InvalidLength(length).into());
    }

    let hk = Hkdf::<Sha256>::new(Some(salt.unwrap_or(&DEFAULT_SALT)), root);
    let mut okm = Zeroizing::new(vec![0u8; length]);
    hk.expand(info.as_bytes(), okm.as_mut_slice())
        .map_err(|e| CipherError::KeyDerivation(e.to_string()))?;
    Ok(okm)
}

/// Derive a 32-byte key with the default salt.
pub fn derive_key(root: &[u8], info: &str) -> Result<SymmetricKey> {
    let okm = derive(root, info, None, KEY_LEN)?;
    SymmetricKey::from_slice(&okm)
}

/// Build a versioned context string.
pub fn context(scope: &str, id: &str, suffix: &str) -> String {
    format!("{}:{}:{}:{}", KDF_VERSION, scope, id, suffix)
}

fn require(what: &'static str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(ValidationError::Empty(what).into());
    }
    Ok(())
}

/// `orgKEK = HKDF(masterSeed, "v1:org:<orgId>:kek")`
pub fn org_kek(master_seed: &[u8], org_id: &str) -> Result<SymmetricKey> {
    require("organization id", org_id)?;
    derive_key(master_seed, &context("org", org_id, "kek"))
}

/// `projKEK = HKDF(orgKEK, "v1:proj:<projectId>:kek")`
pub fn project_kek(org_kek: &SymmetricKey, project_id: &str) -> Result<SymmetricKey> {
    require("project id", project_id)?;
    derive_key(org_kek.as_bytes(), &context("proj", project_id, "kek"))
}

/// `envKEK = HKDF(projKEK, "v1:env:<envName>:kek")`
pub fn env_kek(project_kek: &SymmetricKey, env_name: &str) -> Result<SymmetricKey> {
    require("environment name", env_name)?;
    derive_key(project_kek.as_bytes(), &context("env", env_name, "kek"))
}

/// `varDEK = HKDF(envKEK, "v1:var:<varName>:v<version>")`
pub fn var_dek(env_kek: &SymmetricKey, var_name: &str, version: u32) -> Result<SymmetricKey> {
    require("variable name", var_name)?;
    derive_key(
        env_kek.as_bytes(),
        &context("var", var_name, &format!("v{}", version)),
    )
}

/// Walk the whole chain from the organization master seed to an
/// environment key.
pub fn env_kek_from_master(
    master_seed: &[u8],
    org_id: &str,
    project_id: &str,
    env_name: &str,
) -> Result<SymmetricKey> {
    let org = org_kek(master_seed, org_id)?;
    let project = project_kek(&org, project_id)?;
    env_kek(&project, env_name)
}
