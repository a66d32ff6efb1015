//! Filesystem-based secret storage.
//!
//! One file per key name under `$COFFER_HOME/keys/`. File names are the
//! hex encoding of the key name, contents are base64.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use zeroize::Zeroizing;

use super::SecretStore;
use crate::core::encoding;
use crate::error::{Result, StoreError, ValidationError};

/// Validate file permissions (Unix only).
#[cfg(unix)]
fn validate_file_permissions(path: &Path, expected_mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::metadata(path).map_err(StoreError::ReadFailed)?;
    let actual_mode = metadata.permissions().mode() & 0o777;

    if actual_mode != expected_mode {
        return Err(ValidationError::InvalidPermissions {
            path: path.display().to_string(),
            expected: format!("{:o}", expected_mode),
            actual: format!("{:o}", actual_mode),
        }
        .into());
    }

    Ok(())
}

/// Filesystem-based key storage rooted at a directory.
#[derive(Debug, Clone)]
pub struct Filesystem {
    dir: PathBuf,
}

impl Filesystem {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.key", hex::encode(name.as_bytes())))
    }
}

impl SecretStore for Filesystem {
    fn get_key(&self, name: &str) -> Result<Option<Zeroizing<Vec<u8>>>> {
        let path = self.path(name);
        if !path.exists() {
            return Ok(None);
        }

        #[cfg(unix)]
        {
            if let Err(e) = validate_file_permissions(&path, 0o600) {
                warn!(path = %path.display(), "{}", e);
                warn!("run: chmod 600 {}", path.display());
            }
        }

        let contents = Zeroizing::new(fs::read_to_string(&path).map_err(StoreError::ReadFailed)?);
        let bytes = encoding::decode("key file", contents.trim()).map_err(|e| {
            StoreError::InvalidFormat {
                name: name.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Some(Zeroizing::new(bytes)))
    }

    fn set_key(&self, name: &str, bytes: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(StoreError::WriteFailed)?;
        let path = self.path(name);

        let contents = Zeroizing::new(format!("{}\n", encoding::encode(bytes)));
        fs::write(&path, contents.as_bytes()).map_err(StoreError::WriteFailed)?;

        // Restrict permissions on key file (Unix only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))
                .map_err(StoreError::WriteFailed)?;
        }

        debug!(name = %name, "stored key on filesystem");
        Ok(())
    }

    fn delete_key(&self, name: &str) -> Result<()> {
        match fs::remove_file(self.path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::WriteFailed(e).into()),
        }
    }

    fn has_key(&self, name: &str) -> bool {
        self.path(name).exists()
    }
}
