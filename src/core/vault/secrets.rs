//! Secret operations.
//!
//! Push, pull and re-encrypt secrets in the vault's environment.

use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::Vault;
use crate::core::domain::{PullReport, ReencryptReport, SecretCiphertext};
use crate::core::secrets::{self, Keyring};
use crate::error::{RemoteError, Result};

impl Vault {
    /// Set a secret, overwriting any current value.
    ///
    /// # Returns
    ///
    /// The stored record, with its new version.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the name or value is invalid.
    /// Returns `AccessError` if the environment key isn't available to this
    /// device.
    pub fn set(&self, name: &str, value: &str) -> Result<SecretCiphertext> {
        self.push(name, value, None)
    }

    /// Set a secret only if its current version is `if_version`.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Conflict` if someone else wrote first.
    pub fn update(&self, name: &str, value: &str, if_version: u64) -> Result<SecretCiphertext> {
        self.push(name, value, Some(if_version))
    }

    fn push(&self, name: &str, value: &str, if_version: Option<u64>) -> Result<SecretCiphertext> {
        let key = self.keys.ensure_published(&self.scope, &self.device)?;
        let request = secrets::build_secret_payload(
            &self.scope,
            name,
            value,
            &key,
            &self.device.signing_key,
            if_version,
        )?;
        let record = self
            .remote
            .push_secret(&self.scope.project, &self.scope.env, &request)?;
        debug!(name = %name, version = record.version, "pushed secret");
        Ok(record)
    }

    fn keyring(&self) -> Result<Keyring> {
        self.keys.ensure_environment_key(&self.scope, &self.device)?;
        Ok(Keyring::new(
            &self.scope,
            self.keys.cache().keys(&self.scope)?,
        ))
    }

    /// Decrypt every secret in the environment.
    ///
    /// Records that fail to decrypt are reported, not fatal.
    ///
    /// # Errors
    ///
    /// Returns `AccessError` if the environment key isn't shared with this
    /// device, or a `RemoteError` from the pull.
    pub fn pull(&self) -> Result<PullReport> {
        let keyring = self.keyring()?;
        let records = self
            .remote
            .pull_secrets(&self.scope.project, &self.scope.env)?;
        Ok(secrets::decrypt_bundle(&records, &self.scope, &keyring))
    }

    /// Get a decrypted secret.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::NotFound` if the name doesn't exist, and the
    /// integrity error if its latest version doesn't decrypt.
    pub fn get(&self, name: &str) -> Result<Zeroizing<String>> {
        let keyring = self.keyring()?;
        let records = self
            .remote
            .pull_secrets(&self.scope.project, &self.scope.env)?;
        let record = secrets::latest(&records)
            .into_iter()
            .find(|r| r.name() == name)
            .ok_or_else(|| RemoteError::NotFound(format!("secret {}", name)))?;
        secrets::decrypt_secret(record, &self.scope, &keyring)
    }

    /// Re-encrypt every secret still under an older environment key.
    ///
    /// A record that does not decrypt is reported and skipped; it never
    /// stops the others from being rewritten.
    ///
    /// # Errors
    ///
    /// Returns a `RemoteError` if the pull or a push fails.
    pub fn reencrypt_all(&self) -> Result<ReencryptReport> {
        let current = self.keys.ensure_published(&self.scope, &self.device)?;
        let keyring = Keyring::new(&self.scope, self.keys.cache().keys(&self.scope)?);
        let records = self
            .remote
            .pull_secrets(&self.scope.project, &self.scope.env)?;

        let mut report = ReencryptReport::default();
        for record in secrets::latest(&records) {
            if record.payload.env_kek_fingerprint.as_deref() == Some(current.fingerprint.as_str()) {
                continue;
            }
            let request = match secrets::reencrypt(
                record,
                &self.scope,
                &keyring,
                &current,
                &self.device.signing_key,
            ) {
                Ok(request) => request,
                Err(e) => {
                    warn!(name = %record.name(), version = record.version, "not re-encrypted: {}", e);
                    report.failures.push(secrets::failure(record.name(), &e));
                    continue;
                }
            };
            self.remote
                .push_secret(&self.scope.project, &self.scope.env, &request)?;
            report.rewritten += 1;
        }

        info!(
            scope = %self.scope,
            rewritten = report.rewritten,
            failed = report.failures.len(),
            "re-encrypted secrets"
        );
        Ok(report)
    }
}
