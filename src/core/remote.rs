//! Remote service collaborator.
//!
//! The engine never talks HTTP. It needs a handful of fetch/publish
//! operations on JSON-shaped records, expressed by [`Remote`]. Transport,
//! retries and pagination belong to the implementation; its errors pass
//! through unchanged as `RemoteError`.
//!
//! [`MemoryRemote`] is a complete in-process implementation used by tests
//! and local tooling. It enforces the same version rules a real service
//! does (monotonic key versions, optimistic concurrency on secrets).

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use chrono::Utc;
use tracing::debug;

use crate::core::domain::{
    AddEnvelopeRequest, CreateKeyRequest, DeploymentToken, DeviceIdentity, EnvironmentKeyRecord,
    OneTimePrekey, PrekeyBundle, SecretCiphertext, SecretUploadRequest, SignedPrekey, TokenStatus,
};
use crate::error::{RemoteError, Result};

/// Operations the engine needs from the backing service.
pub trait Remote: Send + Sync {
    // Devices and prekeys

    fn register_device(&self, identity: &DeviceIdentity) -> Result<()>;

    /// Revoke a device. `RemoteError::NotFound` if unknown.
    fn revoke_device(&self, device_id: &str) -> Result<()>;

    fn publish_signed_prekey(&self, device_id: &str, prekey: &SignedPrekey) -> Result<()>;

    fn publish_one_time_prekeys(&self, device_id: &str, prekeys: &[OneTimePrekey]) -> Result<()>;

    /// Number of published, unconsumed one-time prekeys.
    fn count_one_time_prekeys(&self, device_id: &str) -> Result<usize>;

    /// One-time prekeys the service has handed out, with `consumed_at` set.
    fn consumed_one_time_prekeys(&self, device_id: &str) -> Result<Vec<OneTimePrekey>>;

    /// Fetch a device's bundle, consuming one one-time prekey if available.
    fn fetch_prekey_bundle(&self, device_id: &str) -> Result<PrekeyBundle>;

    // Environment keys

    /// Devices currently authorized for an environment.
    fn environment_devices(&self, project_id: &str, env_name: &str) -> Result<Vec<DeviceIdentity>>;

    /// Deployment tokens bound to an environment, in any status.
    fn deployment_tokens(&self, environment_id: &str) -> Result<Vec<DeploymentToken>>;

    fn fetch_environment_key(
        &self,
        project_id: &str,
        env_name: &str,
    ) -> Result<Option<EnvironmentKeyRecord>>;

    /// Publish a new key version. `Conflict` unless it is exactly one above
    /// the current version (or the first).
    fn create_environment_key(
        &self,
        project_id: &str,
        env_name: &str,
        request: &CreateKeyRequest,
    ) -> Result<EnvironmentKeyRecord>;

    /// Replace the envelope of the current version. `Conflict` if the
    /// version or fingerprint does not match.
    fn add_key_envelope(
        &self,
        project_id: &str,
        env_name: &str,
        request: &AddEnvelopeRequest,
    ) -> Result<EnvironmentKeyRecord>;

    // Secrets

    fn push_secret(
        &self,
        project_id: &str,
        env_name: &str,
        request: &SecretUploadRequest,
    ) -> Result<SecretCiphertext>;

    /// Every stored version of every secret in the environment.
    fn pull_secrets(&self, project_id: &str, env_name: &str) -> Result<Vec<SecretCiphertext>>;

    // Deployment tokens

    fn create_deployment_token(&self, token: &DeploymentToken) -> Result<()>;

    fn revoke_deployment_token(&self, token_id: &str) -> Result<()>;
}

#[derive(Default)]
struct DeviceEntry {
    identity: Option<DeviceIdentity>,
    signed_prekey: Option<SignedPrekey>,
    one_time: Vec<OneTimePrekey>,
    revoked: bool,
}

#[derive(Default)]
struct State {
    devices: HashMap<String, DeviceEntry>,
    grants: HashMap<(String, String), HashSet<String>>,
    keys: HashMap<(String, String), EnvironmentKeyRecord>,
    secrets: HashMap<(String, String), Vec<SecretCiphertext>>,
    tokens: BTreeMap<String, DeploymentToken>,
}

/// In-process remote.
#[derive(Default)]
pub struct MemoryRemote {
    state: Mutex<State>,
    offline: Mutex<bool>,
}

fn scope(project_id: &str, env_name: &str) -> (String, String) {
    (project_id.to_string(), env_name.to_string())
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with a transport error.
    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock().unwrap_or_else(|p| p.into_inner()) = offline;
    }

    /// Authorize a registered device for an environment.
    pub fn grant(&self, project_id: &str, env_name: &str, device_id: &str) -> Result<()> {
        let mut state = self.state()?;
        if !state.devices.contains_key(device_id) {
            return Err(RemoteError::NotFound(format!("device {}", device_id)).into());
        }
        state
            .grants
            .entry(scope(project_id, env_name))
            .or_default()
            .insert(device_id.to_string());
        Ok(())
    }

    /// Remove a device's access to an environment.
    pub fn revoke_grant(&self, project_id: &str, env_name: &str, device_id: &str) -> Result<()> {
        let mut state = self.state()?;
        if let Some(devices) = state.grants.get_mut(&scope(project_id, env_name)) {
            devices.remove(device_id);
        }
        Ok(())
    }

    /// Overwrite a stored secret record, bypassing version checks.
    pub fn tamper_secret(
        &self,
        project_id: &str,
        env_name: &str,
        name: &str,
        f: impl FnOnce(&mut SecretCiphertext),
    ) -> Result<()> {
        let mut state = self.state()?;
        let record = state
            .secrets
            .get_mut(&scope(project_id, env_name))
            .and_then(|records| records.iter_mut().rev().find(|r| r.payload.name == name))
            .ok_or_else(|| RemoteError::NotFound(format!("secret {}", name)))?;
        f(record);
        Ok(())
    }

    fn state(&self) -> Result<std::sync::MutexGuard<'_, State>> {
        if *self.offline.lock().unwrap_or_else(|p| p.into_inner()) {
            return Err(RemoteError::Transport("service unreachable".to_string()).into());
        }
        Ok(self.state.lock().unwrap_or_else(|p| p.into_inner()))
    }
}

fn active_device<'a>(state: &'a mut State, device_id: &str) -> Result<&'a mut DeviceEntry> {
    match state.devices.get_mut(device_id) {
        Some(entry) if !entry.revoked => Ok(entry),
        _ => Err(RemoteError::NotFound(format!("device {}", device_id)).into()),
    }
}

impl Remote for MemoryRemote {
    fn register_device(&self, identity: &DeviceIdentity) -> Result<()> {
        let mut state = self.state()?;
        let entry = state
            .devices
            .entry(identity.device_id.clone())
            .or_default();
        if entry.revoked {
            return Err(RemoteError::Conflict(format!(
                "device {} was revoked",
                identity.device_id
            ))
            .into());
        }
        entry.identity = Some(identity.clone());
        debug!(device_id = %identity.device_id, "registered device");
        Ok(())
    }

    fn revoke_device(&self, device_id: &str) -> Result<()> {
        let mut state = self.state()?;
        active_device(&mut state, device_id)?.revoked = true;
        for devices in state.grants.values_mut() {
            devices.remove(device_id);
        }
        Ok(())
    }

    fn publish_signed_prekey(&self, device_id: &str, prekey: &SignedPrekey) -> Result<()> {
        let mut state = self.state()?;
        active_device(&mut state, device_id)?.signed_prekey = Some(prekey.clone());
        Ok(())
    }

    fn publish_one_time_prekeys(&self, device_id: &str, prekeys: &[OneTimePrekey]) -> Result<()> {
        let mut state = self.state()?;
        let entry = active_device(&mut state, device_id)?;
        for prekey in prekeys {
            if entry.one_time.iter().all(|p| p.id != prekey.id) {
                entry.one_time.push(OneTimePrekey {
                    private_key: None,
                    ..prekey.clone()
                });
            }
        }
        Ok(())
    }

    fn count_one_time_prekeys(&self, device_id: &str) -> Result<usize> {
        let mut state = self.state()?;
        let entry = active_device(&mut state, device_id)?;
        Ok(entry.one_time.iter().filter(|p| !p.is_consumed()).count())
    }

    fn consumed_one_time_prekeys(&self, device_id: &str) -> Result<Vec<OneTimePrekey>> {
        let mut state = self.state()?;
        let entry = active_device(&mut state, device_id)?;
        Ok(entry
            .one_time
            .iter()
            .filter(|p| p.is_consumed())
            .cloned()
            .collect())
    }

    fn fetch_prekey_bundle(&self, device_id: &str) -> Result<PrekeyBundle> {
        let mut state = self.state()?;
        let entry = active_device(&mut state, device_id)?;
        let (Some(identity), Some(signed_prekey)) =
            (entry.identity.clone(), entry.signed_prekey.clone())
        else {
            return Err(RemoteError::NotFound(format!("prekey bundle for {}", device_id)).into());
        };
        let one_time_prekey = entry
            .one_time
            .iter_mut()
            .find(|p| !p.is_consumed())
            .map(|p| {
                p.consumed_at = Some(Utc::now());
                p.clone()
            });
        Ok(PrekeyBundle {
            identity,
            signed_prekey,
            one_time_prekey,
        })
    }

    fn environment_devices(&self, project_id: &str, env_name: &str) -> Result<Vec<DeviceIdentity>> {
        let state = self.state()?;
        let Some(granted) = state.grants.get(&scope(project_id, env_name)) else {
            return Ok(Vec::new());
        };
        let mut devices: Vec<DeviceIdentity> = granted
            .iter()
            .filter_map(|id| state.devices.get(id))
            .filter(|entry| !entry.revoked)
            .filter_map(|entry| entry.identity.clone())
            .collect();
        devices.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        Ok(devices)
    }

    fn deployment_tokens(&self, environment_id: &str) -> Result<Vec<DeploymentToken>> {
        let state = self.state()?;
        Ok(state
            .tokens
            .values()
            .filter(|t| t.environment_id == environment_id)
            .cloned()
            .collect())
    }

    fn fetch_environment_key(
        &self,
        project_id: &str,
        env_name: &str,
    ) -> Result<Option<EnvironmentKeyRecord>> {
        let state = self.state()?;
        Ok(state.keys.get(&scope(project_id, env_name)).cloned())
    }

    fn create_environment_key(
        &self,
        project_id: &str,
        env_name: &str,
        request: &CreateKeyRequest,
    ) -> Result<EnvironmentKeyRecord> {
        let mut state = self.state()?;
        let key = scope(project_id, env_name);
        let expected = state.keys.get(&key).map(|r| r.version + 1).unwrap_or(1);
        if request.version != expected {
            return Err(RemoteError::Conflict(format!(
                "environment key version {} for {}/{}: expected {}",
                request.version, project_id, env_name, expected
            ))
            .into());
        }
        let record = EnvironmentKeyRecord {
            project_id: project_id.to_string(),
            env_name: env_name.to_string(),
            version: request.version,
            fingerprint: request.fingerprint.clone(),
            envelope: Some(request.envelope.clone()),
        };
        state.keys.insert(key, record.clone());
        Ok(record)
    }

    fn add_key_envelope(
        &self,
        project_id: &str,
        env_name: &str,
        request: &AddEnvelopeRequest,
    ) -> Result<EnvironmentKeyRecord> {
        let mut state = self.state()?;
        let record = state
            .keys
            .get_mut(&scope(project_id, env_name))
            .ok_or_else(|| {
                RemoteError::NotFound(format!("environment key for {}/{}", project_id, env_name))
            })?;
        if record.version != request.version || record.fingerprint != request.fingerprint {
            return Err(RemoteError::Conflict(format!(
                "environment key for {}/{} is at version {}",
                project_id, env_name, record.version
            ))
            .into());
        }
        record.envelope = Some(request.envelope.clone());
        Ok(record.clone())
    }

    fn push_secret(
        &self,
        project_id: &str,
        env_name: &str,
        request: &SecretUploadRequest,
    ) -> Result<SecretCiphertext> {
        let mut state = self.state()?;
        let records = state.secrets.entry(scope(project_id, env_name)).or_default();
        let current = records
            .iter()
            .filter(|r| r.payload.name == request.payload.name)
            .map(|r| r.version)
            .max()
            .unwrap_or(0);
        if let Some(expected) = request.if_version {
            if expected != current {
                return Err(RemoteError::Conflict(format!(
                    "{} is at version {}, expected {}",
                    request.payload.name, current, expected
                ))
                .into());
            }
        }
        let record = SecretCiphertext {
            payload: request.payload.clone(),
            version: current + 1,
            client_sig: request.client_sig.clone(),
            device_id: None,
        };
        records.push(record.clone());
        Ok(record)
    }

    fn pull_secrets(&self, project_id: &str, env_name: &str) -> Result<Vec<SecretCiphertext>> {
        let state = self.state()?;
        Ok(state
            .secrets
            .get(&scope(project_id, env_name))
            .cloned()
            .unwrap_or_default())
    }

    fn create_deployment_token(&self, token: &DeploymentToken) -> Result<()> {
        let mut state = self.state()?;
        if state.tokens.contains_key(&token.id) {
            return Err(RemoteError::Conflict(format!("token {} exists", token.id)).into());
        }
        state.tokens.insert(token.id.clone(), token.clone());
        Ok(())
    }

    fn revoke_deployment_token(&self, token_id: &str) -> Result<()> {
        let mut state = self.state()?;
        let token = state
            .tokens
            .get_mut(token_id)
            .ok_or_else(|| RemoteError::NotFound(format!("token {}", token_id)))?;
        token.status = TokenStatus::Revoked;
        Ok(())
    }
}
