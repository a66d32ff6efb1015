//! Deployment token tests.

mod support;

use std::sync::Arc;

use coffer::core::deploy::{DeploymentDecryptor, DERIVED_KEY_VERSION};
use coffer::core::domain::{DeploymentCredential, FailureKind, RecipientKind};
use coffer::core::keys::CachedKey;
use coffer::core::remote::{MemoryRemote, Remote};
use coffer::core::{kdf, secrets};
use coffer::error::{AccessError, Error, RemoteError};
use support::*;

const ORG_SEED: &[u8] = b"organization master seed, 32 b!!";

fn decryptor(remote: &Arc<MemoryRemote>) -> DeploymentDecryptor {
    DeploymentDecryptor::new(remote.clone())
}

fn seeded(remote: &Arc<MemoryRemote>) -> Device {
    let alice = Device::join("alice", remote);
    let vault = alice.vault(remote);
    for (name, value) in STANDARD_SECRETS {
        vault.set(name, value).unwrap();
    }
    alice
}

#[test]
fn test_token_pulls_bundle() {
    let remote = remote();
    let alice = seeded(&remote);
    let (credential, token) = alice.vault(&remote).create_token().unwrap();
    assert_eq!(token.environment_id, "api/prod");
    assert!(token.is_active());

    // what CI sees: only the token string
    let encoded = credential.encode();
    assert!(encoded.starts_with("cft_"));
    let parsed = DeploymentCredential::parse(&encoded).unwrap();

    let report = decryptor(&remote).decrypt_bundle(&parsed, &scope()).unwrap();
    assert!(report.is_clean(), "{:?}", report.failures);
    for (name, value) in STANDARD_SECRETS {
        assert_pulled(&report, name, value);
    }

    let key = decryptor(&remote)
        .resolve_environment_key(&parsed, &scope())
        .unwrap();
    assert_eq!(key.version, 1);
}

#[test]
fn test_token_before_first_secret() {
    let remote = remote();
    let alice = Device::join("alice", &remote);
    let vault = alice.vault(&remote);
    let (credential, _) = vault.create_token().unwrap();
    vault.set("API_KEY", "late").unwrap();

    let report = decryptor(&remote).decrypt_bundle(&credential, &scope()).unwrap();
    assert_pulled(&report, "API_KEY", "late");
}

#[test]
fn test_revoked_token_is_refused() {
    let remote = remote();
    let alice = seeded(&remote);
    let vault = alice.vault(&remote);
    let (credential, token) = vault.create_token().unwrap();

    vault.revoke_token(&token.id).unwrap();
    vault.revoke_token(&token.id).unwrap();
    vault.revoke_token("never-existed").unwrap();

    let err = decryptor(&remote)
        .decrypt_bundle(&credential, &scope())
        .unwrap_err();
    assert!(matches!(err, Error::Access(AccessError::TokenRevoked(ref id)) if *id == token.id));

    let record = remote.fetch_environment_key(PROJECT, ENV).unwrap().unwrap();
    let envelope = record.envelope.unwrap();
    assert!(envelope
        .recipient(RecipientKind::Deployment, &token.id)
        .is_none());
    assert!(envelope.recipient(RecipientKind::Device, alice.id()).is_some());
}

#[test]
fn test_unknown_token_is_not_found() {
    let remote = remote();
    seeded(&remote);
    let (stranger, _) = DeploymentCredential::generate("api/prod").unwrap();
    let err = decryptor(&remote)
        .decrypt_bundle(&stranger, &scope())
        .unwrap_err();
    assert!(matches!(err, Error::Remote(RemoteError::NotFound(_))));
}

#[test]
fn test_unshared_token_needs_reshare() {
    let remote = remote();
    let alice = seeded(&remote);
    let (credential, token) = DeploymentCredential::generate("api/prod").unwrap();
    remote.create_deployment_token(&token).unwrap();

    let err = decryptor(&remote)
        .decrypt_bundle(&credential, &scope())
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Access(AccessError::NotSharedWithToken { .. })
    ));

    alice.vault(&remote).share().unwrap();
    let report = decryptor(&remote).decrypt_bundle(&credential, &scope()).unwrap();
    assert!(report.is_clean());
}

#[test]
fn test_org_root_fallback() {
    let remote = remote();
    let alice = Device::new("alice");
    let (credential, token) = DeploymentCredential::generate("api/prod").unwrap();
    remote.create_deployment_token(&token).unwrap();

    // records written under the derived key, as a legacy operator would
    let derived = kdf::env_kek_from_master(ORG_SEED, ORG, PROJECT, ENV).unwrap();
    let key = CachedKey::new(derived, DERIVED_KEY_VERSION);
    let request = secrets::build_secret_payload(
        &scope(),
        "API_KEY",
        "derived",
        &key,
        &alice.keys().signing_key,
        None,
    )
    .unwrap();
    remote.push_secret(PROJECT, ENV, &request).unwrap();

    assert!(decryptor(&remote)
        .decrypt_bundle(&credential, &scope())
        .unwrap_err()
        .is_access());

    let operator = credential.with_org_root(ORG_SEED);
    let resolved = decryptor(&remote)
        .resolve_environment_key(&operator, &scope())
        .unwrap();
    assert_eq!(resolved.version, DERIVED_KEY_VERSION);
    assert_eq!(resolved.fingerprint, key.fingerprint);

    let report = decryptor(&remote).decrypt_bundle(&operator, &scope()).unwrap();
    assert_pulled(&report, "API_KEY", "derived");
}

#[test]
fn test_rotation_needs_reencrypt_for_tokens() {
    let remote = remote();
    let alice = seeded(&remote);
    let vault = alice.vault(&remote);
    let (credential, _) = vault.create_token().unwrap();

    let rotated = vault.rotate().unwrap();
    let resolved = decryptor(&remote)
        .resolve_environment_key(&credential, &scope())
        .unwrap();
    assert_eq!(resolved.fingerprint, rotated.fingerprint);

    // a token only ever holds the current key
    let report = decryptor(&remote).decrypt_bundle(&credential, &scope()).unwrap();
    assert!(report.values.is_empty());
    assert_eq!(report.failures.len(), STANDARD_SECRETS.len());
    assert!(report
        .failures
        .iter()
        .all(|f| f.kind == FailureKind::Integrity));

    assert_eq!(vault.reencrypt_all().unwrap().rewritten, STANDARD_SECRETS.len());
    let report = decryptor(&remote).decrypt_bundle(&credential, &scope()).unwrap();
    assert!(report.is_clean());
    assert_eq!(report.values.len(), STANDARD_SECRETS.len());
}

#[test]
fn test_rotate_token_replaces_old() {
    let remote = remote();
    let alice = seeded(&remote);
    let vault = alice.vault(&remote);
    let (old, old_token) = vault.create_token().unwrap();

    let (new, new_token) = vault.rotate_token(&old_token.id).unwrap();
    assert_ne!(new_token.id, old_token.id);

    assert!(decryptor(&remote).decrypt_bundle(&new, &scope()).unwrap().is_clean());
    assert!(matches!(
        decryptor(&remote).decrypt_bundle(&old, &scope()).unwrap_err(),
        Error::Access(AccessError::TokenRevoked(_))
    ));

    let tokens = remote.deployment_tokens("api/prod").unwrap();
    assert_eq!(tokens.len(), 2);
    assert_eq!(tokens.iter().filter(|t| t.is_active()).count(), 1);
}

#[test]
fn test_token_is_scoped_to_its_environment() {
    let remote = remote();
    let alice = seeded(&remote);
    let (credential, _) = alice.vault(&remote).create_token().unwrap();

    let staging = coffer::core::domain::Scope::new(ORG, PROJECT, "staging").unwrap();
    let err = decryptor(&remote)
        .decrypt_bundle(&credential, &staging)
        .unwrap_err();
    assert!(matches!(err, Error::Remote(RemoteError::NotFound(_))));
}
