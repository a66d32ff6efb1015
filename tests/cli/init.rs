//! Tests for `coffer init` and `coffer whoami`.

use crate::support::*;

#[test]
fn test_init_creates_device() {
    let t = Test::new();
    let output = t.init_cmd("alice");
    assert_success(&output);
    assert_stderr_contains(&output, "initialized device alice");

    assert!(t.home.path().join("config.toml").exists());
    let config = t.config();
    assert_eq!(config["device"]["identity"]["name"].as_str(), Some("alice"));
    assert!(config["device"]["signed_prekey"]["id"].as_str().is_some());
    assert_eq!(
        config["device"]["one_time_prekeys"].as_array().map(|a| a.len()),
        Some(10)
    );

    // private keys never land in the config
    let raw = std::fs::read_to_string(t.home.path().join("config.toml")).unwrap();
    assert!(!raw.contains("private_key"));
    assert!(t.home.path().join("keys").is_dir());
}

#[test]
fn test_init_twice_fails() {
    let t = Test::init("alice");
    let output = t.init_cmd("alice");
    assert_failure(&output);
    assert_stderr_contains(&output, "already initialized");
    assert_stderr_contains(&output, "--force");
}

#[test]
fn test_init_force_replaces_device() {
    let t = Test::init("alice");
    let before = t.whoami_json();

    let output = t
        .cmd()
        .args(["init", "--name", "alice-2", "--force"])
        .output()
        .unwrap();
    assert_success(&output);

    let after = t.whoami_json();
    assert_ne!(before["device_id"], after["device_id"]);
    assert_eq!(after["name"], "alice-2");
}

#[test]
fn test_whoami_json() {
    let t = Test::init("alice");
    let identity = t.whoami_json();
    assert_eq!(identity["name"], "alice");
    assert_eq!(identity["version"], 1);
    for field in ["device_id", "signing_public_key", "encryption_public_key"] {
        assert!(identity[field].as_str().is_some(), "missing {}", field);
    }
}

#[test]
fn test_whoami_prints_encryption_key() {
    let t = Test::init("alice");
    let identity = t.whoami_json();
    let output = t.cmd().arg("whoami").output().unwrap();
    assert_success(&output);
    assert_eq!(
        stdout(&output).trim(),
        identity["encryption_public_key"].as_str().unwrap()
    );
    assert_stderr_contains(&output, "kid:");
}

#[test]
fn test_platform_override() {
    let t = Test::new();
    let output = t
        .cmd()
        .args(["init", "--name", "ci", "--platform", "linux-ci"])
        .output()
        .unwrap();
    assert_success(&output);
    assert_eq!(t.whoami_json()["platform"], "linux-ci");
}
