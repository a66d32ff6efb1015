//! Tests for `coffer token`, `coffer fingerprint` and `coffer completions`.

use predicates::prelude::*;
use sha2::{Digest, Sha256};

use crate::support::*;

#[test]
fn test_token_create_json() {
    let t = Test::new();
    let output = t.token_create("api/prod");
    assert_success(&output);

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let token = json["token"].as_str().unwrap();
    assert!(token.starts_with("cft_"));
    assert!(token.contains(json["id"].as_str().unwrap()));
    assert_eq!(json["environment_id"], "api/prod");
    assert!(json["public_key"].as_str().is_some());
}

#[test]
fn test_token_inspect_matches_create() {
    let t = Test::new();
    let created = t.token_create("api/prod");
    assert_success(&created);
    let json: serde_json::Value = serde_json::from_slice(&created.stdout).unwrap();

    let output = t
        .cmd()
        .args(["token", "inspect"])
        .env("COFFER_TOKEN", json["token"].as_str().unwrap())
        .output()
        .unwrap();
    assert_success(&output);
    assert_eq!(stdout(&output).trim(), json["public_key"].as_str().unwrap());
    assert_stderr_contains(&output, json["id"].as_str().unwrap());
}

#[test]
fn test_token_inspect_rejects_garbage() {
    let t = Test::new();
    t.cmd()
        .args(["token", "inspect", "not-a-token"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_token_needs_project_and_env() {
    let t = Test::new();
    assert_failure(&t.token_create("prod"));
    assert_failure(&t.token_create("/prod"));
    assert_failure(&t.token_create("api/"));
}

#[test]
fn test_fingerprint_of_key_file() {
    let t = Test::new();
    let bytes = [0x42u8; 32];
    let file = t.write("kek.bin", &bytes);

    let output = t.fingerprint(&file);
    assert_success(&output);
    assert_eq!(stdout(&output).trim(), hex::encode(Sha256::digest(bytes)));
}

#[test]
fn test_fingerprint_rejects_short_key() {
    let t = Test::new();
    let file = t.write("short.bin", &[0u8; 31]);
    assert_failure(&t.fingerprint(&file));
}

#[test]
fn test_completions() {
    let t = Test::new();
    t.cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("coffer").and(predicate::str::contains("seal")));
}
