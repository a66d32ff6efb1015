//! Error handling and exit status tests.

use predicates::prelude::*;

use crate::support::*;

#[test]
fn test_commands_before_init() {
    let t = Test::new();
    let input = t.write("plain.txt", b"x");

    for output in [
        t.cmd().arg("whoami").output().unwrap(),
        t.cmd().args(["prekeys", "rotate"]).output().unwrap(),
        t.seal("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=", &input, &[]),
    ] {
        assert_failure(&output);
        assert_stderr_contains(&output, "not initialized");
        assert_stderr_contains(&output, "coffer init");
    }
}

#[test]
fn test_missing_envelope_file() {
    let t = Test::init("alice");
    let output = t.open(&t.dir.path().join("missing.json"));
    assert_failure(&output);
    assert_stderr_contains(&output, "io error");
}

#[test]
fn test_malformed_envelope() {
    let t = Test::init("alice");
    let file = t.write("envelope.json", b"{\"not\": \"an envelope\"}");
    assert_failure(&t.open(&file));

    let file = t.write("future.json", br#"{"id":"x","version":9,"alg":"?","to_device_public_key":"","from_ephemeral_public_key":"","nonce_b64":"","ciphertext_b64":"","created_at":""}"#);
    let output = t.open(&file);
    assert_failure(&output);
    assert_stderr_contains(&output, "version 9");
}

#[test]
fn test_invalid_recipient_key() {
    let t = Test::init("alice");
    let input = t.write("plain.txt", b"x");
    let output = t.seal("not base64!", &input, &[]);
    assert_failure(&output);
    assert!(output.stdout.is_empty());
}

#[test]
fn test_broken_config_reported() {
    let t = Test::init("alice");
    std::fs::write(t.home.path().join("config.toml"), "this is = = not toml").unwrap();
    t.cmd()
        .arg("whoami")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse config"));
}

#[test]
fn test_unknown_command() {
    let t = Test::new();
    t.cmd()
        .arg("frobnicate")
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("frobnicate"));
}
