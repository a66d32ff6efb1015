//! Tests for `coffer prekeys`.

use predicates::prelude::*;

use crate::support::*;

fn signed_prekey_id(t: &Test) -> String {
    t.config()["device"]["signed_prekey"]["id"]
        .as_str()
        .unwrap()
        .to_string()
}

fn one_time_count(t: &Test) -> usize {
    t.config()["device"]["one_time_prekeys"]
        .as_array()
        .map(|a| a.len())
        .unwrap_or(0)
}

#[test]
fn test_rotate_keeps_valid_prekey() {
    let t = Test::init("alice");
    let before = signed_prekey_id(&t);

    t.cmd()
        .args(["prekeys", "rotate"])
        .assert()
        .success()
        .stderr(predicate::str::contains("valid until"));
    assert_eq!(signed_prekey_id(&t), before);
}

#[test]
fn test_forced_rotation() {
    let t = Test::init("alice");
    let before = signed_prekey_id(&t);

    let output = t
        .cmd()
        .args(["prekeys", "rotate", "--force"])
        .output()
        .unwrap();
    assert_success(&output);
    assert_stderr_contains(&output, "rotated signed prekey");
    assert_ne!(signed_prekey_id(&t), before);

    // the new prekey is usable: config still validates on load
    assert_success(&t.cmd().arg("whoami").output().unwrap());
}

#[test]
fn test_generate_appends_batch() {
    let t = Test::init("alice");
    assert_eq!(one_time_count(&t), 10);

    let output = t
        .cmd()
        .args(["prekeys", "generate", "--count", "5"])
        .output()
        .unwrap();
    assert_success(&output);
    assert_stderr_contains(&output, "generated 5 one-time prekeys");
    assert_eq!(one_time_count(&t), 15);
}

#[test]
fn test_generate_rejects_oversized_batch() {
    let t = Test::init("alice");
    let output = t
        .cmd()
        .args(["prekeys", "generate", "--count", "500"])
        .output()
        .unwrap();
    assert_failure(&output);
    assert_eq!(one_time_count(&t), 10);
}
