//! Tests for `coffer seal`, `coffer open` and `coffer verify`.

use crate::support::*;

fn key(t: &Test, field: &str) -> String {
    t.whoami_json()[field]
        .as_str()
        .expect("whoami field")
        .to_string()
}

#[test]
fn test_seal_then_open() {
    let t = Test::init("alice");
    let to = key(&t, "encryption_public_key");
    let input = t.write("plain.txt", b"hello from alice");

    let sealed = t.seal(&to, &input, &["env=prod", "purpose=test"]);
    assert_success(&sealed);
    let json: serde_json::Value = serde_json::from_slice(&sealed.stdout).unwrap();
    assert_eq!(json["version"], 2);
    assert_eq!(json["meta"]["env"], "prod");
    assert!(!stdout(&sealed).contains("hello from alice"));

    let file = t.write("envelope.json", &sealed.stdout);
    let opened = t.open(&file);
    assert_success(&opened);
    assert_eq!(opened.stdout, b"hello from alice");
    assert_stderr_contains(&opened, "env:");
    assert_stderr_contains(&opened, "prod");
}

#[test]
fn test_seal_from_stdin() {
    let t = Test::init("alice");
    let to = key(&t, "encryption_public_key");

    let sealed = t
        .cmd()
        .args(["seal", "--to", to.as_str()])
        .write_stdin("piped secret")
        .output()
        .unwrap();
    assert_success(&sealed);

    let file = t.write("envelope.json", &sealed.stdout);
    let opened = t.open(&file);
    assert_success(&opened);
    assert_eq!(stdout(&opened), "piped secret");
}

#[test]
fn test_other_device_cannot_open() {
    let alice = Test::init("alice");
    let bob = Test::init("bob");
    let to = key(&alice, "encryption_public_key");
    let input = alice.write("plain.txt", b"for alice");

    let sealed = bob.seal(&to, &input, &[]);
    assert_success(&sealed);

    let at_bob = bob.write("envelope.json", &sealed.stdout);
    let output = bob.open(&at_bob);
    assert_failure(&output);
    assert!(output.stdout.is_empty());

    let at_alice = alice.write("envelope.json", &sealed.stdout);
    let output = alice.open(&at_alice);
    assert_success(&output);
    assert_eq!(output.stdout, b"for alice");
}

#[test]
fn test_verify_sender() {
    let alice = Test::init("alice");
    let bob = Test::init("bob");
    let to = key(&alice, "encryption_public_key");
    let input = bob.write("plain.txt", b"signed by bob");
    let sealed = bob.seal(&to, &input, &[]);
    assert_success(&sealed);
    let file = alice.write("envelope.json", &sealed.stdout);

    let output = alice.verify(&file, &key(&bob, "signing_public_key"));
    assert_success(&output);
    assert_stderr_contains(&output, "signature valid");

    let output = alice.verify(&file, &key(&alice, "signing_public_key"));
    assert_failure(&output);
    assert_stderr_contains(&output, "signature verification failed");
}

#[test]
fn test_tampered_envelope_fails() {
    let t = Test::init("alice");
    let to = key(&t, "encryption_public_key");
    let input = t.write("plain.txt", b"do not touch");
    let sealed = t.seal(&to, &input, &["env=prod"]);
    assert_success(&sealed);

    let mut json: serde_json::Value = serde_json::from_slice(&sealed.stdout).unwrap();
    json["meta"]["env"] = serde_json::json!("dev");
    let file = t.write("envelope.json", json.to_string().as_bytes());

    let output = t.open(&file);
    assert_failure(&output);
    assert!(output.stdout.is_empty());
    assert_stderr_contains(&output, "decryption failed");
}

#[test]
fn test_bad_meta_rejected() {
    let t = Test::init("alice");
    let to = key(&t, "encryption_public_key");
    let input = t.write("plain.txt", b"x");
    let output = t.seal(&to, &input, &["no-equals-sign"]);
    assert_failure(&output);
    assert_stderr_contains(&output, "KEY=VALUE");
}
