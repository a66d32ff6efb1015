//! Constants used throughout coffer.
//!
//! Centralizes protocol tags, context strings and policy defaults.

/// Version tag prefixed to every KDF context string.
pub const KDF_VERSION: &str = "v1";

/// Configuration file name inside the coffer home.
pub const CONFIG_FILE: &str = "config.toml";

/// Coffer home directory relative to HOME (`~/.coffer`).
pub const HOME_DIR: &str = ".coffer";

/// Key storage directory inside the coffer home.
pub const KEY_DIR: &str = "keys";

/// Environment variable overriding the coffer home.
pub const HOME_ENV: &str = "COFFER_HOME";

/// Environment variable holding a deployment token string.
pub const TOKEN_ENV: &str = "COFFER_TOKEN";

/// Environment variable controlling log output.
pub const LOG_ENV: &str = "COFFER_LOG";

/// Signed prekey lifetime.
pub const SIGNED_PREKEY_TTL_DAYS: i64 = 30;

/// Default number of one-time prekeys generated per batch.
pub const ONE_TIME_PREKEY_BATCH: usize = 10;

/// Upper bound on a single one-time prekey batch.
pub const MAX_ONE_TIME_PREKEY_BATCH: usize = 100;

/// Symmetric key length used everywhere (KEK, DEK, derived keys).
pub const KEY_LEN: usize = 32;

/// XChaCha20-Poly1305 nonce length.
pub const NONCE_LEN: usize = 24;

/// HKDF info for envelope keys. Shared by device and deployment recipients.
pub const ENVELOPE_KDF_INFO: &str = "v1:envelope:x25519-xchacha20poly1305:key";

/// Domain tag for envelope signatures.
pub const ENVELOPE_SIG_CONTEXT: &[u8] = b"coffer-envelope-sig-v1";

/// Algorithm tag for the environment-key AEAD block.
pub const KEK_ALG: &str = "xchacha20poly1305";

/// Algorithm tag for secret ciphertexts.
pub const SECRET_ALG: &str = "xchacha20poly1305";

/// Number of superseded environment keys kept for in-flight decrypts.
pub const RETAINED_KEK_VERSIONS: usize = 2;

/// Prefix of portable deployment token strings.
pub const TOKEN_PREFIX: &str = "cft";
