//! Error types.
//!
//! One top-level [`Error`] wraps a small enum per concern so callers can
//! match on the category (validation, integrity, access, storage, remote)
//! without string inspection.

use thiserror::Error;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for failures that indicate tampering, corruption or a wrong key.
    pub fn is_integrity(&self) -> bool {
        matches!(self, Error::Cipher(_))
    }

    /// True for "not shared with you" style failures.
    pub fn is_access(&self) -> bool {
        matches!(self, Error::Access(_))
    }
}

/// Input validation failures. Raised before any I/O.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("invalid derivation length {0}: must be between 1 and {max}", max = crate::core::kdf::MAX_OUTPUT_LEN)]
    InvalidLength(usize),

    #[error("invalid secret name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("invalid {what}: expected {expected} bytes, got {actual}")]
    InvalidKeyLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("invalid base64 in {field}: {reason}")]
    InvalidEncoding { field: &'static str, reason: String },

    #[error("one-time prekey batch of {0} exceeds the limit of {max}", max = crate::core::constants::MAX_ONE_TIME_PREKEY_BATCH)]
    BatchTooLarge(usize),

    #[error("invalid deployment token: {0}")]
    InvalidToken(String),

    #[error("insecure permissions on {path}: expected {expected}, got {actual}")]
    InvalidPermissions {
        path: String,
        expected: String,
        actual: String,
    },
}

/// Cryptographic integrity failures. A record that raises one of these is
/// never partially trusted.
#[derive(Error, Debug)]
pub enum CipherError {
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("signature verification failed")]
    BadSignature,

    #[error("integrity claim mismatch for '{0}'")]
    HmacMismatch(String),

    #[error("key fingerprint mismatch: expected {expected}, got {actual}")]
    FingerprintMismatch { expected: String, actual: String },

    #[error("unsupported envelope: {0}")]
    UnsupportedEnvelope(String),

    #[error("static-sender envelope requires explicit compatibility mode")]
    CompatibilityModeRequired,

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
}

/// Authorization failures: the material exists but was not shared with us.
#[derive(Error, Debug)]
pub enum AccessError {
    #[error("environment key for {scope} is not shared with device {device_id}: ask a teammate to re-share")]
    NotSharedWithDevice { scope: String, device_id: String },

    #[error("environment key for {scope} is not yet shared with this token: re-share required")]
    NotSharedWithToken { scope: String },

    #[error("no environment key exists for {0}")]
    NoEnvironmentKey(String),

    #[error("deployment token {0} is revoked")]
    TokenRevoked(String),

    #[error("no authorized recipients for {0}: grant a device or token access first")]
    NoRecipients(String),
}

/// Secret-store failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no private key found: {0}")]
    NoPrivateKey(String),

    #[error("invalid key material in {name}: {reason}")]
    InvalidFormat { name: String, reason: String },

    #[error("failed to read key: {0}")]
    ReadFailed(#[source] std::io::Error),

    #[error("failed to write key: {0}")]
    WriteFailed(#[source] std::io::Error),

    #[error("keychain error: {0}")]
    KeychainError(String),

    #[error("keychain access denied")]
    KeychainAccessDenied,

    #[error("unable to determine home directory")]
    NoHomeDir,
}

/// Failures from the remote service collaborator, passed through unchanged.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Configuration file failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("not initialized: run `coffer init` first")]
    NotInitialized,

    #[error("already initialized: {0} exists")]
    AlreadyInitialized(String),

    #[error("failed to read config: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, Error>;
