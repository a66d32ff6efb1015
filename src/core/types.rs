//! Type aliases for domain concepts.
//!
//! Provides semantic type aliases to make function signatures more descriptive.

/// An opaque device identifier (UUID string).
pub type DeviceId = String;

/// A signed or one-time prekey identifier.
pub type PrekeyId = String;

/// A deployment token identifier.
pub type TokenId = String;

/// A secret variable name (e.g., DATABASE_URL).
///
/// Must be a valid environment variable name.
pub type SecretName = String;

/// Lowercase hex SHA-256 of raw key bytes.
pub type Fingerprint = String;

/// Standard base64 of a 32-byte public key.
pub type PublicKeyB64 = String;
