//! Deployment credentials.
//!
//! A deployment credential is a non-interactive recipient (CI, a deploy
//! host). It owns a 32-byte root secret and nothing else: its X25519 scalar
//! is derived from the root, and it has no signing key.
//!
//! The portable token string is `cft_<tokenId>_<base64url(root)>`.

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::core::constants::{KEY_LEN, TOKEN_PREFIX};
use crate::core::types::{PublicKeyB64, TokenId};
use crate::core::{encoding, kdf};
use crate::error::{Result, ValidationError};

/// Lifecycle state of a deployment token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStatus {
    Active,
    Revoked,
}

/// Public record of a deployment token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentToken {
    pub id: TokenId,
    pub public_key: PublicKeyB64,
    pub status: TokenStatus,
    pub environment_id: String,
    pub created_at: DateTime<Utc>,
}

impl DeploymentToken {
    pub fn is_active(&self) -> bool {
        self.status == TokenStatus::Active
    }
}

/// Private side of a deployment token.
pub struct DeploymentCredential {
    token_id: TokenId,
    root: Zeroizing<[u8; KEY_LEN]>,
    org_root: Option<Zeroizing<Vec<u8>>>,
}

impl DeploymentCredential {
    /// Generate a fresh credential and its public record.
    pub fn generate(environment_id: &str) -> Result<(Self, DeploymentToken)> {
        if environment_id.is_empty() {
            return Err(ValidationError::Empty("environment id").into());
        }
        let mut root = Zeroizing::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut root[..]);

        let credential = Self {
            token_id: uuid::Uuid::new_v4().to_string(),
            root,
            org_root: None,
        };
        let token = DeploymentToken {
            id: credential.token_id.clone(),
            public_key: encoding::encode(credential.public_key()?.as_bytes()),
            status: TokenStatus::Active,
            environment_id: environment_id.to_string(),
            created_at: Utc::now(),
        };
        Ok((credential, token))
    }

    /// Rebuild a credential from its parts.
    pub fn from_parts(token_id: impl Into<String>, root: [u8; KEY_LEN]) -> Result<Self> {
        let token_id = token_id.into();
        if token_id.is_empty() || token_id.contains('_') {
            return Err(ValidationError::InvalidToken("malformed token id".to_string()).into());
        }
        Ok(Self {
            token_id,
            root: Zeroizing::new(root),
            org_root: None,
        })
    }

    /// Attach the organization master seed (legacy/operator mode).
    pub fn with_org_root(mut self, seed: &[u8]) -> Self {
        self.org_root = Some(Zeroizing::new(seed.to_vec()));
        self
    }

    pub fn token_id(&self) -> &str {
        &self.token_id
    }

    pub fn org_root(&self) -> Option<&[u8]> {
        self.org_root.as_ref().map(|r| r.as_slice())
    }

    /// X25519 scalar: `HKDF(root, "v1:deploy:<tokenId>:x25519")`.
    pub fn secret(&self) -> Result<StaticSecret> {
        let okm = kdf::derive(
            &self.root[..],
            &kdf::context("deploy", &self.token_id, "x25519"),
            None,
            KEY_LEN,
        )?;
        let mut scalar = Zeroizing::new([0u8; KEY_LEN]);
        scalar.copy_from_slice(&okm);
        Ok(StaticSecret::from(*scalar))
    }

    pub fn public_key(&self) -> Result<X25519PublicKey> {
        Ok(X25519PublicKey::from(&self.secret()?))
    }

    /// Portable token string for CI environment variables.
    pub fn encode(&self) -> Zeroizing<String> {
        Zeroizing::new(format!(
            "{}_{}_{}",
            TOKEN_PREFIX,
            self.token_id,
            encoding::encode_url(&self.root[..])
        ))
    }

    /// Parse a token string produced by [`encode`](Self::encode).
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidToken` on a wrong prefix, missing
    /// parts, or a root that is not 32 bytes.
    pub fn parse(token: &str) -> Result<Self> {
        let invalid = |reason: &str| ValidationError::InvalidToken(reason.to_string());

        let rest = token
            .trim()
            .strip_prefix(TOKEN_PREFIX)
            .and_then(|r| r.strip_prefix('_'))
            .ok_or_else(|| invalid("missing prefix"))?;
        // base64url may itself contain '_', token ids never do
        let (token_id, root) = rest
            .split_once('_')
            .ok_or_else(|| invalid("missing root secret"))?;

        let bytes = Zeroizing::new(encoding::decode_url("token root", root)?);
        if bytes.len() != KEY_LEN {
            return Err(invalid("root secret must be 32 bytes").into());
        }
        let mut root = [0u8; KEY_LEN];
        root.copy_from_slice(&bytes);
        let credential = Self::from_parts(token_id, root);
        zeroize::Zeroize::zeroize(&mut root);
        credential
    }
}

impl std::fmt::Debug for DeploymentCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentCredential")
            .field("token_id", &self.token_id)
            .field("root", &"[REDACTED]")
            .field("org_root", &self.org_root.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
