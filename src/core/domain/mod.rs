//! Domain types.
//!
//! Plain records exchanged with the secret store and the remote service.
//! Everything here is public material or wraps private material in
//! zeroizing containers.

mod deployment;
pub mod envelope;
mod environment_key;
pub mod identity;
pub mod prekey;
mod recipient;
mod scope;
mod secret;

pub use deployment::{DeploymentCredential, DeploymentToken, TokenStatus};
pub use envelope::{EncryptedEnvelope, EnvelopeMeta, EnvelopeVersion};
pub use environment_key::{
    AddEnvelopeRequest, CreateKeyRequest, EnvironmentKeyRecord, KeyAad, KeyEnvelope, KeyVersion,
};
pub use identity::DeviceIdentity;
pub use prekey::{OneTimePrekey, PrekeyBundle, SignedPrekey};
pub use recipient::{EnvelopeRecipient, Recipient, RecipientKind};
pub use scope::Scope;
pub use secret::{
    FailureKind, PullReport, ReencryptReport, SecretAad, SecretCiphertext, SecretClaims,
    SecretFailure, SecretOutcome, SecretPayload, SecretUploadRequest,
};
