//! Coffer - zero-knowledge secrets distribution for teams and deployments.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── cli/              # Command-line interface
//! │   ├── init          # Create the device identity and prekeys
//! │   ├── whoami        # Print the public identity
//! │   ├── prekeys       # Rotate / top up prekeys
//! │   ├── envelope      # seal / open / verify envelopes
//! │   ├── token         # Deployment credentials
//! │   └── completions   # Shell completions
//! └── core/             # Core library components
//!     ├── kdf           # HKDF-SHA256 key hierarchy
//!     ├── cipher/       # AEAD and envelope encryption
//!     ├── domain/       # Wire records
//!     ├── identity      # Device identity and prekey manager
//!     ├── keys/         # Environment keys: cache, wrapping, rotation
//!     ├── secrets       # Per-secret payload codec
//!     ├── deploy        # Deployment-token decryption
//!     ├── remote        # Remote service trait + in-memory service
//!     ├── store/        # Secret store backends
//!     ├── vault/        # Device-side facade for one environment
//!     └── config        # ~/.coffer/config.toml
//! ```
//!
//! # Features
//!
//! - X25519 envelopes with ephemeral sender keys and Ed25519 signatures
//! - Per-environment keys wrapped for every authorized device and token
//! - Tamper-evident, signed secret payloads bound to their location
//! - Deployment tokens with no signing key for CI/CD
//! - Pluggable secret stores (filesystem, macOS Keychain, memory)

pub mod cli;
pub mod core;
pub mod error;
