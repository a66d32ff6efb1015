//! Core library components.
//!
//! This module contains the reusable engine: key derivation, device
//! identities, envelope encryption, environment-key distribution, the
//! secret codec and the deployment-token path. Nothing here does network
//! I/O; the remote service and secret store are injected.

pub mod cipher;
pub mod config;
pub mod constants;
pub mod deploy;
pub mod domain;
pub mod encoding;
pub mod identity;
pub mod kdf;
pub mod keys;
pub mod remote;
pub mod secrets;
pub mod store;
pub mod types;
pub mod validation;
pub mod vault;
