//! Environment keys (KEKs).
//!
//! - [`cache`]: local, evictable per-scope key cache with history
//! - [`wrap`]: two-layer KEK/DEK wrapping for recipients
//! - [`service`]: resolve, publish, share and rotate

pub mod cache;
mod service;
pub mod wrap;

pub use cache::{CachedKey, KeyCache};
pub use service::{EnsuredKey, EnvironmentKeys};
