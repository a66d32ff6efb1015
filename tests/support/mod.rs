//! Test support utilities for coffer integration tests.
//!
//! Provides an isolated CLI environment ([`Test`]) and in-process device
//! fixtures for library tests.

#![allow(dead_code)]

pub mod assertions;
pub mod commands;
pub mod fixtures;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;

use tempfile::TempDir;

/// Test environment with an isolated coffer home.
///
/// No process-global state is mutated: child processes get `COFFER_HOME`
/// pointed at the temp dir, so tests can safely run in parallel.
pub struct Test {
    /// Temporary coffer home
    pub home: TempDir,
    /// Scratch directory for input and output files
    pub dir: TempDir,
}

impl Test {
    /// Create a new empty test environment.
    pub fn new() -> Self {
        let home = TempDir::new().expect("failed to create temp home");
        let dir = TempDir::new().expect("failed to create temp dir");
        Self { home, dir }
    }

    /// Create a test environment with a device initialized.
    pub fn init(name: &str) -> Self {
        let t = Self::new();
        let output = t.init_cmd(name);
        assert!(
            output.status.success(),
            "Failed to initialize device: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        t
    }

    /// Write a scratch file and return its path.
    pub fn write(&self, name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).expect("failed to write scratch file");
        path
    }

    /// Parsed `config.toml` from the coffer home.
    pub fn config(&self) -> toml::Value {
        let raw = std::fs::read_to_string(self.home.path().join("config.toml"))
            .expect("failed to read config.toml");
        toml::from_str(&raw).expect("config.toml is not valid TOML")
    }
}
