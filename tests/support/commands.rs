//! Command helper methods for Test.

use super::Test;
use assert_cmd::Command;
use std::path::Path;
use std::process::Output;

impl Test {
    /// Create a coffer command bound to this environment.
    ///
    /// Returns a Command configured with:
    /// - COFFER_HOME set to the temporary home
    /// - the keychain disabled and colors off
    /// - current directory set to the scratch directory
    pub fn cmd(&self) -> Command {
        #[allow(deprecated)]
        let mut cmd = Command::cargo_bin("coffer").expect("failed to find coffer binary");
        cmd.env("COFFER_HOME", self.home.path());
        cmd.env("COFFER_NO_KEYCHAIN", "1");
        cmd.env("NO_COLOR", "1");
        cmd.env_remove("COFFER_LOG");
        cmd.env_remove("COFFER_TOKEN");
        cmd.current_dir(self.dir.path());
        cmd
    }

    /// Shortcut for `coffer init` command.
    pub fn init_cmd(&self, name: &str) -> Output {
        self.cmd()
            .args(["init", "--name", name])
            .output()
            .expect("failed to run coffer init")
    }

    /// Shortcut for `coffer whoami --json`.
    pub fn whoami_json(&self) -> serde_json::Value {
        let output = self
            .cmd()
            .args(["whoami", "--json"])
            .output()
            .expect("failed to run coffer whoami");
        assert!(output.status.success(), "whoami failed");
        serde_json::from_slice(&output.stdout).expect("whoami did not print JSON")
    }

    /// Shortcut for `coffer seal --to <key> --input <file> [--meta k=v]...`.
    pub fn seal(&self, to: &str, input: &Path, meta: &[&str]) -> Output {
        let mut cmd = self.cmd();
        cmd.args(["seal", "--to", to, "--input"]).arg(input);
        for m in meta {
            cmd.args(["--meta", *m]);
        }
        cmd.output().expect("failed to run coffer seal")
    }

    /// Shortcut for `coffer open <file>`.
    pub fn open(&self, file: &Path) -> Output {
        self.cmd()
            .arg("open")
            .arg(file)
            .output()
            .expect("failed to run coffer open")
    }

    /// Shortcut for `coffer verify <file> --sender <key>`.
    pub fn verify(&self, file: &Path, sender: &str) -> Output {
        self.cmd()
            .arg("verify")
            .arg(file)
            .args(["--sender", sender])
            .output()
            .expect("failed to run coffer verify")
    }

    /// Shortcut for `coffer token create --environment <id> --json`.
    pub fn token_create(&self, environment: &str) -> Output {
        self.cmd()
            .args(["token", "create", "--environment", environment, "--json"])
            .output()
            .expect("failed to run coffer token create")
    }

    /// Shortcut for `coffer fingerprint <file>`.
    pub fn fingerprint(&self, file: &Path) -> Output {
        self.cmd()
            .arg("fingerprint")
            .arg(file)
            .output()
            .expect("failed to run coffer fingerprint")
    }
}
