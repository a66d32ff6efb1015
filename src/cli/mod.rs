//! Command-line interface.
//!
//! A thin front-end over the engine for the local device: identity,
//! prekeys, one-off envelopes and deployment credentials. Talking to a
//! remote service is left to library callers.

pub mod completions;
pub mod envelope;
pub mod fingerprint;
pub mod init;
pub mod output;
pub mod prekeys;
pub mod resolve;
pub mod token;
pub mod whoami;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Coffer - zero-knowledge secrets distribution.
#[derive(Parser)]
#[command(
    name = "coffer",
    about = "Zero-knowledge secrets distribution for teams and deployments",
    version
)]
pub struct Cli {
    /// Enable debug logging (overridden by COFFER_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Command {
    /// Create this device's identity, signed prekey and one-time prekeys
    Init {
        /// Device name (defaults to the host name)
        #[arg(short, long)]
        name: Option<String>,
        /// Platform label (defaults to the OS)
        #[arg(long)]
        platform: Option<String>,
        /// Replace an existing device
        #[arg(long)]
        force: bool,
    },

    /// Print this device's public identity
    Whoami {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage prekeys
    Prekeys {
        #[command(subcommand)]
        action: PrekeysAction,
    },

    /// Encrypt data for a recipient's X25519 public key
    Seal {
        /// Recipient public key (base64)
        #[arg(long)]
        to: String,
        /// Authenticated metadata, repeatable
        #[arg(long, value_parser = parse_meta)]
        meta: Vec<(String, String)>,
        /// Read plaintext from a file instead of stdin
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Decrypt an envelope addressed to this device
    Open {
        /// Envelope JSON file
        file: PathBuf,
        /// Accept legacy static-sender envelopes
        #[arg(long)]
        compat: bool,
    },

    /// Verify an envelope's sender signature
    Verify {
        /// Envelope JSON file
        file: PathBuf,
        /// Sender's Ed25519 public key (base64)
        #[arg(long)]
        sender: String,
    },

    /// Manage deployment tokens
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },

    /// Print the SHA-256 fingerprint of a raw 32-byte key file
    Fingerprint {
        /// Key file
        file: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Prekey subcommands.
#[derive(Subcommand)]
pub enum PrekeysAction {
    /// Replace the signed prekey if it has expired
    Rotate {
        /// Rotate even if it has not expired
        #[arg(long)]
        force: bool,
    },

    /// Generate a batch of one-time prekeys
    Generate {
        /// Number of prekeys (defaults to the configured batch)
        #[arg(short, long)]
        count: Option<usize>,
    },
}

/// Deployment token subcommands.
#[derive(Subcommand)]
pub enum TokenAction {
    /// Generate a deployment credential for an environment
    Create {
        /// Environment id (`project/env`)
        #[arg(short, long)]
        environment: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the public half of a token string (read from COFFER_TOKEN)
    Inspect {
        #[arg(env = crate::core::constants::TOKEN_ENV, hide_env_values = true)]
        token: String,
    },
}

fn parse_meta(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

/// Execute a command.
pub fn execute(command: Command) -> crate::error::Result<()> {
    use Command::*;

    match command {
        Init {
            name,
            platform,
            force,
        } => init::execute(name, platform, force),
        Whoami { json } => whoami::execute(json),
        Prekeys { action } => match action {
            PrekeysAction::Rotate { force } => prekeys::rotate(force),
            PrekeysAction::Generate { count } => prekeys::generate(count),
        },
        Seal { to, meta, input } => envelope::seal(&to, meta, input.as_deref()),
        Open { file, compat } => envelope::open(&file, compat),
        Verify { file, sender } => envelope::verify(&file, &sender),
        Token { action } => match action {
            TokenAction::Create { environment, json } => token::create(&environment, json),
            TokenAction::Inspect { token } => token::inspect(&token),
        },
        Fingerprint { file } => fingerprint::execute(&file),
        Completions { shell } => completions::execute(shell),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_meta() {
        assert_eq!(parse_meta("k=v").unwrap(), ("k".to_string(), "v".to_string()));
        assert_eq!(parse_meta("k=a=b").unwrap().1, "a=b");
        assert_eq!(parse_meta("k=").unwrap().1, "");
        assert!(parse_meta("=v").is_err());
        assert!(parse_meta("kv").is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
