//! Coffer - zero-knowledge secrets distribution for teams and deployments.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use coffer::cli::output;
use coffer::cli::{execute, Cli};
use coffer::core::constants::LOG_ENV;
use coffer::error::{AccessError, ConfigError, Error, StoreError};

fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber with env-filter support
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("coffer=debug")
        } else {
            EnvFilter::new("coffer=warn")
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).without_time().with_writer(std::io::stderr))
        .init();

    if let Err(e) = execute(cli.command) {
        let suggestion = match &e {
            Error::Config(ConfigError::NotInitialized) => Some("run: coffer init"),
            Error::Store(StoreError::NoPrivateKey(_)) => Some("run: coffer init"),
            Error::Config(ConfigError::AlreadyInitialized(_)) => {
                Some("use --force to replace the existing device")
            }
            Error::Access(AccessError::NotSharedWithDevice { .. }) => {
                Some("ask a teammate with access to re-share the environment")
            }
            Error::Cipher(_) => Some("the data may be corrupted or addressed to another device"),
            _ => None,
        };

        output::error(&e.to_string());
        if let Some(hint) = suggestion {
            output::hint(hint);
        }
        std::process::exit(1);
    }
}
