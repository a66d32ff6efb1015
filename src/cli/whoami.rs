//! Whoami command - print this device's public identity.

use crate::cli::output;
use crate::cli::resolve::Local;
use crate::error::Result;

/// Print the public identity.
pub fn execute(json: bool) -> Result<()> {
    let local = Local::load()?;
    let identity = &local.device()?.identity;

    if json {
        output::data(&serde_json::to_string_pretty(identity)?);
        return Ok(());
    }

    output::header(&identity.to_string());
    output::kv("platform:  ", &identity.platform);
    output::kv("signing:   ", &identity.signing_public_key);
    output::kv("encryption:", &identity.encryption_public_key);
    output::kv("kid:       ", identity.thumbprint()?);
    output::data(&identity.encryption_public_key);
    Ok(())
}
