//! Deployment token commands.

use serde_json::json;

use crate::cli::output;
use crate::core::domain::DeploymentCredential;
use crate::core::validation::validate_identifier;
use crate::error::Result;

/// Generate a credential for `environment`. The token string is printed
/// once and never stored.
pub fn create(environment: &str, json: bool) -> Result<()> {
    let (project, env) = environment.split_once('/').unwrap_or(("", environment));
    validate_identifier("project", project)?;
    validate_identifier("environment", env)?;

    let (credential, token) = DeploymentCredential::generate(environment)?;
    let encoded = credential.encode();

    if json {
        let body = json!({
            "token": encoded.as_str(),
            "id": token.id,
            "public_key": token.public_key,
            "environment_id": token.environment_id,
        });
        output::data(&serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    output::success(&format!("created deployment token for {}", environment));
    output::kv("id:        ", &token.id);
    output::kv("public key:", &token.public_key);
    output::dimmed("register the public record with the service and store the token as COFFER_TOKEN");
    output::data(&encoded);
    Ok(())
}

/// Show the public half of a token string.
pub fn inspect(token: &str) -> Result<()> {
    let credential = DeploymentCredential::parse(token)?;
    output::kv("id:        ", credential.token_id());
    output::data(&crate::core::encoding::encode(
        credential.public_key()?.as_bytes(),
    ));
    Ok(())
}
