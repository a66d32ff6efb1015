//! Prekey commands.

use chrono::Utc;

use crate::cli::output;
use crate::cli::resolve::Local;
use crate::error::Result;

/// Rotate the signed prekey when expired (or always, with `force`).
pub fn rotate(force: bool) -> Result<()> {
    let mut local = Local::load()?;
    let identity = local.device()?.identity.clone();
    let current = local.device()?.signed_prekey.clone();

    // forcing is rotating as if the current prekey had no future
    let current = current.filter(|_| !force);
    let rotation =
        local
            .manager
            .rotate_signed_prekey_if_expired(&identity, current.as_ref(), Utc::now())?;

    if !rotation.rotated {
        output::dimmed(&format!(
            "signed prekey {} valid until {}",
            rotation.current.id, rotation.current.expires_at
        ));
        return Ok(());
    }

    let previous = local.device()?.signed_prekey.clone();
    local.device_mut()?.signed_prekey = Some(rotation.current.clone());
    local.save()?;
    if let Some(previous) = previous {
        local.manager.purge_signed_prekey(&previous)?;
    }

    output::success(&format!("rotated signed prekey to {}", rotation.current.id));
    output::kv("expires:", &rotation.current.expires_at);
    Ok(())
}

/// Generate one-time prekeys, scrubbing consumed ones first.
pub fn generate(count: Option<usize>) -> Result<()> {
    let mut local = Local::load()?;
    let count = count.unwrap_or(local.config.prekeys.one_time_batch);

    let existing = std::mem::take(&mut local.device_mut()?.one_time_prekeys);
    let mut kept: Vec<_> = local
        .manager
        .scrub_consumed_one_time_prekeys(existing)?
        .into_iter()
        .filter(|p| !p.is_consumed())
        .collect();
    let batch = local.manager.create_one_time_prekeys(count)?;
    kept.extend(batch);
    let total = kept.len();

    local.device_mut()?.one_time_prekeys = kept;
    local.save()?;

    output::success(&format!("generated {} one-time prekeys", count));
    output::kv("unconsumed:", total);
    Ok(())
}
