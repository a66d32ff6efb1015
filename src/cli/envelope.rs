//! Envelope commands: seal, open, verify.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use zeroize::Zeroizing;

use crate::cli::output;
use crate::cli::resolve::Local;
use crate::core::cipher::envelope::{self, OpenOptions};
use crate::core::cipher::{parse_ed25519_public, parse_x25519_public};
use crate::core::domain::EncryptedEnvelope;
use crate::error::{CipherError, Result};

fn read_input(input: Option<&Path>) -> Result<Zeroizing<Vec<u8>>> {
    let mut buf = Zeroizing::new(Vec::new());
    match input {
        Some(path) => buf.extend_from_slice(&std::fs::read(path)?),
        None => {
            std::io::stdin().read_to_end(&mut buf)?;
        }
    }
    Ok(buf)
}

fn read_envelope(file: &Path) -> Result<EncryptedEnvelope> {
    EncryptedEnvelope::from_json(&std::fs::read_to_string(file)?)
}

/// Seal plaintext for `to`, signed by this device. Prints the envelope JSON.
pub fn seal(to: &str, meta: Vec<(String, String)>, input: Option<&Path>) -> Result<()> {
    let local = Local::load()?;
    let keys = local.keys()?;
    let recipient = parse_x25519_public("to", to)?;
    let plaintext = read_input(input)?;

    let meta: BTreeMap<String, String> = meta.into_iter().collect();
    let meta = if meta.is_empty() { None } else { Some(meta) };

    let sealed = envelope::encrypt_for_device(
        &keys.identity,
        &keys.signing_key,
        &recipient,
        &plaintext,
        meta,
    )?;
    output::data(&sealed.to_json()?);
    Ok(())
}

/// Open an envelope addressed to this device. Writes the plaintext to stdout.
pub fn open(file: &Path, compat: bool) -> Result<()> {
    let local = Local::load()?;
    let envelope = read_envelope(file)?;
    let options = if compat {
        OpenOptions::compat()
    } else {
        OpenOptions::default()
    };

    let opened = local.manager.decrypt_on_this_device_with(
        &envelope,
        &local.device()?.identity.device_id,
        options,
    )?;
    if let Some(meta) = &opened.meta {
        for (k, v) in meta {
            output::kv(&format!("{}:", k), v);
        }
    }
    output::raw(&opened.plaintext)?;
    Ok(())
}

/// Verify the sender signature. Needs no local device.
pub fn verify(file: &Path, sender: &str) -> Result<()> {
    let envelope = read_envelope(file)?;
    let sender = parse_ed25519_public("sender", sender)?;
    if !envelope::verify_envelope_signature(&envelope, &sender) {
        return Err(CipherError::BadSignature.into());
    }
    output::success(&format!("signature valid for envelope {}", envelope.id));
    Ok(())
}
