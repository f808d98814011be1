//! Keygen command - create a new signing identity

use anyhow::Result;
use reqnet_lib::SigningIdentity;
use std::path::Path;

use crate::ui;

pub fn run(storage_dir: &Path, force: bool, verbose: bool) -> Result<()> {
    ui::header("Generate Signing Identity");

    let path = super::identity_path(storage_dir);
    if path.exists() && !force {
        ui::warning(&format!("An identity already exists at {}", path.display()));
        ui::info("Pass --force to replace it");
        return Ok(());
    }

    let identity = SigningIdentity::generate();
    let path = super::save_identity(storage_dir, &identity)?;
    tracing::info!(address = %identity.address(), "identity generated");

    ui::success("Identity created");
    ui::separator();
    ui::key_value("Address", &identity.address().to_string());
    ui::key_value("Public Key", &hex::encode(identity.public_key()));
    if verbose {
        ui::info(&format!("Identity saved to: {}", path.display()));
    }

    Ok(())
}
