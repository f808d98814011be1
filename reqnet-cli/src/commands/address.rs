//! Address command - show the current identity

use anyhow::Result;
use std::path::Path;

use crate::ui;

pub fn run(storage_dir: &Path) -> Result<()> {
    match super::load_identity(storage_dir) {
        Ok(identity) => {
            ui::header("Current Identity");
            ui::key_value("Address", &identity.address().to_string());
            ui::key_value("Public Key", &hex::encode(identity.public_key()));
            Ok(())
        }
        Err(e) => {
            ui::error("No identity configured");
            ui::info("Run 'reqnet keygen' to create an identity");
            Err(e)
        }
    }
}
