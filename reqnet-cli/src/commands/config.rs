//! Config commands - manage reqnet.json

use anyhow::{Context, Result};
use reqnet_lib::config::CONFIG_FILE;
use reqnet_lib::LedgerConfig;
use std::path::Path;

use crate::ui;

pub fn init(storage_dir: &Path, force: bool) -> Result<()> {
    let path = storage_dir.join(CONFIG_FILE);
    if path.exists() && !force {
        ui::warning(&format!("Configuration already exists at {}", path.display()));
        ui::info("Pass --force to overwrite it");
        return Ok(());
    }

    LedgerConfig::default()
        .save(&path)
        .with_context(|| format!("writing {}", path.display()))?;
    ui::success(&format!("Configuration written to {}", path.display()));
    Ok(())
}

pub fn show(storage_dir: &Path) -> Result<()> {
    let config = super::load_config(storage_dir)?;
    ui::header("Effective Configuration");
    ui::json(&serde_json::to_value(&config)?);
    Ok(())
}
