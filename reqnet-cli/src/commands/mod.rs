//! CLI command implementations

pub mod address;
pub mod config;
pub mod inspect;
pub mod keygen;
pub mod sign;
pub mod simulate;

use anyhow::{Context, Result};
use reqnet_lib::{Address, CurrencyExtension, Deployment, LedgerConfig, SigningIdentity};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Label of the administrator used for local deployments.
pub const LOCAL_ADMIN: &str = "admin";

/// Which currency extension a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExtensionKind {
    Native,
    Escrow,
    Token,
    External,
}

impl ExtensionKind {
    pub fn select(self, deployment: &Deployment) -> &dyn CurrencyExtension {
        match self {
            ExtensionKind::Native => &deployment.native,
            ExtensionKind::Escrow => &deployment.escrow,
            ExtensionKind::Token => &deployment.token,
            ExtensionKind::External => &deployment.external,
        }
    }

    /// Find the kind whose extension lives at `address`.
    pub fn of(deployment: &Deployment, address: &Address) -> Option<Self> {
        [Self::Native, Self::Escrow, Self::Token, Self::External]
            .into_iter()
            .find(|kind| kind.select(deployment).address() == *address)
    }
}

/// Identity as stored on disk.
#[derive(Debug, Serialize, Deserialize)]
pub struct StoredIdentity {
    pub secret: String,
    pub address: String,
    pub created_at: String,
}

/// Get the path to the identity file
pub fn identity_path(storage_dir: &Path) -> PathBuf {
    storage_dir.join("identity.json")
}

pub fn save_identity(storage_dir: &Path, identity: &SigningIdentity) -> Result<PathBuf> {
    std::fs::create_dir_all(storage_dir)
        .with_context(|| format!("creating {}", storage_dir.display()))?;
    let stored = StoredIdentity {
        secret: identity.secret_hex(),
        address: identity.address().to_string(),
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    let path = identity_path(storage_dir);
    std::fs::write(&path, serde_json::to_string_pretty(&stored)?)
        .with_context(|| format!("writing {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("restricting {}", path.display()))?;
    }
    Ok(path)
}

/// Load the current identity
pub fn load_identity(storage_dir: &Path) -> Result<SigningIdentity> {
    let path = identity_path(storage_dir);
    if !path.exists() {
        anyhow::bail!("No identity configured. Run 'reqnet keygen' first.");
    }
    let json = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let stored: StoredIdentity =
        serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))?;
    let identity = SigningIdentity::from_secret_hex(&stored.secret).context("decoding secret key")?;
    if identity.address().to_string() != stored.address {
        tracing::warn!(stored = %stored.address, "stored address does not match the secret key");
    }
    Ok(identity)
}

/// Configuration from the storage directory with environment overrides.
pub fn load_config(storage_dir: &Path) -> Result<LedgerConfig> {
    let mut config = LedgerConfig::load_or_default(storage_dir).context("loading configuration")?;
    config.apply_env().context("applying environment overrides")?;
    Ok(config)
}

/// A fresh in-memory deployment of `config`.
pub fn deploy(config: &LedgerConfig) -> Result<Deployment> {
    Deployment::new(config, Address::from_label(LOCAL_ADMIN)).context("deploying ledger")
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
