//! Ledger configuration and deployment wiring.
//!
//! [`LedgerConfig`] is a plain serde struct persisted as pretty JSON. A few
//! fields can be overridden from `REQNET_*` environment variables.
//! [`Deployment::new`] turns a config into a ready ledger with the access
//! registry, fee collector, burn sink and every extension in place. The
//! escrow extension settles native value and shares the native fee schedule.

use crate::access::AccessRegistry;
use crate::core::RequestCore;
use crate::extensions::external::EXTERNAL_LABEL;
use crate::extensions::token::TOKEN_LABEL;
use crate::extensions::{
    CurrencyExtension, EscrowExtension, ExternalExtension, NativeExtension, TokenExtension,
};
use crate::fees::{BurnSink, ConversionRate, FeeCollector, FeeSchedule};
use crate::ledger::Ledger;
use crate::{Address, Amount, LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// File name used when a config is stored in a directory.
pub const CONFIG_FILE: &str = "reqnet.json";

/// Label the fee sink address is derived from.
pub const SINK_LABEL: &str = "fee-sink";

pub const ENV_CORE_LABEL: &str = "REQNET_CORE_LABEL";
pub const ENV_PAUSED: &str = "REQNET_PAUSED";
pub const ENV_SIGNED_LIFETIME: &str = "REQNET_SIGNED_LIFETIME_SECS";
pub const ENV_FEE_NUMERATOR: &str = "REQNET_FEE_NUMERATOR";
pub const ENV_FEE_DENOMINATOR: &str = "REQNET_FEE_DENOMINATOR";
pub const ENV_FEE_MAX: &str = "REQNET_FEE_MAX";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Label the core address is derived from.
    pub core_label: String,
    /// Start with request creation paused ledger-wide.
    pub paused: bool,
    pub native_fee: Option<FeeSchedule>,
    pub token_fee: Option<FeeSchedule>,
    pub external_fee: Option<FeeSchedule>,
    pub burn_rate: ConversionRate,
    /// Default validity window of a freshly signed request.
    pub signed_lifetime_secs: i64,
    pub token_symbol: String,
    pub external_code: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            core_label: "core".to_string(),
            paused: false,
            native_fee: None,
            token_fee: None,
            external_fee: None,
            burn_rate: ConversionRate::default(),
            signed_lifetime_secs: 3600,
            token_symbol: "USD".to_string(),
            external_code: "BTC".to_string(),
        }
    }
}

impl LedgerConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Override fields from `lookup`. The fee variables set the same
    /// schedule on every extension; numerator and denominator must both be
    /// present, the cap defaults to unbounded.
    pub fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(label) = lookup(ENV_CORE_LABEL) {
            self.core_label = label;
        }
        if let Some(paused) = lookup(ENV_PAUSED) {
            self.paused = parse_flag(&paused)?;
        }
        if let Some(secs) = lookup(ENV_SIGNED_LIFETIME) {
            self.signed_lifetime_secs = secs.trim().parse().map_err(|_| {
                LedgerError::invalid_input("signed lifetime", format!("{secs:?} is not a number of seconds"))
            })?;
        }

        let numerator = lookup(ENV_FEE_NUMERATOR);
        let denominator = lookup(ENV_FEE_DENOMINATOR);
        match (numerator, denominator) {
            (Some(numerator), Some(denominator)) => {
                let max = match lookup(ENV_FEE_MAX) {
                    Some(max) => max.trim().parse()?,
                    None => Amount::MAX,
                };
                let schedule = FeeSchedule::new(
                    numerator.trim().parse::<Amount>()?,
                    denominator.trim().parse::<Amount>()?,
                    max,
                )?;
                self.native_fee = Some(schedule);
                self.token_fee = Some(schedule);
                self.external_fee = Some(schedule);
            }
            (None, None) => {}
            _ => {
                return Err(LedgerError::invalid_input(
                    "fee",
                    format!("{ENV_FEE_NUMERATOR} and {ENV_FEE_DENOMINATOR} must be set together"),
                ))
            }
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.core_label.is_empty() {
            return Err(LedgerError::invalid_input("core label", "must not be empty"));
        }
        if self.signed_lifetime_secs <= 0 {
            return Err(LedgerError::invalid_input("signed lifetime", "must be positive"));
        }
        if self.token_symbol.is_empty() || self.external_code.is_empty() {
            return Err(LedgerError::invalid_input("asset", "symbol and code must not be empty"));
        }
        if self.burn_rate.denominator.value() <= 0 || self.burn_rate.numerator.is_negative() {
            return Err(LedgerError::invalid_input("burn rate", "must be a non-negative ratio"));
        }
        for schedule in [&self.native_fee, &self.token_fee, &self.external_fee]
            .into_iter()
            .flatten()
        {
            schedule.validate()?;
        }
        Ok(())
    }

    /// Expiry for a request signed at `now`.
    pub fn signed_expiry(&self, now: i64) -> Result<i64> {
        now.checked_add(self.signed_lifetime_secs)
            .ok_or(LedgerError::Overflow("expiry"))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `reqnet.json` from `dir`, or defaults when it does not exist.
    pub fn load_or_default(dir: impl AsRef<Path>) -> Result<Self> {
        let path = dir.as_ref().join(CONFIG_FILE);
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(LedgerError::invalid_input("paused", format!("{other:?} is not a flag"))),
    }
}

/// A ledger wired from a [`LedgerConfig`].
pub struct Deployment {
    pub ledger: Ledger,
    pub access: Arc<AccessRegistry>,
    pub admin: Address,
    pub native: NativeExtension,
    pub escrow: EscrowExtension,
    pub token: TokenExtension,
    pub external: ExternalExtension,
    pub sink: Address,
}

impl Deployment {
    #[tracing::instrument(skip(config), fields(core = %config.core_label))]
    pub fn new(config: &LedgerConfig, admin: Address) -> Result<Self> {
        config.validate()?;
        admin.require_nonzero("admin")?;

        let access = Arc::new(AccessRegistry::new(admin));
        let sink = Address::from_label(SINK_LABEL);
        let fees = Arc::new(FeeCollector::new(sink, access.clone()));
        let core = RequestCore::new(Address::from_label(&config.core_label), access.clone());
        let mut ledger = Ledger::new(core, fees.clone());
        ledger.register_hook(sink, Arc::new(BurnSink::new(sink, config.burn_rate)));

        let token_address = ledger.issue_token(&admin, &config.token_symbol)?;
        let native = NativeExtension::default();
        let escrow = EscrowExtension::default();
        let token = TokenExtension::new(Address::from_label(TOKEN_LABEL), token_address);
        let external =
            ExternalExtension::new(Address::from_label(EXTERNAL_LABEL), config.external_code.clone());

        let wiring = [
            (native.address(), config.native_fee),
            (escrow.address(), config.native_fee),
            (token.address(), config.token_fee),
            (external.address(), config.external_fee),
        ];
        for (extension, fee) in wiring {
            access.add_trusted_extension(&admin, extension)?;
            if let Some(schedule) = fee {
                fees.set_fee_schedule(&admin, extension, schedule)?;
            }
        }
        if config.paused {
            access.pause(&admin)?;
        }
        tracing::info!(core = %ledger.core().address(), "deployment ready");

        Ok(Self {
            ledger,
            access,
            admin,
            native,
            escrow,
            token,
            external,
            sink,
        })
    }
}
