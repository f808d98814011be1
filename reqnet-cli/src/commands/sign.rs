//! Sign command - authorize a request as its primary payee

use anyhow::{Context, Result};
use reqnet_lib::{Address, Amount, RequestTerms, SignedRequest};
use std::path::Path;

use super::ExtensionKind;
use crate::ui;

pub struct SignArgs {
    pub amounts: Vec<String>,
    pub sub_payees: Vec<String>,
    pub extension: ExtensionKind,
    pub payer: Option<String>,
    pub data: String,
    pub lifetime: Option<i64>,
    pub raw: bool,
}

pub fn run(storage_dir: &Path, args: SignArgs) -> Result<()> {
    let identity = super::load_identity(storage_dir)?;
    let config = super::load_config(storage_dir)?;
    let deployment = super::deploy(&config)?;
    let extension = args.extension.select(&deployment);

    let mut payees = vec![identity.address()];
    for sub_payee in &args.sub_payees {
        payees.push(
            sub_payee
                .parse::<Address>()
                .with_context(|| format!("parsing sub-payee {sub_payee}"))?,
        );
    }
    let expected_amounts = args
        .amounts
        .iter()
        .map(|a| a.parse::<Amount>().with_context(|| format!("parsing amount {a}")))
        .collect::<Result<Vec<_>>>()?;
    if expected_amounts.len() != payees.len() {
        anyhow::bail!(
            "{} amounts given for {} payees (primary plus sub-payees)",
            expected_amounts.len(),
            payees.len()
        );
    }
    let payer = args
        .payer
        .as_deref()
        .map(|p| p.parse::<Address>().with_context(|| format!("parsing payer {p}")))
        .transpose()?;

    let now = super::now();
    let expires_at = match args.lifetime {
        Some(secs) => now.checked_add(secs).context("lifetime out of range")?,
        None => config.signed_expiry(now)?,
    };

    let terms = RequestTerms {
        extension: extension.address(),
        payer,
        payees,
        expected_amounts,
        payee_routes: Vec::new(),
        data: args.data,
        expires_at,
    };
    let signed = SignedRequest::sign(terms, extension.asset(), &identity).context("signing request")?;
    let transport = signed.to_transport()?;
    tracing::debug!(hash = %hex::encode(signed.terms.request_hash()?), "request signed");

    if args.raw {
        println!("{transport}");
        return Ok(());
    }

    ui::header("Signed Request");
    ui::key_value("Extension", &format!("{:?} ({})", args.extension, signed.terms.extension));
    ui::key_value("Asset", &signed.asset.to_string());
    ui::key_value("Request Hash", &hex::encode(signed.terms.request_hash()?));
    ui::key_value("Expires", &ui::timestamp(expires_at));
    ui::separator();
    println!("{transport}");

    Ok(())
}
