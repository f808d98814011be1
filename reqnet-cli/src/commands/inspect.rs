//! Inspect command - decode and verify a signed request

use anyhow::{Context, Result};
use reqnet_lib::{CurrencyExtension, SignedRequest};
use std::path::Path;

use super::ExtensionKind;
use crate::ui;

pub fn run(storage_dir: &Path, transport: &str, at: Option<i64>) -> Result<()> {
    let signed = SignedRequest::from_transport(transport).context("decoding transport string")?;
    let config = super::load_config(storage_dir)?;
    let deployment = super::deploy(&config)?;
    let now = at.unwrap_or_else(super::now);

    ui::header("Signed Request");
    let kind = ExtensionKind::of(&deployment, &signed.terms.extension);
    let extension = match kind {
        Some(kind) => format!("{kind:?} ({})", signed.terms.extension),
        None => format!("{} (unknown to this deployment)", signed.terms.extension),
    };
    ui::key_value("Extension", &extension);
    // The payload's asset is not signed; trust the extension when it is known.
    let settled = kind.map(|kind| kind.select(&deployment).asset());
    match &settled {
        Some(asset) => ui::key_value("Asset", &asset.to_string()),
        None => ui::key_value("Asset", &format!("{} (unverified)", signed.asset)),
    }
    ui::key_value("Signer", &signed.signer_address().to_string());
    ui::key_value(
        "Payer",
        &signed
            .terms
            .payer
            .map(|p| p.to_string())
            .unwrap_or_else(|| "anyone".to_string()),
    );
    for (i, (payee, amount)) in signed
        .terms
        .payees
        .iter()
        .zip(&signed.terms.expected_amounts)
        .enumerate()
    {
        let label = if i == 0 { "Primary".to_string() } else { format!("Sub-payee {i}") };
        ui::key_value(&label, &format!("{payee} expects {amount}"));
    }
    for (i, route) in signed.terms.payee_routes.iter().enumerate() {
        if let Some(route) = route {
            ui::key_value(&format!("Route {i}"), &route.to_string());
        }
    }
    if let Some(route) = &signed.refund_route {
        ui::key_value("Refund Route", &route.to_string());
    }
    if !signed.terms.data.is_empty() {
        ui::key_value("Data", &signed.terms.data);
    }
    ui::key_value("Request Hash", &hex::encode(signed.terms.request_hash()?));
    ui::key_value("Expires", &ui::timestamp(signed.terms.expires_at));
    ui::separator();

    if let Some(asset) = settled.filter(|asset| *asset != signed.asset) {
        ui::error(&format!("Payload claims asset {}", signed.asset));
        anyhow::bail!("extension settles {asset}, not {}", signed.asset);
    }
    match signed.verify(now) {
        Ok(()) => {
            ui::success(&format!("Valid as of {}", ui::timestamp(now)));
            Ok(())
        }
        Err(e) => {
            ui::error(&format!("Invalid: {e}"));
            Err(e).context("verifying signed request")
        }
    }
}
