//! Native asset extension.
//!
//! Payments and refunds travel as value attached to the call. The extension
//! account holds it only for the duration of the call and forwards it to the
//! route.

use super::{CurrencyExtension, SettlingExtension};
use crate::ledger::{CallContext, Ledger};
use crate::types::{AssetId, Route};
use crate::{Address, Amount, LedgerError, Result};

/// Label the default native extension address is derived from.
pub const NATIVE_LABEL: &str = "extension/native";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeExtension {
    address: Address,
}

impl NativeExtension {
    pub fn new(address: Address) -> Self {
        Self { address }
    }
}

impl Default for NativeExtension {
    fn default() -> Self {
        Self::new(Address::from_label(NATIVE_LABEL))
    }
}

impl CurrencyExtension for NativeExtension {
    fn address(&self) -> Address {
        self.address
    }

    fn asset(&self) -> AssetId {
        AssetId::Native
    }

    fn check_route(&self, route: &Route) -> Result<()> {
        match route {
            Route::Account(addr) => addr.require_nonzero("route").map(|_| ()),
            Route::External(_) => Err(LedgerError::invalid_input(
                "route",
                "native payments need an account route",
            )),
        }
    }

    fn attached_principal(&self, principal: Amount) -> Result<Amount> {
        Ok(principal)
    }

    fn settle(&self, ledger: &mut Ledger, _ctx: &CallContext, to: &Route, amount: Amount) -> Result<()> {
        self.check_route(to)?;
        match to {
            Route::Account(to) => ledger.transfer_native(self.address, *to, amount),
            Route::External(_) => Ok(()),
        }
    }
}

impl SettlingExtension for NativeExtension {}
