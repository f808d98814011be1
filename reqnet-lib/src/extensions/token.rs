//! Fungible token extension.
//!
//! The principal never passes through the extension: payments and refunds
//! are pulled from the caller with the allowance it granted the extension
//! and delivered straight to the route. Only fees travel as attached native
//! value.

use super::{CurrencyExtension, SettlingExtension};
use crate::ledger::{CallContext, Ledger};
use crate::types::{AssetId, Route};
use crate::{Address, Amount, LedgerError, Result};

/// Label the default token extension address is derived from.
pub const TOKEN_LABEL: &str = "extension/token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenExtension {
    address: Address,
    token: Address,
}

impl TokenExtension {
    pub fn new(address: Address, token: Address) -> Self {
        Self { address, token }
    }

    /// Token contract this extension moves.
    pub fn token(&self) -> Address {
        self.token
    }
}

impl CurrencyExtension for TokenExtension {
    fn address(&self) -> Address {
        self.address
    }

    fn asset(&self) -> AssetId {
        AssetId::Token(self.token)
    }

    fn check_route(&self, route: &Route) -> Result<()> {
        match route {
            Route::Account(addr) => addr.require_nonzero("route").map(|_| ()),
            Route::External(_) => Err(LedgerError::invalid_input(
                "route",
                "token payments need an account route",
            )),
        }
    }

    fn settle(&self, ledger: &mut Ledger, ctx: &CallContext, to: &Route, amount: Amount) -> Result<()> {
        self.check_route(to)?;
        match to {
            Route::Account(to) => {
                ledger.transfer_token_from(self.address, &self.token, ctx.sender, *to, amount)
            }
            Route::External(_) => Ok(()),
        }
    }
}

impl SettlingExtension for TokenExtension {}
