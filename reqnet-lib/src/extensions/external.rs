//! Externally validated asset extension.
//!
//! Value for these requests moves on another network. The ledger only keeps
//! the books: requests are created, accepted, adjusted and canceled here,
//! while payments and refunds settle off-ledger and leave balances at zero.
//! Routes are opaque strings and are never validated.

use super::{guarded, require_role, CurrencyExtension};
use crate::errors::Role;
use crate::ledger::{CallContext, Ledger};
use crate::types::{AssetId, RequestId, Route};
use crate::{Address, Amount, LedgerError, Result};

/// Label the default external extension address is derived from.
pub const EXTERNAL_LABEL: &str = "extension/external";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalExtension {
    address: Address,
    code: String,
}

impl ExternalExtension {
    pub fn new(address: Address, code: impl Into<String>) -> Self {
        Self {
            address,
            code: code.into(),
        }
    }

    /// Currency code of the external asset, e.g. `BTC`.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Record where refunds should go on the external network. Payer only,
    /// and only once per request.
    #[tracing::instrument(skip_all, fields(extension = %self.address, %id, sender = %ctx.sender))]
    pub fn add_payer_refund_route(
        &self,
        ledger: &mut Ledger,
        ctx: &CallContext,
        id: &RequestId,
        route: Route,
    ) -> Result<()> {
        guarded(ledger, id, |ledger| {
            if !ctx.value.is_zero() {
                return Err(LedgerError::ValueMismatch {
                    required: Amount::ZERO,
                    attached: ctx.value,
                });
            }
            let request = ledger.request(id)?;
            if request.currency_contract != self.address {
                return Err(LedgerError::NotOwner {
                    request_id: *id,
                    caller: self.address,
                });
            }
            require_role(request, ctx.sender, Role::Payer)?;
            self.check_route(&route)?;
            let routes = ledger.routes_mut(id);
            if routes.payer_refund.is_some() {
                return Err(LedgerError::RefundRouteAlreadySet(*id));
            }
            routes.payer_refund = Some(route);
            tracing::debug!("payer refund route recorded");
            Ok(())
        })
    }
}

impl CurrencyExtension for ExternalExtension {
    fn address(&self) -> Address {
        self.address
    }

    fn asset(&self) -> AssetId {
        AssetId::External(self.code.clone())
    }

    fn check_route(&self, route: &Route) -> Result<()> {
        match route {
            Route::External(s) if !s.is_empty() => Ok(()),
            Route::External(_) => Err(LedgerError::invalid_input("route", "must not be empty")),
            Route::Account(_) => Err(LedgerError::invalid_input(
                "route",
                format!("{} requests need an external route", self.code),
            )),
        }
    }
}
