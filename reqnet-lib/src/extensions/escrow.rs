//! Escrowed native extension.
//!
//! Payments are booked on the request exactly like native payments, but the
//! value stays in the extension account instead of reaching the payees. Once
//! the request is accepted, the payer or the escrow agent releases the held
//! value to the payees, or the primary payee or the agent returns it to the
//! payer. Either release settles the escrow for good; later payments fail
//! with `EscrowClosed`.

use super::{
    expect_value, guarded, pay_request, payment_route, slots_for, unauthorized, CurrencyExtension,
    PayeeCreation,
};
use crate::errors::Role;
use crate::ledger::{CallContext, Ledger};
use crate::types::{AssetId, Request, RequestId, RequestState, Route};
use crate::{Address, Amount, LedgerError, Result};
use serde::{Deserialize, Serialize};

/// Label the default escrow extension address is derived from.
pub const ESCROW_LABEL: &str = "extension/escrow";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscrowState {
    /// Payments accumulate in the extension account.
    Holding,
    /// Held value went to the payees.
    Released,
    /// Held value went back to the payer.
    Refunded,
}

/// Escrow bookkeeping of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscrowRecord {
    /// Third party allowed to release in either direction.
    pub agent: Option<Address>,
    pub state: EscrowState,
    /// Value held per payee slot, in slot order.
    pub held: Vec<Amount>,
}

impl EscrowRecord {
    fn new(agent: Option<Address>, payee_count: usize) -> Self {
        Self {
            agent,
            state: EscrowState::Holding,
            held: vec![Amount::ZERO; payee_count],
        }
    }

    pub fn total_held(&self) -> Result<Amount> {
        Amount::sum(&self.held, "escrow total")
    }

    fn is_agent(&self, account: &Address) -> bool {
        self.agent.as_ref() == Some(account)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscrowExtension {
    address: Address,
}

impl EscrowExtension {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    /// Create a payee request whose payments are held until released, with
    /// `agent` as the escrow agent.
    #[tracing::instrument(skip_all, fields(extension = %self.address, sender = %ctx.sender, %agent))]
    pub fn create_escrowed_request(
        &self,
        ledger: &mut Ledger,
        ctx: &CallContext,
        params: PayeeCreation,
        agent: Address,
    ) -> Result<RequestId> {
        agent.require_nonzero("agent")?;
        ledger.transact(|ledger| {
            let payee_count = params.payees.len();
            let id = self.create_request_as_payee(ledger, ctx, params)?;
            ledger.set_escrow(id, EscrowRecord::new(Some(agent), payee_count));
            Ok(id)
        })
    }

    /// Pay toward a request; the value is held. Same rules as a native
    /// payment, including the payer's auto-accept.
    pub fn pay(
        &self,
        ledger: &mut Ledger,
        ctx: &CallContext,
        id: &RequestId,
        amounts: &[Amount],
        tips: &[Amount],
    ) -> Result<()> {
        pay_request(self, ledger, ctx, id, amounts, tips)
    }

    /// Hand the held value to each payee's route. Payer or agent, on an
    /// accepted request.
    #[tracing::instrument(skip_all, fields(extension = %self.address, %id, sender = %ctx.sender))]
    pub fn release_to_payee(&self, ledger: &mut Ledger, ctx: &CallContext, id: &RequestId) -> Result<()> {
        guarded(ledger, id, |ledger| {
            expect_value(ctx, Amount::ZERO)?;
            let request = ledger.request(id)?.clone();
            let mut record = self.holding_record(ledger, &request)?;
            if ctx.sender != request.payer && !record.is_agent(&ctx.sender) {
                return Err(unauthorized(&request, ctx.sender, Role::Payer));
            }
            require_accepted(&request, "release")?;

            let held = std::mem::replace(&mut record.held, vec![Amount::ZERO; request.payee_count()]);
            record.state = EscrowState::Released;
            ledger.set_escrow(*id, record);
            for (index, amount) in held.into_iter().enumerate() {
                if amount.is_zero() {
                    continue;
                }
                let to = payment_route(ledger, &request, request.slot(index)?)?;
                self.settle(ledger, ctx, &to, amount)?;
            }
            tracing::debug!("escrow released to payees");
            Ok(())
        })
    }

    /// Return the held value to the payer and take it off the balances.
    /// Primary payee or agent, on an accepted request.
    #[tracing::instrument(skip_all, fields(extension = %self.address, %id, sender = %ctx.sender))]
    pub fn release_to_payer(&self, ledger: &mut Ledger, ctx: &CallContext, id: &RequestId) -> Result<()> {
        guarded(ledger, id, |ledger| {
            expect_value(ctx, Amount::ZERO)?;
            let request = ledger.request(id)?.clone();
            let mut record = self.holding_record(ledger, &request)?;
            if ctx.sender != request.payee.address && !record.is_agent(&ctx.sender) {
                return Err(unauthorized(&request, ctx.sender, Role::Payee));
            }
            require_accepted(&request, "refund")?;

            let total = record.total_held()?;
            let held = std::mem::replace(&mut record.held, vec![Amount::ZERO; request.payee_count()]);
            record.state = EscrowState::Refunded;
            ledger.set_escrow(*id, record);
            for (slot, amount) in slots_for(&request, &held)? {
                let delta = amount.checked_neg().ok_or(LedgerError::Overflow("escrow refund"))?;
                ledger.core_mut().update_balance(self.address, id, slot, delta)?;
            }
            let to = ledger
                .routes(id)
                .and_then(|r| r.payer_refund.clone())
                .unwrap_or(Route::Account(request.payer));
            self.settle(ledger, ctx, &to, total)?;
            tracing::debug!(%total, "escrow returned to payer");
            Ok(())
        })
    }

    /// The request's escrow record, which must still be holding. Requests
    /// created without an agent get a record on first use.
    fn holding_record(&self, ledger: &Ledger, request: &Request) -> Result<EscrowRecord> {
        if request.currency_contract != self.address {
            return Err(LedgerError::NotOwner {
                request_id: request.id,
                caller: self.address,
            });
        }
        let record = ledger
            .escrow(&request.id)
            .cloned()
            .unwrap_or_else(|| EscrowRecord::new(None, request.payee_count()));
        if record.state != EscrowState::Holding {
            return Err(LedgerError::EscrowClosed(request.id));
        }
        Ok(record)
    }
}

impl Default for EscrowExtension {
    fn default() -> Self {
        Self::new(Address::from_label(ESCROW_LABEL))
    }
}

fn require_accepted(request: &Request, operation: &'static str) -> Result<()> {
    if request.state != RequestState::Accepted {
        return Err(LedgerError::invalid_state(request.id, request.state, operation));
    }
    Ok(())
}

impl CurrencyExtension for EscrowExtension {
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
                "escrowed payments need an account route",
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

    /// Book tips and payments, and hold the paid value.
    fn apply_payment(
        &self,
        ledger: &mut Ledger,
        _ctx: &CallContext,
        id: &RequestId,
        amounts: &[Amount],
        tips: &[Amount],
    ) -> Result<()> {
        let request = ledger.request(id)?.clone();
        let mut record = self.holding_record(ledger, &request)?;
        for (slot, tip) in slots_for(&request, tips)? {
            ledger.core_mut().update_expected_amount(self.address, id, slot, tip)?;
        }
        for (slot, amount) in slots_for(&request, amounts)? {
            ledger.core_mut().update_balance(self.address, id, slot, amount)?;
            let count = record.held.len();
            let held = record
                .held
                .get_mut(slot.index())
                .ok_or(LedgerError::IndexOutOfRange {
                    index: slot.index(),
                    count,
                })?;
            *held = held.add_or_overflow(amount, "escrow held")?;
        }
        ledger.set_escrow(*id, record);
        Ok(())
    }
}
