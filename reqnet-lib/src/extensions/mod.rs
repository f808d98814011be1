//! Currency extensions.
//!
//! An extension wraps the core with asset-specific value movement. The
//! asset-independent rules (roles, lifecycle checks, fee charging, signed
//! broadcast) live in default methods of [`CurrencyExtension`] and
//! [`SettlingExtension`]; concrete extensions only say which routes they
//! accept and how value reaches a route.
//!
//! Every entry point runs in one ledger transaction, and every operation on
//! an existing request holds that request's lock. Bookkeeping is always
//! written before value leaves the ledger.

pub mod escrow;
pub mod external;
pub mod native;
pub mod token;

pub use escrow::{EscrowExtension, EscrowRecord, EscrowState};
pub use external::ExternalExtension;
pub use native::NativeExtension;
pub use token::TokenExtension;

use crate::errors::Role;
use crate::ledger::{CallContext, Ledger, RequestRoutes};
use crate::signing::SignedRequest;
use crate::types::{AssetId, PayeeSlot, Request, RequestId, RequestState, Route};
use crate::{Address, Amount, LedgerError, Result};

/// Parameters of a payee-initiated request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayeeCreation {
    /// Identity addresses; index 0 is the primary payee and must be the caller.
    pub payees: Vec<Address>,
    /// Optional per-payee destination, at most one per payee.
    pub payee_routes: Vec<Option<Route>>,
    pub expected_amounts: Vec<Amount>,
    pub payer: Address,
    pub payer_refund_route: Option<Route>,
    pub data: String,
}

impl PayeeCreation {
    pub fn new(payees: Vec<Address>, expected_amounts: Vec<Amount>, payer: Address) -> Self {
        Self {
            payees,
            expected_amounts,
            payer,
            ..Self::default()
        }
    }

    pub fn with_payee_routes(mut self, routes: Vec<Option<Route>>) -> Self {
        self.payee_routes = routes;
        self
    }

    pub fn with_refund_route(mut self, route: Route) -> Self {
        self.payer_refund_route = Some(route);
        self
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = data.into();
        self
    }
}

/// Parameters of a payer-initiated request, funded in the same call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayerCreation {
    pub payees: Vec<Address>,
    pub expected_amounts: Vec<Amount>,
    pub payer_refund_route: Option<Route>,
    pub amounts_to_pay: Vec<Amount>,
    pub tips: Vec<Amount>,
    pub data: String,
}

impl PayerCreation {
    pub fn new(payees: Vec<Address>, expected_amounts: Vec<Amount>) -> Self {
        Self {
            payees,
            expected_amounts,
            ..Self::default()
        }
    }

    pub fn with_payment(mut self, amounts_to_pay: Vec<Amount>) -> Self {
        self.amounts_to_pay = amounts_to_pay;
        self
    }

    pub fn with_tips(mut self, tips: Vec<Amount>) -> Self {
        self.tips = tips;
        self
    }

    pub fn with_refund_route(mut self, route: Route) -> Self {
        self.payer_refund_route = Some(route);
        self
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = data.into();
        self
    }
}

/// Operations shared by every asset family.
pub trait CurrencyExtension: Send + Sync {
    /// Address the core knows this extension by.
    fn address(&self) -> Address;

    fn asset(&self) -> AssetId;

    /// Reject routes this extension cannot move value to.
    fn check_route(&self, route: &Route) -> Result<()>;

    /// Native value that must accompany a movement of `principal`.
    fn attached_principal(&self, _principal: Amount) -> Result<Amount> {
        Ok(Amount::ZERO)
    }

    /// Deliver `amount` to `to` on behalf of the caller.
    fn settle(&self, _ledger: &mut Ledger, _ctx: &CallContext, _to: &Route, _amount: Amount) -> Result<()> {
        Err(LedgerError::invalid_input(
            "amounts",
            format!("{} is settled outside the ledger", self.asset()),
        ))
    }

    /// Create a request as its primary payee. The attached value must equal
    /// the fee on the total expected amount.
    #[tracing::instrument(skip_all, fields(extension = %self.address(), sender = %ctx.sender))]
    fn create_request_as_payee(
        &self,
        ledger: &mut Ledger,
        ctx: &CallContext,
        params: PayeeCreation,
    ) -> Result<RequestId> {
        let ext = self.address();
        ledger.transact(|ledger| {
            require_creation_open(ledger, &ext)?;
            validate_payees(&params.payees, &params.expected_amounts)?;
            if params.payees[0] != ctx.sender {
                return Err(LedgerError::invalid_input(
                    "payees",
                    "the caller must be the primary payee",
                ));
            }
            params.payer.require_nonzero("payer")?;
            if params.payer == params.payees[0] {
                return Err(LedgerError::invalid_input("payer", "payer cannot be the primary payee"));
            }
            self.check_routes(&params.payee_routes, params.payees.len())?;
            if let Some(route) = &params.payer_refund_route {
                self.check_route(route)?;
            }

            let total = Amount::sum(&params.expected_amounts, "total expected amount")?;
            let fee = ledger.fees().estimate(&ext, total)?;
            expect_value(ctx, fee)?;
            ledger.collect_attached(ctx, ext)?;

            let id = ledger.core_mut().create_request(
                ext,
                ctx.sender,
                &params.payees,
                &params.expected_amounts,
                params.payer,
                &params.data,
            )?;
            ledger.set_routes(
                id,
                RequestRoutes {
                    payee_routes: params.payee_routes.clone(),
                    payer_refund: params.payer_refund_route.clone(),
                },
            );
            forward_fee(ledger, ext, fee)?;
            Ok(id)
        })
    }

    /// Redeem a payee-signed request: create, accept and optionally fund it
    /// in one transaction, with the caller as payer.
    #[tracing::instrument(skip_all, fields(extension = %self.address(), sender = %ctx.sender))]
    fn broadcast_signed_request(
        &self,
        ledger: &mut Ledger,
        ctx: &CallContext,
        signed: &SignedRequest,
        amounts_to_pay: &[Amount],
        tips: &[Amount],
    ) -> Result<RequestId> {
        let ext = self.address();
        ledger.transact(|ledger| {
            require_creation_open(ledger, &ext)?;
            signed.verify(ctx.now)?;

            let terms = &signed.terms;
            if terms.extension != ext {
                return Err(LedgerError::WrongExtension {
                    signed: terms.extension,
                    actual: ext,
                });
            }
            let asset = self.asset();
            if signed.asset != asset {
                return Err(LedgerError::WrongAsset {
                    signed: signed.asset.clone(),
                    actual: asset,
                });
            }
            let main_payee = terms.payees[0];
            if ctx.sender == main_payee {
                return Err(LedgerError::SelfDealing(ctx.sender));
            }
            if let Some(expected) = terms.payer {
                if expected != ctx.sender {
                    return Err(LedgerError::PayerMismatch {
                        expected,
                        actual: ctx.sender,
                    });
                }
            }
            let hash = terms.request_hash()?;
            if !ledger.mark_redeemed(hash) {
                return Err(LedgerError::AlreadyRedeemed);
            }

            validate_payees(&terms.payees, &terms.expected_amounts)?;
            if terms.expected_amounts.iter().any(Amount::is_negative) {
                return Err(LedgerError::invalid_input(
                    "expected amounts",
                    "signed requests cannot expect negative amounts",
                ));
            }
            self.check_routes(&terms.payee_routes, terms.payees.len())?;
            if let Some(route) = &signed.refund_route {
                self.check_route(route)?;
            }
            check_amount_list(amounts_to_pay, terms.payees.len(), "amounts to pay")?;
            check_amount_list(tips, terms.payees.len(), "tips")?;

            let total = Amount::sum(&terms.expected_amounts, "total expected amount")?;
            let fee = ledger.fees().estimate(&ext, total)?;
            let principal = Amount::sum(amounts_to_pay, "payment total")?;
            let required = fee.add_or_overflow(self.attached_principal(principal)?, "attached value")?;
            expect_value(ctx, required)?;
            ledger.collect_attached(ctx, ext)?;

            let id = ledger.core_mut().create_request(
                ext,
                main_payee,
                &terms.payees,
                &terms.expected_amounts,
                ctx.sender,
                &terms.data,
            )?;
            ledger.set_routes(
                id,
                RequestRoutes {
                    payee_routes: terms.payee_routes.clone(),
                    payer_refund: signed.refund_route.clone(),
                },
            );
            ledger.core_mut().accept(ext, &id)?;
            ledger.with_request_lock(&id, |ledger| {
                self.apply_payment(ledger, ctx, &id, amounts_to_pay, tips)?;
                forward_fee(ledger, ext, fee)
            })?;
            tracing::debug!(%id, "signed request redeemed");
            Ok(id)
        })
    }

    /// Payer accepts the request.
    fn accept(&self, ledger: &mut Ledger, ctx: &CallContext, id: &RequestId) -> Result<()> {
        let ext = self.address();
        guarded(ledger, id, |ledger| {
            expect_value(ctx, Amount::ZERO)?;
            let request = ledger.request(id)?;
            require_role(request, ctx.sender, Role::Payer)?;
            ledger.core_mut().accept(ext, id)
        })
    }

    /// Payer cancels while Created; primary payee cancels any time before
    /// Canceled. Either way no balance may be left on the request.
    fn cancel(&self, ledger: &mut Ledger, ctx: &CallContext, id: &RequestId) -> Result<()> {
        let ext = self.address();
        guarded(ledger, id, |ledger| {
            expect_value(ctx, Amount::ZERO)?;
            let request = ledger.request(id)?;
            if request.state == RequestState::Canceled {
                return if ctx.sender == request.payer || ctx.sender == request.payee.address {
                    Ok(())
                } else {
                    Err(unauthorized(request, ctx.sender, Role::PayerOrPayee))
                };
            }
            if ctx.sender == request.payer {
                if request.state != RequestState::Created {
                    return Err(LedgerError::invalid_state(*id, request.state, "cancel"));
                }
            } else if ctx.sender != request.payee.address {
                return Err(unauthorized(request, ctx.sender, Role::PayerOrPayee));
            }
            if !request.are_all_balances_null() {
                return Err(LedgerError::BalanceNotNull(*id));
            }
            ledger.core_mut().cancel(ext, id)
        })
    }

    /// Payer raises expected amounts.
    fn additional(
        &self,
        ledger: &mut Ledger,
        ctx: &CallContext,
        id: &RequestId,
        amounts: &[Amount],
    ) -> Result<()> {
        let ext = self.address();
        guarded(ledger, id, |ledger| {
            expect_value(ctx, Amount::ZERO)?;
            let request = ledger.request(id)?;
            require_role(request, ctx.sender, Role::Payer)?;
            require_not_canceled(request, "increase")?;
            check_amount_list(amounts, request.payee_count(), "amounts")?;
            let slots = slots_for(request, amounts)?;
            for (slot, amount) in slots {
                ledger.core_mut().update_expected_amount(ext, id, slot, amount)?;
            }
            Ok(())
        })
    }

    /// Primary payee lowers expected amounts, never below what is unmet.
    fn subtract(
        &self,
        ledger: &mut Ledger,
        ctx: &CallContext,
        id: &RequestId,
        amounts: &[Amount],
    ) -> Result<()> {
        let ext = self.address();
        guarded(ledger, id, |ledger| {
            expect_value(ctx, Amount::ZERO)?;
            let request = ledger.request(id)?;
            require_role(request, ctx.sender, Role::Payee)?;
            require_not_canceled(request, "decrease")?;
            check_amount_list(amounts, request.payee_count(), "amounts")?;
            let mut deltas = Vec::with_capacity(amounts.len());
            for (slot, amount) in slots_for(request, amounts)? {
                let unmet = request.payee(slot)?.unmet()?;
                if amount > unmet {
                    tracing::warn!(%id, index = slot.index(), %amount, %unmet, "subtract exceeds unmet amount");
                    return Err(LedgerError::invalid_input(
                        "amounts",
                        format!(
                            "subtracting {amount} from payee {} exceeds its unmet amount {unmet}",
                            slot.index()
                        ),
                    ));
                }
                let delta = amount.checked_neg().ok_or(LedgerError::Overflow("subtract"))?;
                deltas.push((slot, delta));
            }
            for (slot, delta) in deltas {
                ledger.core_mut().update_expected_amount(ext, id, slot, delta)?;
            }
            Ok(())
        })
    }

    /// Record tips then payments and deliver the payments. The caller holds
    /// the request lock and has validated both lists.
    fn apply_payment(
        &self,
        ledger: &mut Ledger,
        ctx: &CallContext,
        id: &RequestId,
        amounts: &[Amount],
        tips: &[Amount],
    ) -> Result<()> {
        let ext = self.address();
        let request = ledger.request(id)?.clone();
        for (slot, tip) in slots_for(&request, tips)? {
            ledger.core_mut().update_expected_amount(ext, id, slot, tip)?;
        }
        let payments = slots_for(&request, amounts)?;
        for (slot, amount) in &payments {
            ledger.core_mut().update_balance(ext, id, *slot, *amount)?;
        }
        for (slot, amount) in payments {
            let to = payment_route(ledger, &request, slot)?;
            self.settle(ledger, ctx, &to, amount)?;
        }
        Ok(())
    }

    fn check_routes(&self, routes: &[Option<Route>], payee_count: usize) -> Result<()> {
        if routes.len() > payee_count {
            return Err(LedgerError::invalid_input("payee routes", "more routes than payees"));
        }
        for route in routes.iter().flatten() {
            self.check_route(route)?;
        }
        Ok(())
    }
}

/// Operations of extensions that move value on the ledger.
pub trait SettlingExtension: CurrencyExtension {
    /// Create, accept and fund a request as its payer in one call.
    #[tracing::instrument(skip_all, fields(extension = %self.address(), sender = %ctx.sender))]
    fn create_request_as_payer(
        &self,
        ledger: &mut Ledger,
        ctx: &CallContext,
        params: PayerCreation,
    ) -> Result<RequestId> {
        let ext = self.address();
        ledger.transact(|ledger| {
            require_creation_open(ledger, &ext)?;
            validate_payees(&params.payees, &params.expected_amounts)?;
            if params.payees[0] == ctx.sender {
                return Err(LedgerError::invalid_input("payees", "payer cannot be the primary payee"));
            }
            if let Some(route) = &params.payer_refund_route {
                self.check_route(route)?;
            }
            let count = params.payees.len();
            check_amount_list(&params.amounts_to_pay, count, "amounts to pay")?;
            check_amount_list(&params.tips, count, "tips")?;

            let total = Amount::sum(&params.expected_amounts, "total expected amount")?;
            let fee = ledger.fees().estimate(&ext, total)?;
            let principal = Amount::sum(&params.amounts_to_pay, "payment total")?;
            let required = fee.add_or_overflow(self.attached_principal(principal)?, "attached value")?;
            expect_value(ctx, required)?;
            ledger.collect_attached(ctx, ext)?;

            let id = ledger.core_mut().create_request(
                ext,
                ctx.sender,
                &params.payees,
                &params.expected_amounts,
                ctx.sender,
                &params.data,
            )?;
            ledger.set_routes(
                id,
                RequestRoutes {
                    payee_routes: Vec::new(),
                    payer_refund: params.payer_refund_route.clone(),
                },
            );
            ledger.core_mut().accept(ext, &id)?;
            ledger.with_request_lock(&id, |ledger| {
                self.apply_payment(ledger, ctx, &id, &params.amounts_to_pay, &params.tips)?;
                forward_fee(ledger, ext, fee)
            })?;
            Ok(id)
        })
    }

    /// Pay toward a request. Anyone may pay; only the payer may tip. A
    /// payment by the payer accepts a Created request first.
    #[tracing::instrument(skip_all, fields(extension = %self.address(), %id, sender = %ctx.sender))]
    fn pay(
        &self,
        ledger: &mut Ledger,
        ctx: &CallContext,
        id: &RequestId,
        amounts: &[Amount],
        tips: &[Amount],
    ) -> Result<()> {
        pay_request(self, ledger, ctx, id, amounts, tips)
    }

    /// Return value from a payee slot to the payer.
    ///
    /// The caller is matched against payee identity addresses first and
    /// against account routes second.
    #[tracing::instrument(skip_all, fields(extension = %self.address(), %id, sender = %ctx.sender, %amount))]
    fn refund(&self, ledger: &mut Ledger, ctx: &CallContext, id: &RequestId, amount: Amount) -> Result<()> {
        let ext = self.address();
        guarded(ledger, id, |ledger| {
            let request = ledger.request(id)?.clone();
            require_not_canceled(&request, "refund")?;
            if amount.is_negative() {
                return Err(LedgerError::invalid_input("amount", "must not be negative"));
            }
            let routes = ledger.routes(id).cloned().unwrap_or_default();
            let slot = refund_slot(&request, &routes, &ctx.sender)
                .ok_or_else(|| unauthorized(&request, ctx.sender, Role::Payee))?;
            let balance = request.payee(slot)?.balance;
            if amount > balance {
                return Err(LedgerError::invalid_input(
                    "amount",
                    format!("refund of {amount} exceeds balance {balance}"),
                ));
            }
            expect_value(ctx, self.attached_principal(amount)?)?;
            ledger.collect_attached(ctx, ext)?;
            if amount.is_zero() {
                return Ok(());
            }

            let delta = amount.checked_neg().ok_or(LedgerError::Overflow("refund"))?;
            ledger.core_mut().update_balance(ext, id, slot, delta)?;
            let to = routes
                .payer_refund
                .clone()
                .unwrap_or(Route::Account(request.payer));
            self.settle(ledger, ctx, &to, amount)
        })
    }
}

/// Shared body of `pay` for every extension that takes payments on the
/// ledger.
fn pay_request<E: CurrencyExtension + ?Sized>(
    extension: &E,
    ledger: &mut Ledger,
    ctx: &CallContext,
    id: &RequestId,
    amounts: &[Amount],
    tips: &[Amount],
) -> Result<()> {
    let ext = extension.address();
    guarded(ledger, id, |ledger| {
        let request = ledger.request(id)?;
        require_not_canceled(request, "pay")?;
        check_amount_list(amounts, request.payee_count(), "amounts")?;
        check_amount_list(tips, request.payee_count(), "tips")?;
        if tips.iter().any(|t| !t.is_zero()) {
            require_role(request, ctx.sender, Role::Payer)?;
        }
        let accept = ctx.sender == request.payer && request.state == RequestState::Created;
        let principal = Amount::sum(amounts, "payment total")?;
        expect_value(ctx, extension.attached_principal(principal)?)?;
        ledger.collect_attached(ctx, ext)?;
        if accept {
            ledger.core_mut().accept(ext, id)?;
        }
        extension.apply_payment(ledger, ctx, id, amounts, tips)
    })
}

/// Run `f` in its own transaction while holding the lock on `id`.
fn guarded<T>(
    ledger: &mut Ledger,
    id: &RequestId,
    f: impl FnOnce(&mut Ledger) -> Result<T>,
) -> Result<T> {
    ledger.transact(|ledger| ledger.with_request_lock(id, f))
}

fn require_creation_open(ledger: &Ledger, extension: &Address) -> Result<()> {
    if ledger.access().is_creation_paused(extension) {
        tracing::warn!(%extension, "request creation rejected while paused");
        return Err(LedgerError::Paused);
    }
    Ok(())
}

fn validate_payees(payees: &[Address], expected_amounts: &[Amount]) -> Result<()> {
    if payees.is_empty() {
        return Err(LedgerError::invalid_input("payees", "at least one payee is required"));
    }
    if payees.len() != expected_amounts.len() {
        return Err(LedgerError::invalid_input(
            "expected amounts",
            format!("{} amounts for {} payees", expected_amounts.len(), payees.len()),
        ));
    }
    for payee in payees {
        payee.require_nonzero("payee")?;
    }
    Ok(())
}

/// Lists applied per payee index: no longer than the payee list, no
/// negative entries.
fn check_amount_list(amounts: &[Amount], payee_count: usize, field: &'static str) -> Result<()> {
    if amounts.len() > payee_count {
        return Err(LedgerError::invalid_input(
            field,
            format!("{} entries for {} payees", amounts.len(), payee_count),
        ));
    }
    if amounts.iter().any(Amount::is_negative) {
        return Err(LedgerError::invalid_input(field, "entries must not be negative"));
    }
    Ok(())
}

/// Non-zero entries of `amounts` paired with their resolved slots.
fn slots_for(request: &Request, amounts: &[Amount]) -> Result<Vec<(PayeeSlot, Amount)>> {
    amounts
        .iter()
        .enumerate()
        .filter(|(_, amount)| !amount.is_zero())
        .map(|(index, amount)| request.slot(index).map(|slot| (slot, *amount)))
        .collect()
}

fn expect_value(ctx: &CallContext, required: Amount) -> Result<()> {
    if ctx.value != required {
        return Err(LedgerError::ValueMismatch {
            required,
            attached: ctx.value,
        });
    }
    Ok(())
}

fn forward_fee(ledger: &mut Ledger, extension: Address, fee: Amount) -> Result<()> {
    if fee.is_zero() {
        return Ok(());
    }
    let sink = ledger.fees().sink();
    tracing::debug!(%extension, %fee, "forwarding fee");
    ledger.transfer_native(extension, sink, fee)
}

fn require_role(request: &Request, sender: Address, role: Role) -> Result<()> {
    let allowed = match role {
        Role::Payer => sender == request.payer,
        Role::Payee => sender == request.payee.address,
        Role::PayerOrPayee => sender == request.payer || sender == request.payee.address,
    };
    if allowed {
        Ok(())
    } else {
        Err(unauthorized(request, sender, role))
    }
}

fn unauthorized(request: &Request, caller: Address, role: Role) -> LedgerError {
    LedgerError::Unauthorized {
        request_id: request.id,
        caller,
        role,
    }
}

fn require_not_canceled(request: &Request, operation: &'static str) -> Result<()> {
    if request.state == RequestState::Canceled {
        return Err(LedgerError::invalid_state(request.id, request.state, operation));
    }
    Ok(())
}

/// Route that receives payments for `slot`: its recorded route, or its
/// identity address.
fn payment_route(ledger: &Ledger, request: &Request, slot: PayeeSlot) -> Result<Route> {
    if let Some(route) = ledger
        .routes(&request.id)
        .and_then(|r| r.payee_route(slot.index()))
    {
        return Ok(route.clone());
    }
    Ok(Route::Account(request.payee(slot)?.address))
}

fn refund_slot(request: &Request, routes: &RequestRoutes, sender: &Address) -> Option<PayeeSlot> {
    request.slot_of(sender).or_else(|| {
        routes
            .payee_routes
            .iter()
            .position(|route| route.as_ref().and_then(Route::account) == Some(*sender))
            .and_then(|index| request.slot(index).ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_list_checks() {
        assert!(check_amount_list(&[Amount::new(1), Amount::ZERO], 2, "amounts").is_ok());
        assert!(check_amount_list(&[Amount::new(1); 3], 2, "amounts").is_err());
        assert!(check_amount_list(&[Amount::new(-1)], 2, "amounts").is_err());
    }

    #[test]
    fn test_expect_value_is_exact() {
        let ctx = CallContext::new(Address::from_label("a"), 0).with_value(5);
        assert!(expect_value(&ctx, Amount::new(5)).is_ok());
        assert_eq!(
            expect_value(&ctx, Amount::new(4)),
            Err(LedgerError::ValueMismatch {
                required: Amount::new(4),
                attached: Amount::new(5),
            })
        );
    }

    #[test]
    fn test_validate_payees() {
        let a = Address::from_label("a");
        assert!(validate_payees(&[a], &[Amount::new(1)]).is_ok());
        assert!(validate_payees(&[], &[]).is_err());
        assert!(validate_payees(&[a, Address::ZERO], &[Amount::new(1), Amount::new(1)]).is_err());
        assert!(validate_payees(&[a], &[Amount::new(1), Amount::new(1)]).is_err());
    }
}
