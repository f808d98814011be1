//! Request core: the canonical registry of requests.
//!
//! The core assigns ids, applies state transitions and signed deltas, and
//! emits events. It holds no asset logic. Every mutation is gated on the
//! caller being a trusted extension that owns the request; application
//! bounds (refund limits, subtract limits, roles) are enforced by the
//! extensions.

use crate::access::AccessControl;
use crate::events::{EventLog, LedgerEvent};
use crate::types::{Payee, PayeeSlot, Request, RequestId, RequestState};
use crate::{Address, Amount, LedgerError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Mutable part of the core.
///
/// While a ledger transaction is open every request touched is recorded with
/// its prior value, so a rollback only replays what the transaction changed.
#[derive(Debug, Default)]
struct CoreState {
    requests: HashMap<RequestId, Request>,
    last_counter: u128,
    events: EventLog,
    journal: Vec<(RequestId, Option<Request>)>,
    depth: usize,
}

/// Position of the core when a transaction began.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CoreMark {
    events: usize,
    journal: usize,
    last_counter: u128,
}

pub struct RequestCore {
    address: Address,
    access: Arc<dyn AccessControl>,
    state: CoreState,
}

impl RequestCore {
    pub fn new(address: Address, access: Arc<dyn AccessControl>) -> Self {
        Self {
            address,
            access,
            state: CoreState::default(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn access(&self) -> &Arc<dyn AccessControl> {
        &self.access
    }

    pub(crate) fn begin(&mut self) -> CoreMark {
        self.state.depth += 1;
        CoreMark {
            events: self.state.events.len(),
            journal: self.state.journal.len(),
            last_counter: self.state.last_counter,
        }
    }

    /// Keep the changes since `begin`. The journal is dropped once the
    /// outermost transaction commits.
    pub(crate) fn commit(&mut self) {
        self.state.depth = self.state.depth.saturating_sub(1);
        if self.state.depth == 0 {
            self.state.journal.clear();
        }
    }

    /// Undo every change made since `mark` was taken.
    pub(crate) fn rollback(&mut self, mark: CoreMark) {
        let undone = self.state.journal.split_off(mark.journal);
        for (id, prior) in undone.into_iter().rev() {
            match prior {
                Some(request) => {
                    self.state.requests.insert(id, request);
                }
                None => {
                    self.state.requests.remove(&id);
                }
            }
        }
        self.state.events.truncate(mark.events);
        self.state.last_counter = mark.last_counter;
        self.state.depth = self.state.depth.saturating_sub(1);
    }

    pub(crate) fn journal_len(&self) -> usize {
        self.state.journal.len()
    }

    /// Create a request on behalf of `creator`.
    ///
    /// `payees[0]` is the primary payee; the rest become sub payees in order.
    /// Emits `Created` followed by one `NewSubPayee` per extra payee.
    #[tracing::instrument(skip(self, payees, expected_amounts, data), fields(payees = payees.len()))]
    pub fn create_request(
        &mut self,
        caller: Address,
        creator: Address,
        payees: &[Address],
        expected_amounts: &[Amount],
        payer: Address,
        data: &str,
    ) -> Result<RequestId> {
        self.access.require_trusted(&caller)?;
        creator.require_nonzero("creator")?;
        if payees.is_empty() {
            return Err(LedgerError::invalid_input("payees", "at least one payee is required"));
        }
        if payees.len() != expected_amounts.len() {
            return Err(LedgerError::invalid_input(
                "expected amounts",
                format!("{} amounts for {} payees", expected_amounts.len(), payees.len()),
            ));
        }

        let counter = self
            .state
            .last_counter
            .checked_add(1)
            .ok_or(LedgerError::Overflow("request counter"))?;
        let id = RequestId::new(self.address, counter)?;

        let request = Request {
            id,
            creator,
            payer,
            currency_contract: caller,
            state: RequestState::Created,
            payee: Payee::new(payees[0], expected_amounts[0]),
            sub_payees: payees[1..]
                .iter()
                .zip(&expected_amounts[1..])
                .map(|(addr, amount)| Payee::new(*addr, *amount))
                .collect(),
            data: data.to_string(),
        };

        self.state.last_counter = counter;
        self.state.events.push(LedgerEvent::Created {
            request_id: id,
            payee: payees[0],
            payer,
            creator,
            data: request.data.clone(),
        });
        for sub in &payees[1..] {
            self.state.events.push(LedgerEvent::NewSubPayee {
                request_id: id,
                sub_payee: *sub,
            });
        }
        if self.state.depth > 0 {
            self.state.journal.push((id, None));
        }
        self.state.requests.insert(id, request);
        tracing::debug!(%id, %creator, %payer, "request created");
        Ok(id)
    }

    /// Created -> Accepted. No-op when already accepted.
    pub fn accept(&mut self, caller: Address, id: &RequestId) -> Result<()> {
        let request = self.owned_mut(caller, id)?;
        match request.state {
            RequestState::Created => {
                request.state = RequestState::Accepted;
                self.state.events.push(LedgerEvent::Accepted { request_id: *id });
                tracing::debug!(%id, "request accepted");
                Ok(())
            }
            RequestState::Accepted => Ok(()),
            RequestState::Canceled => Err(LedgerError::invalid_state(*id, request.state, "accept")),
        }
    }

    /// Created or Accepted -> Canceled. No-op when already canceled.
    pub fn cancel(&mut self, caller: Address, id: &RequestId) -> Result<()> {
        let request = self.owned_mut(caller, id)?;
        if request.state == RequestState::Canceled {
            return Ok(());
        }
        request.state = RequestState::Canceled;
        self.state.events.push(LedgerEvent::Canceled { request_id: *id });
        tracing::debug!(%id, "request canceled");
        Ok(())
    }

    /// Apply a signed delta to one slot's expected amount.
    pub fn update_expected_amount(
        &mut self,
        caller: Address,
        id: &RequestId,
        slot: PayeeSlot,
        delta: Amount,
    ) -> Result<()> {
        let payee = self.owned_mut(caller, id)?.payee_mut(slot)?;
        payee.expected_amount = payee.expected_amount.add_or_overflow(delta, "expected amount")?;
        self.state.events.push(LedgerEvent::UpdateExpectedAmount {
            request_id: *id,
            payee_index: slot.index(),
            delta,
        });
        Ok(())
    }

    /// Apply a signed delta to one slot's balance.
    pub fn update_balance(
        &mut self,
        caller: Address,
        id: &RequestId,
        slot: PayeeSlot,
        delta: Amount,
    ) -> Result<()> {
        let payee = self.owned_mut(caller, id)?.payee_mut(slot)?;
        payee.balance = payee.balance.add_or_overflow(delta, "balance")?;
        self.state.events.push(LedgerEvent::UpdateBalance {
            request_id: *id,
            payee_index: slot.index(),
            delta,
        });
        Ok(())
    }

    fn owned_mut(&mut self, caller: Address, id: &RequestId) -> Result<&mut Request> {
        self.access.require_trusted(&caller)?;
        let request = self
            .state
            .requests
            .get(id)
            .ok_or(LedgerError::UnknownRequest(*id))?;
        if request.currency_contract != caller {
            return Err(LedgerError::NotOwner {
                request_id: *id,
                caller,
            });
        }
        if self.state.depth > 0 {
            self.state.journal.push((*id, Some(request.clone())));
        }
        self.state
            .requests
            .get_mut(id)
            .ok_or(LedgerError::UnknownRequest(*id))
    }

    // Read side

    pub fn request(&self, id: &RequestId) -> Result<&Request> {
        self.state
            .requests
            .get(id)
            .ok_or(LedgerError::UnknownRequest(*id))
    }

    pub fn state(&self, id: &RequestId) -> Result<RequestState> {
        Ok(self.request(id)?.state)
    }

    pub fn payer(&self, id: &RequestId) -> Result<Address> {
        Ok(self.request(id)?.payer)
    }

    pub fn currency_contract(&self, id: &RequestId) -> Result<Address> {
        Ok(self.request(id)?.currency_contract)
    }

    pub fn payee_address(&self, id: &RequestId, slot: PayeeSlot) -> Result<Address> {
        Ok(self.request(id)?.payee(slot)?.address)
    }

    pub fn expected_amount(&self, id: &RequestId, slot: PayeeSlot) -> Result<Amount> {
        Ok(self.request(id)?.payee(slot)?.expected_amount)
    }

    pub fn balance(&self, id: &RequestId, slot: PayeeSlot) -> Result<Amount> {
        Ok(self.request(id)?.payee(slot)?.balance)
    }

    pub fn sub_payee_count(&self, id: &RequestId) -> Result<usize> {
        Ok(self.request(id)?.sub_payees.len())
    }

    pub fn payee_slot_of(&self, id: &RequestId, address: &Address) -> Result<Option<PayeeSlot>> {
        Ok(self.request(id)?.slot_of(address))
    }

    pub fn are_all_balances_null(&self, id: &RequestId) -> Result<bool> {
        Ok(self.request(id)?.are_all_balances_null())
    }

    pub fn total_balance(&self, id: &RequestId) -> Result<Amount> {
        let request = self.request(id)?;
        let balances: Vec<Amount> = request.payees().map(|(_, p)| p.balance).collect();
        Amount::sum(&balances, "total balance")
    }

    pub fn total_expected_amount(&self, id: &RequestId) -> Result<Amount> {
        let request = self.request(id)?;
        let expected: Vec<Amount> = request.payees().map(|(_, p)| p.expected_amount).collect();
        Amount::sum(&expected, "total expected amount")
    }

    /// Counter the next created request will receive.
    pub fn next_counter(&self) -> u128 {
        self.state.last_counter.saturating_add(1)
    }

    pub fn request_count(&self) -> usize {
        self.state.requests.len()
    }

    pub fn events(&self) -> &EventLog {
        &self.state.events
    }
}
