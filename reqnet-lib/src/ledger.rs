//! The ledger world: request core, asset balances, routes and receive hooks.
//!
//! Every public extension operation runs inside [`Ledger::transact`]. While a
//! transaction is open each write records the value it replaced in an undo
//! journal; a failing closure replays its part of the journal backwards.
//! Transactions nest, so an operation re-entered from a receive hook can fail
//! on its own without leaking partial state into the outer one.
//!
//! Value movements call the recipient's [`ReceiveHook`] synchronously with
//! `&mut Ledger`. Hooks may call back into any extension; the per-request
//! lock and write-before-transfer ordering keep such calls from observing
//! stale bookkeeping.

use crate::core::{CoreMark, RequestCore};
use crate::extensions::escrow::EscrowRecord;
use crate::events::EventLog;
use crate::fees::{BurnRecord, FeeCollector};
use crate::types::{AssetId, Request, RequestId, Route};
use crate::{AccessControl, Address, Amount, LedgerError, Result};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;

/// Caller context of one ledger call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    /// Account issuing the call.
    pub sender: Address,
    /// Native value attached to the call.
    pub value: Amount,
    /// Ledger time in unix seconds.
    pub now: i64,
}

impl CallContext {
    pub fn new(sender: Address, now: i64) -> Self {
        Self {
            sender,
            value: Amount::ZERO,
            now,
        }
    }

    /// Context stamped with the current wall-clock time.
    pub fn at_wall_clock(sender: Address) -> Self {
        Self::new(sender, chrono::Utc::now().timestamp())
    }

    pub fn with_value(mut self, value: impl Into<Amount>) -> Self {
        self.value = value.into();
        self
    }
}

/// Code that runs when its address receives value.
pub trait ReceiveHook: Send + Sync {
    fn on_receive(
        &self,
        ledger: &mut Ledger,
        from: Address,
        asset: &AssetId,
        amount: Amount,
    ) -> Result<()>;
}

/// Routing data recorded by an extension for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestRoutes {
    /// One optional route per payee slot, in slot order.
    pub payee_routes: Vec<Option<Route>>,
    pub payer_refund: Option<Route>,
}

impl RequestRoutes {
    pub fn payee_route(&self, index: usize) -> Option<&Route> {
        self.payee_routes.get(index).and_then(|r| r.as_ref())
    }
}

#[derive(Debug, Clone, Default)]
struct TokenBook {
    symbol: String,
    supply: Amount,
    balances: HashMap<Address, Amount>,
    allowances: HashMap<(Address, Address), Amount>,
}

#[derive(Debug, Clone, Default)]
struct Vault {
    native_supply: Amount,
    native: HashMap<Address, Amount>,
    tokens: HashMap<Address, TokenBook>,
}

impl Vault {
    fn native_balance(&self, owner: &Address) -> Amount {
        self.native.get(owner).copied().unwrap_or_default()
    }
}

/// Value a write replaced, replayed on rollback.
#[derive(Debug)]
enum Undo {
    NativeBalance(Address, Option<Amount>),
    NativeSupply(Amount),
    TokenIssued(Address),
    TokenSupply(Address, Amount),
    TokenBalance(Address, Address, Option<Amount>),
    Allowance(Address, (Address, Address), Option<Amount>),
    Routes(RequestId, Option<RequestRoutes>),
    Escrow(RequestId, Option<EscrowRecord>),
    Redeemed([u8; 32]),
}

/// Position of the ledger when a transaction began.
struct Mark {
    core: CoreMark,
    journal: usize,
    burns: usize,
}

fn restore_entry<K: Eq + Hash, V>(map: &mut HashMap<K, V>, key: K, prior: Option<V>) {
    match prior {
        Some(value) => {
            map.insert(key, value);
        }
        None => {
            map.remove(&key);
        }
    }
}

pub struct Ledger {
    core: RequestCore,
    fees: Arc<FeeCollector>,
    vault: Vault,
    routes: HashMap<RequestId, RequestRoutes>,
    escrows: HashMap<RequestId, EscrowRecord>,
    locks: HashSet<RequestId>,
    burns: Vec<BurnRecord>,
    redeemed: HashSet<[u8; 32]>,
    hooks: HashMap<Address, Arc<dyn ReceiveHook>>,
    journal: Vec<Undo>,
    depth: usize,
}

impl Ledger {
    pub fn new(core: RequestCore, fees: Arc<FeeCollector>) -> Self {
        Self {
            core,
            fees,
            vault: Vault::default(),
            routes: HashMap::new(),
            escrows: HashMap::new(),
            locks: HashSet::new(),
            burns: Vec::new(),
            redeemed: HashSet::new(),
            hooks: HashMap::new(),
            journal: Vec::new(),
            depth: 0,
        }
    }

    pub fn core(&self) -> &RequestCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut RequestCore {
        &mut self.core
    }

    pub fn access(&self) -> &Arc<dyn AccessControl> {
        self.core.access()
    }

    pub fn fees(&self) -> &Arc<FeeCollector> {
        &self.fees
    }

    pub fn request(&self, id: &RequestId) -> Result<&Request> {
        self.core.request(id)
    }

    pub fn events(&self) -> &EventLog {
        self.core.events()
    }

    /// Run `f` atomically: on error every change it made is undone.
    ///
    /// Request locks are not journaled: [`Ledger::with_request_lock`]
    /// releases its lock on every exit path.
    pub fn transact<T>(&mut self, f: impl FnOnce(&mut Ledger) -> Result<T>) -> Result<T> {
        let mark = self.begin();
        match f(self) {
            Ok(value) => {
                self.commit();
                Ok(value)
            }
            Err(err) => {
                tracing::debug!(error = %err, "transaction rolled back");
                self.rollback(mark);
                Err(err)
            }
        }
    }

    fn begin(&mut self) -> Mark {
        self.depth += 1;
        Mark {
            core: self.core.begin(),
            journal: self.journal.len(),
            burns: self.burns.len(),
        }
    }

    fn commit(&mut self) {
        self.core.commit();
        self.depth = self.depth.saturating_sub(1);
        if self.depth == 0 {
            self.journal.clear();
        }
    }

    fn rollback(&mut self, mark: Mark) {
        let undone = self.journal.split_off(mark.journal);
        for undo in undone.into_iter().rev() {
            self.undo(undo);
        }
        self.burns.truncate(mark.burns);
        self.core.rollback(mark.core);
        self.depth = self.depth.saturating_sub(1);
    }

    fn undo(&mut self, undo: Undo) {
        match undo {
            Undo::NativeBalance(owner, prior) => restore_entry(&mut self.vault.native, owner, prior),
            Undo::NativeSupply(supply) => self.vault.native_supply = supply,
            Undo::TokenIssued(token) => {
                self.vault.tokens.remove(&token);
            }
            Undo::TokenSupply(token, supply) => {
                if let Some(book) = self.vault.tokens.get_mut(&token) {
                    book.supply = supply;
                }
            }
            Undo::TokenBalance(token, owner, prior) => {
                if let Some(book) = self.vault.tokens.get_mut(&token) {
                    restore_entry(&mut book.balances, owner, prior);
                }
            }
            Undo::Allowance(token, key, prior) => {
                if let Some(book) = self.vault.tokens.get_mut(&token) {
                    restore_entry(&mut book.allowances, key, prior);
                }
            }
            Undo::Routes(id, prior) => restore_entry(&mut self.routes, id, prior),
            Undo::Escrow(id, prior) => restore_entry(&mut self.escrows, id, prior),
            Undo::Redeemed(hash) => {
                self.redeemed.remove(&hash);
            }
        }
    }

    fn record(&mut self, undo: Undo) {
        if self.depth > 0 {
            self.journal.push(undo);
        }
    }

    /// Undo entries held for the open transactions.
    pub fn pending_undo(&self) -> usize {
        self.journal.len() + self.core.journal_len()
    }

    /// Run `f` while holding the lock on `id`. A second attempt to take the
    /// same lock, typically from a receive hook, fails with `RequestLocked`.
    pub fn with_request_lock<T>(
        &mut self,
        id: &RequestId,
        f: impl FnOnce(&mut Ledger) -> Result<T>,
    ) -> Result<T> {
        if !self.locks.insert(*id) {
            tracing::warn!(%id, "re-entrant call on locked request");
            return Err(LedgerError::RequestLocked(*id));
        }
        let result = f(self);
        self.locks.remove(id);
        result
    }

    pub fn is_locked(&self, id: &RequestId) -> bool {
        self.locks.contains(id)
    }

    // Hooks

    /// Attach a receive hook to `address`, replacing any previous one.
    pub fn register_hook(&mut self, address: Address, hook: Arc<dyn ReceiveHook>) {
        self.hooks.insert(address, hook);
    }

    pub fn unregister_hook(&mut self, address: &Address) -> Option<Arc<dyn ReceiveHook>> {
        self.hooks.remove(address)
    }

    fn notify(&mut self, to: Address, from: Address, asset: &AssetId, amount: Amount) -> Result<()> {
        if let Some(hook) = self.hooks.get(&to).cloned() {
            hook.on_receive(self, from, asset, amount)?;
        }
        Ok(())
    }

    // Routes

    pub fn routes(&self, id: &RequestId) -> Option<&RequestRoutes> {
        self.routes.get(id)
    }

    pub(crate) fn set_routes(&mut self, id: RequestId, routes: RequestRoutes) {
        let prior = self.routes.insert(id, routes);
        self.record(Undo::Routes(id, prior));
    }

    pub(crate) fn routes_mut(&mut self, id: &RequestId) -> &mut RequestRoutes {
        let prior = self.routes.get(id).cloned();
        self.record(Undo::Routes(*id, prior));
        self.routes.entry(*id).or_default()
    }

    // Escrow

    pub fn escrow(&self, id: &RequestId) -> Option<&EscrowRecord> {
        self.escrows.get(id)
    }

    pub(crate) fn set_escrow(&mut self, id: RequestId, record: EscrowRecord) {
        let prior = self.escrows.insert(id, record);
        self.record(Undo::Escrow(id, prior));
    }

    // Native asset

    pub fn native_balance(&self, owner: &Address) -> Amount {
        self.vault.native_balance(owner)
    }

    pub fn native_supply(&self) -> Amount {
        self.vault.native_supply
    }

    /// Create native value. Administrator only.
    pub fn mint_native(&mut self, caller: &Address, to: Address, amount: Amount) -> Result<()> {
        self.access().require_admin(caller)?;
        if amount.is_negative() {
            return Err(LedgerError::invalid_input("amount", "must not be negative"));
        }
        let supply = self.vault.native_supply.add_or_overflow(amount, "native supply")?;
        self.set_native_supply(supply);
        self.credit_native(to, amount)
    }

    /// Remove native value held by `owner` from circulation.
    pub(crate) fn burn_native(&mut self, owner: &Address, amount: Amount) -> Result<()> {
        self.debit_native(owner, amount)?;
        let supply = self.vault.native_supply.sub_or_overflow(amount, "native supply")?;
        self.set_native_supply(supply);
        Ok(())
    }

    fn set_native_supply(&mut self, supply: Amount) {
        let prior = std::mem::replace(&mut self.vault.native_supply, supply);
        self.record(Undo::NativeSupply(prior));
    }

    fn set_native(&mut self, owner: Address, amount: Amount) {
        let prior = self.vault.native.insert(owner, amount);
        self.record(Undo::NativeBalance(owner, prior));
    }

    fn debit_native(&mut self, owner: &Address, amount: Amount) -> Result<()> {
        let available = self.vault.native_balance(owner);
        if available < amount {
            return Err(LedgerError::InsufficientFunds {
                owner: *owner,
                required: amount,
                available,
            });
        }
        self.set_native(*owner, available.sub_or_overflow(amount, "native balance")?);
        Ok(())
    }

    fn credit_native(&mut self, owner: Address, amount: Amount) -> Result<()> {
        let balance = self
            .vault
            .native_balance(&owner)
            .add_or_overflow(amount, "native balance")?;
        self.set_native(owner, balance);
        Ok(())
    }

    /// Move native value and run the recipient's hook.
    pub fn transfer_native(&mut self, from: Address, to: Address, amount: Amount) -> Result<()> {
        if amount.is_negative() {
            return Err(LedgerError::invalid_input("amount", "must not be negative"));
        }
        if amount.is_zero() {
            return Ok(());
        }
        self.debit_native(&from, amount)?;
        self.credit_native(to, amount)?;
        tracing::trace!(%from, %to, %amount, "native transfer");
        self.notify(to, from, &AssetId::Native, amount)
    }

    /// Take the value attached to a call into `account`.
    ///
    /// Attached value moves before any logic runs; if the call fails, the
    /// surrounding transaction returns it.
    pub(crate) fn collect_attached(&mut self, ctx: &CallContext, account: Address) -> Result<()> {
        if ctx.value.is_negative() {
            return Err(LedgerError::invalid_input("value", "must not be negative"));
        }
        if ctx.value.is_zero() {
            return Ok(());
        }
        self.debit_native(&ctx.sender, ctx.value)?;
        self.credit_native(account, ctx.value)
    }

    // Tokens

    /// Register a new fungible token owned by the administrator.
    pub fn issue_token(&mut self, caller: &Address, symbol: &str) -> Result<Address> {
        self.access().require_admin(caller)?;
        let token = Address::from_label(&format!("token/{symbol}"));
        if self.vault.tokens.contains_key(&token) {
            return Err(LedgerError::invalid_input("symbol", format!("{symbol} already issued")));
        }
        self.vault.tokens.insert(
            token,
            TokenBook {
                symbol: symbol.to_string(),
                ..TokenBook::default()
            },
        );
        self.record(Undo::TokenIssued(token));
        Ok(token)
    }

    pub fn token_symbol(&self, token: &Address) -> Option<&str> {
        self.vault.tokens.get(token).map(|b| b.symbol.as_str())
    }

    fn token_book(&mut self, token: &Address) -> Result<&mut TokenBook> {
        self.vault
            .tokens
            .get_mut(token)
            .ok_or_else(|| LedgerError::invalid_input("token", format!("unknown token {token}")))
    }

    pub fn mint_token(
        &mut self,
        caller: &Address,
        token: &Address,
        to: Address,
        amount: Amount,
    ) -> Result<()> {
        self.access().require_admin(caller)?;
        if amount.is_negative() {
            return Err(LedgerError::invalid_input("amount", "must not be negative"));
        }
        let book = self.token_book(token)?;
        let supply = book.supply.add_or_overflow(amount, "token supply")?;
        let prior = std::mem::replace(&mut book.supply, supply);
        self.record(Undo::TokenSupply(*token, prior));
        let balance = self
            .token_balance(token, &to)
            .add_or_overflow(amount, "token balance")?;
        self.set_token_balance(token, to, balance)
    }

    pub fn token_balance(&self, token: &Address, owner: &Address) -> Amount {
        self.vault
            .tokens
            .get(token)
            .and_then(|b| b.balances.get(owner).copied())
            .unwrap_or_default()
    }

    pub fn token_supply(&self, token: &Address) -> Amount {
        self.vault
            .tokens
            .get(token)
            .map(|b| b.supply)
            .unwrap_or_default()
    }

    pub fn allowance(&self, token: &Address, owner: &Address, spender: &Address) -> Amount {
        self.vault
            .tokens
            .get(token)
            .and_then(|b| b.allowances.get(&(*owner, *spender)).copied())
            .unwrap_or_default()
    }

    /// Let `spender` move up to `amount` of the sender's tokens.
    pub fn approve(
        &mut self,
        ctx: &CallContext,
        token: &Address,
        spender: Address,
        amount: Amount,
    ) -> Result<()> {
        if amount.is_negative() {
            return Err(LedgerError::invalid_input("allowance", "must not be negative"));
        }
        self.set_allowance(token, (ctx.sender, spender), amount)
    }

    /// Move tokens owned by the caller.
    pub fn transfer_token(
        &mut self,
        ctx: &CallContext,
        token: &Address,
        to: Address,
        amount: Amount,
    ) -> Result<()> {
        self.transact(|ledger| ledger.move_tokens(token, ctx.sender, to, amount))
    }

    /// Move tokens on behalf of `from` using the spender's allowance.
    pub fn transfer_token_from(
        &mut self,
        spender: Address,
        token: &Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        self.token_book(token)?;
        let allowed = self.allowance(token, &from, &spender);
        if allowed < amount {
            return Err(LedgerError::InsufficientAllowance {
                owner: from,
                required: amount,
                available: allowed,
            });
        }
        self.set_allowance(token, (from, spender), allowed.sub_or_overflow(amount, "allowance")?)?;
        self.move_tokens(token, from, to, amount)
    }

    fn move_tokens(&mut self, token: &Address, from: Address, to: Address, amount: Amount) -> Result<()> {
        if amount.is_negative() {
            return Err(LedgerError::invalid_input("amount", "must not be negative"));
        }
        if amount.is_zero() {
            return Ok(());
        }
        self.token_book(token)?;
        let available = self.token_balance(token, &from);
        if available < amount {
            return Err(LedgerError::InsufficientFunds {
                owner: from,
                required: amount,
                available,
            });
        }
        self.set_token_balance(token, from, available.sub_or_overflow(amount, "token balance")?)?;
        let balance = self
            .token_balance(token, &to)
            .add_or_overflow(amount, "token balance")?;
        self.set_token_balance(token, to, balance)?;
        self.notify(to, from, &AssetId::Token(*token), amount)
    }

    fn set_token_balance(&mut self, token: &Address, owner: Address, amount: Amount) -> Result<()> {
        let prior = self.token_book(token)?.balances.insert(owner, amount);
        self.record(Undo::TokenBalance(*token, owner, prior));
        Ok(())
    }

    fn set_allowance(&mut self, token: &Address, key: (Address, Address), amount: Amount) -> Result<()> {
        let prior = self.token_book(token)?.allowances.insert(key, amount);
        self.record(Undo::Allowance(*token, key, prior));
        Ok(())
    }

    /// Remember a signed-request hash. False if it was seen before.
    pub(crate) fn mark_redeemed(&mut self, request_hash: [u8; 32]) -> bool {
        let fresh = self.redeemed.insert(request_hash);
        if fresh {
            self.record(Undo::Redeemed(request_hash));
        }
        fresh
    }

    pub fn is_redeemed(&self, request_hash: &[u8; 32]) -> bool {
        self.redeemed.contains(request_hash)
    }

    // Burns

    pub(crate) fn record_burn(&mut self, record: BurnRecord) {
        self.burns.push(record);
    }

    pub fn burns(&self) -> &[BurnRecord] {
        &self.burns
    }
}
