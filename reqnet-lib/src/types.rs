//! Core value types: addresses, request ids, payee slots and routes.

use crate::{Amount, LedgerError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// 20-byte party identifier.
///
/// Accounts derive theirs from an ed25519 public key; ledger components
/// (core, extensions, fee sink) derive theirs from a label.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const LEN: usize = 20;

    /// The unset address.
    pub const ZERO: Address = Address([0u8; 20]);

    /// First 20 bytes of SHA-256 over the public key.
    pub fn from_public_key(public_key: &[u8; 32]) -> Self {
        Self::truncate(&Sha256::digest(public_key))
    }

    /// Deterministic address for a named ledger component.
    ///
    /// ```rust
    /// use reqnet_lib::Address;
    /// assert_eq!(Address::from_label("core"), Address::from_label("core"));
    /// assert_ne!(Address::from_label("core"), Address::from_label("native"));
    /// ```
    pub fn from_label(label: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"reqnet:");
        hasher.update(label.as_bytes());
        Self::truncate(&hasher.finalize())
    }

    fn truncate(digest: &[u8]) -> Self {
        let mut out = [0u8; 20];
        out.copy_from_slice(&digest[..20]);
        Self(out)
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Fail with a validation error if the address is unset.
    pub fn require_nonzero(self, what: &'static str) -> Result<Self> {
        if self.is_zero() {
            Err(LedgerError::ZeroAddress(what))
        } else {
            Ok(self)
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(raw)
            .map_err(|e| LedgerError::invalid_input("address", format!("{s:?}: {e}")))?;
        let arr: [u8; 20] = bytes.try_into().map_err(|_| {
            LedgerError::invalid_input("address", format!("{s:?}: expected 20 bytes"))
        })?;
        Ok(Self(arr))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.collect_str(self)
        } else {
            // Fixed-width tuple, no length prefix.
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(serde::de::Error::custom)
        } else {
            <[u8; 20]>::deserialize(deserializer).map(Self)
        }
    }
}

/// Globally unique request identifier: the core's address followed by a
/// 12-byte big-endian counter.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId {
    core: Address,
    counter: u128,
}

impl RequestId {
    /// Largest counter that fits the 12-byte field.
    pub const MAX_COUNTER: u128 = (1u128 << 96) - 1;

    pub fn new(core: Address, counter: u128) -> Result<Self> {
        if counter > Self::MAX_COUNTER {
            return Err(LedgerError::Overflow("request counter"));
        }
        Ok(Self { core, counter })
    }

    pub fn core(&self) -> Address {
        self.core
    }

    pub fn counter(&self) -> u128 {
        self.counter
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out[..20].copy_from_slice(&self.core.0);
        out[20..].copy_from_slice(&self.counter.to_be_bytes()[4..]);
        out
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:024x}", self.core, self.counter)
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({self})")
    }
}

impl FromStr for RequestId {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        if raw.len() != 64 || !raw.is_char_boundary(40) {
            return Err(LedgerError::invalid_input(
                "request id",
                format!("{s:?}: expected 64 hex digits"),
            ));
        }
        let (core, counter) = raw.split_at(40);
        let counter = u128::from_str_radix(counter, 16)
            .map_err(|e| LedgerError::invalid_input("request id", e.to_string()))?;
        Self::new(core.parse()?, counter)
    }
}

impl Serialize for RequestId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Lifecycle state of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Created,
    Accepted,
    Canceled,
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestState::Created => "created",
            RequestState::Accepted => "accepted",
            RequestState::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

/// Which payee of a request an amount applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayeeSlot {
    Primary,
    /// Zero-based position in the sub payee list.
    SubPayee(usize),
}

impl PayeeSlot {
    /// Resolve a flat index (0 = primary) against a request with `count`
    /// payees in total.
    pub fn from_index(index: usize, count: usize) -> Result<Self> {
        if index >= count {
            return Err(LedgerError::IndexOutOfRange { index, count });
        }
        Ok(match index {
            0 => PayeeSlot::Primary,
            n => PayeeSlot::SubPayee(n - 1),
        })
    }

    /// Flat index as used in events (0 = primary).
    pub fn index(&self) -> usize {
        match self {
            PayeeSlot::Primary => 0,
            PayeeSlot::SubPayee(n) => n + 1,
        }
    }
}

/// Destination for value movement, distinct from the identity address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// An account on this ledger.
    Account(Address),
    /// An address on an externally validated network, kept opaque.
    External(String),
}

impl Route {
    pub fn account(&self) -> Option<Address> {
        match self {
            Route::Account(addr) => Some(*addr),
            Route::External(_) => None,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Account(addr) => write!(f, "{addr}"),
            Route::External(s) => write!(f, "external:{s}"),
        }
    }
}

/// Asset family an extension moves.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AssetId {
    Native,
    Token(Address),
    External(String),
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetId::Native => f.write_str("native"),
            AssetId::Token(addr) => write!(f, "token:{addr}"),
            AssetId::External(code) => write!(f, "external:{code}"),
        }
    }
}

impl FromStr for AssetId {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        if s == "native" {
            return Ok(AssetId::Native);
        }
        if let Some(addr) = s.strip_prefix("token:") {
            return Ok(AssetId::Token(addr.parse()?));
        }
        if let Some(code) = s.strip_prefix("external:") {
            if !code.is_empty() {
                return Ok(AssetId::External(code.to_string()));
            }
        }
        Err(LedgerError::invalid_input("asset", format!("{s:?}")))
    }
}

impl Serialize for AssetId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AssetId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One beneficiary of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payee {
    pub address: Address,
    pub expected_amount: Amount,
    pub balance: Amount,
}

impl Payee {
    pub fn new(address: Address, expected_amount: Amount) -> Self {
        Self {
            address,
            expected_amount,
            balance: Amount::ZERO,
        }
    }

    /// Expected amount not yet covered by the balance.
    pub fn unmet(&self) -> Result<Amount> {
        self.expected_amount
            .sub_or_overflow(self.balance, "unmet amount")
    }
}

/// A payment obligation recorded by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub creator: Address,
    pub payer: Address,
    /// Extension that owns this request.
    pub currency_contract: Address,
    pub state: RequestState,
    pub payee: Payee,
    pub sub_payees: Vec<Payee>,
    pub data: String,
}

impl Request {
    /// Total number of payees, primary included.
    pub fn payee_count(&self) -> usize {
        1 + self.sub_payees.len()
    }

    pub fn slot(&self, index: usize) -> Result<PayeeSlot> {
        PayeeSlot::from_index(index, self.payee_count())
    }

    pub fn payee(&self, slot: PayeeSlot) -> Result<&Payee> {
        match slot {
            PayeeSlot::Primary => Ok(&self.payee),
            PayeeSlot::SubPayee(n) => {
                self.sub_payees
                    .get(n)
                    .ok_or(LedgerError::IndexOutOfRange {
                        index: slot.index(),
                        count: self.payee_count(),
                    })
            }
        }
    }

    pub(crate) fn payee_mut(&mut self, slot: PayeeSlot) -> Result<&mut Payee> {
        let count = self.payee_count();
        match slot {
            PayeeSlot::Primary => Ok(&mut self.payee),
            PayeeSlot::SubPayee(n) => {
                self.sub_payees
                    .get_mut(n)
                    .ok_or(LedgerError::IndexOutOfRange {
                        index: slot.index(),
                        count,
                    })
            }
        }
    }

    /// Iterate payees in slot order.
    pub fn payees(&self) -> impl Iterator<Item = (PayeeSlot, &Payee)> {
        std::iter::once((PayeeSlot::Primary, &self.payee)).chain(
            self.sub_payees
                .iter()
                .enumerate()
                .map(|(n, p)| (PayeeSlot::SubPayee(n), p)),
        )
    }

    /// Slot whose identity address is `address`, if any.
    pub fn slot_of(&self, address: &Address) -> Option<PayeeSlot> {
        self.payees()
            .find(|(_, p)| p.address == *address)
            .map(|(slot, _)| slot)
    }

    pub fn are_all_balances_null(&self) -> bool {
        self.payees().all(|(_, p)| p.balance.is_zero())
    }
}
