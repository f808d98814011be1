//! Canonical encoding of signed request terms (version 1).
//!
//! The byte layout is the wire contract between signer and verifier. It is
//! bincode with fixed-width integers in big-endian order over
//! [`CanonicalTerms`], field by field:
//!
//! | field            | bytes                                                   |
//! |------------------|---------------------------------------------------------|
//! | domain           | u64 length, then `REQNET_SIGNED_REQUEST`                |
//! | version          | u8 (`1`)                                                |
//! | extension        | 20                                                      |
//! | payer            | `00`, or `01` and 20                                    |
//! | payees           | u64 count, then 20 each                                 |
//! | expected amounts | u64 count, then i128 each                               |
//! | payee routes     | u64 count, then `00` or `01` + u32 variant + route body |
//! | data             | u64 length, then UTF-8                                  |
//! | expires_at       | i64                                                     |
//!
//! Route bodies: variant 0 (account) is 20 bytes, variant 1 (external) is a
//! u64 length followed by UTF-8.

use crate::types::Route;
use crate::{Address, Amount, Result};
use bincode::Options;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Domain separation constant for signed requests
pub const SIGNED_REQUEST_DOMAIN: &[u8] = b"REQNET_SIGNED_REQUEST";

pub const CANONICAL_VERSION: u8 = 1;

/// Prefix that marks a digest as a request authorization.
pub const MESSAGE_PREFIX: &[u8] = b"\x19ReqNet Signed Request:\n32";

/// Terms a payee commits to when signing a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestTerms {
    /// Extension the request must be broadcast to.
    pub extension: Address,
    /// Payer allowed to redeem, or anyone when unset.
    pub payer: Option<Address>,
    pub payees: Vec<Address>,
    pub expected_amounts: Vec<Amount>,
    /// At most one route per payee, in payee order.
    #[serde(default)]
    pub payee_routes: Vec<Option<Route>>,
    #[serde(default)]
    pub data: String,
    /// Unix seconds after which the authorization is void.
    pub expires_at: i64,
}

#[derive(Serialize)]
struct CanonicalTerms<'a> {
    domain: &'static [u8],
    version: u8,
    extension: &'a Address,
    payer: &'a Option<Address>,
    payees: &'a [Address],
    expected_amounts: Vec<i128>,
    payee_routes: &'a [Option<Route>],
    data: &'a str,
    expires_at: i64,
}

impl RequestTerms {
    /// Canonical bytes of these terms.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        let canonical = CanonicalTerms {
            domain: SIGNED_REQUEST_DOMAIN,
            version: CANONICAL_VERSION,
            extension: &self.extension,
            payer: &self.payer,
            payees: &self.payees,
            expected_amounts: self.expected_amounts.iter().map(Amount::value).collect(),
            payee_routes: &self.payee_routes,
            data: &self.data,
            expires_at: self.expires_at,
        };
        let bytes = bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .with_big_endian()
            .serialize(&canonical)?;
        Ok(bytes)
    }

    /// SHA-256 of the canonical bytes.
    pub fn request_hash(&self) -> Result<[u8; 32]> {
        let bytes = self.canonical_bytes()?;
        Ok(Sha256::digest(&bytes).into())
    }

    /// Digest the payee actually signs.
    pub fn signing_digest(&self) -> Result<[u8; 32]> {
        Ok(wrap_message(&self.request_hash()?))
    }
}

/// `SHA-256(MESSAGE_PREFIX || request_hash)`.
pub fn wrap_message(request_hash: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(MESSAGE_PREFIX);
    hasher.update(request_hash);
    hasher.finalize().into()
}
