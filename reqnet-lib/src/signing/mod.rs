//! # Signed-Request Protocol
//!
//! Lets a payee commit to request terms off-ledger so that a payer can create
//! and fund the request in one atomic call.
//!
//! - Deterministic hashing over a versioned canonical encoding ([`canonical`])
//! - Domain separation, plus a message prefix so an authorization can never
//!   be mistaken for raw transaction bytes
//! - Expiry checked before signature validity
//!
//! The redeeming side lives on the extensions
//! (`broadcast_signed_request`), which verify the payload with
//! [`SignedRequest::verify`] before touching the ledger.

pub mod canonical;
pub mod keys;
pub mod payload;

pub use canonical::{
    wrap_message, RequestTerms, CANONICAL_VERSION, MESSAGE_PREFIX, SIGNED_REQUEST_DOMAIN,
};
pub use keys::SigningIdentity;
pub use payload::{SignedRequest, TRANSPORT_PREFIX};
