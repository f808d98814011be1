//! ReqNet library.
//!
//! A request lifecycle ledger with pluggable currency extensions and a
//! signed-request protocol that lets a payee authorize a request off-ledger.
//!
//! # Features
//!
//! - **Request Core**: canonical registry of requests, their state machine and
//!   multi-payee balances, mutated only by trusted owning extensions
//! - **Currency Extensions**: native, escrowed native, token and externally
//!   validated assets built on shared lifecycle rules
//! - **Signed Requests**: deterministic canonical hashing, ed25519 signatures
//!   and a compact transport string
//! - **Fees**: capped proportional fees forwarded to a burning sink
//!
//! # Example
//!
//! ```rust
//! use reqnet_lib::prelude::*;
//!
//! let admin = Address::from_label("admin");
//! let mut deployment = Deployment::new(&LedgerConfig::default(), admin).unwrap();
//!
//! let payee = Address::from_label("payee");
//! let payer = Address::from_label("payer");
//! let native = deployment.native;
//! let ctx = CallContext::new(payee, 1_700_000_000);
//!
//! let id = native
//!     .create_request_as_payee(
//!         &mut deployment.ledger,
//!         &ctx,
//!         PayeeCreation::new(vec![payee], vec![Amount::new(100)], payer),
//!     )
//!     .unwrap();
//! assert_eq!(deployment.ledger.request(&id).unwrap().state, RequestState::Created);
//! ```

pub mod access;
pub mod amount;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod extensions;
pub mod fees;
pub mod ledger;
pub mod prelude;
pub mod signing;
pub mod types;

/// Test utilities for ledger testing.
///
/// This module is only available with the `test-utils` feature or in test builds.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use access::{AccessControl, AccessRegistry};
pub use amount::Amount;
pub use config::{Deployment, LedgerConfig};
pub use errors::{ErrorKind, LedgerError, LedgerErrorCode, Role};
pub use events::{EventLog, LedgerEvent};
pub use extensions::{
    CurrencyExtension, EscrowExtension, EscrowRecord, EscrowState, ExternalExtension,
    NativeExtension, PayeeCreation, PayerCreation, SettlingExtension, TokenExtension,
};
pub use fees::{BurnRecord, BurnSink, ConversionRate, FeeCollector, FeeSchedule};
pub use ledger::{CallContext, Ledger, ReceiveHook, RequestRoutes};
pub use signing::{RequestTerms, SignedRequest, SigningIdentity};
pub use types::{Address, AssetId, Payee, PayeeSlot, Request, RequestId, RequestState, Route};

/// Common result alias for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
