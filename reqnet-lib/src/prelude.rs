//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use reqnet_lib::prelude::*;
//! ```
//!
//! ## What's Included
//!
//! - Core types: `Address`, `Amount`, `RequestId`, `Request`, `RequestState`, `Route`
//! - Error types: `LedgerError`, `LedgerErrorCode`, `ErrorKind`, `Result`
//! - Ledger: `Ledger`, `CallContext`, `Deployment`, `LedgerConfig`
//! - Extensions and their traits
//! - Signing: `RequestTerms`, `SignedRequest`, `SigningIdentity`

// Core types
pub use crate::types::{Address, AssetId, PayeeSlot, Request, RequestId, RequestState, Route};
pub use crate::Amount;

// Error handling
pub use crate::errors::{ErrorKind, LedgerError, LedgerErrorCode};
pub use crate::Result;

// Ledger
pub use crate::config::{Deployment, LedgerConfig};
pub use crate::events::LedgerEvent;
pub use crate::ledger::{CallContext, Ledger, ReceiveHook};

// Extensions
pub use crate::extensions::{
    CurrencyExtension, EscrowExtension, EscrowRecord, EscrowState, ExternalExtension,
    NativeExtension, PayeeCreation, PayerCreation, SettlingExtension, TokenExtension,
};

// Administration
pub use crate::access::{AccessControl, AccessRegistry};
pub use crate::fees::{ConversionRate, FeeCollector, FeeSchedule};

// Signing
pub use crate::signing::{RequestTerms, SignedRequest, SigningIdentity};
