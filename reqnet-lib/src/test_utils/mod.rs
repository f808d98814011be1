//! Test utilities for the ledger.
//!
//! - A deployed ledger with funded payer and payee accounts
//! - Signing fixtures with a fixed payee key
//! - Assertion helpers for events, balances and error kinds
//!
//! ## Usage
//!
//! ```rust,ignore
//! use reqnet_lib::test_utils::{ctx, TestLedger};
//!
//! let mut t = TestLedger::new();
//! let id = t.create_native(&[Amount::new(100), Amount::new(20)]);
//! t.native.pay(&mut t.ledger, &ctx(t.payer).with_value(8), &id, &[5.into(), 3.into()], &[])?;
//! assert_balances(&t.ledger, &id, &[5, 3]);
//! ```

mod assertions;
mod fixtures;

pub use assertions::{assert_balances, assert_error_kind, assert_event_names, assert_expected};
pub use fixtures::{ctx, ctx_at, TestLedger, FUNDING, NOW, PAYEE_SECRET};
