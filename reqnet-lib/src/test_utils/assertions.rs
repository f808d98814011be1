//! Assertion helpers for ledger state.

use crate::errors::ErrorKind;
use crate::ledger::Ledger;
use crate::types::RequestId;
use crate::Result;

/// Assert the balance of every payee slot, in slot order.
///
/// # Panics
/// Panics if the request is unknown or a balance differs.
pub fn assert_balances(ledger: &Ledger, id: &RequestId, expected: &[i128]) {
    let request = ledger.request(id).expect("request exists");
    let actual: Vec<i128> = request.payees().map(|(_, p)| p.balance.value()).collect();
    assert_eq!(actual, expected, "balances of {id}");
}

/// Assert the expected amount of every payee slot, in slot order.
///
/// # Panics
/// Panics if the request is unknown or an expected amount differs.
pub fn assert_expected(ledger: &Ledger, id: &RequestId, expected: &[i128]) {
    let request = ledger.request(id).expect("request exists");
    let actual: Vec<i128> = request
        .payees()
        .map(|(_, p)| p.expected_amount.value())
        .collect();
    assert_eq!(actual, expected, "expected amounts of {id}");
}

/// Assert the names of events emitted since `from`.
pub fn assert_event_names(ledger: &Ledger, from: usize, expected: &[&str]) {
    let names: Vec<&str> = ledger.events().since(from).iter().map(|e| e.name()).collect();
    assert_eq!(names, expected);
}

/// Assert that `result` failed with an error of `kind`.
///
/// # Panics
/// Panics if the result is Ok or the error has another kind.
pub fn assert_error_kind<T: std::fmt::Debug>(result: Result<T>, kind: ErrorKind) {
    match result {
        Ok(value) => panic!("expected a {kind:?} error, got Ok({value:?})"),
        Err(err) => assert_eq!(err.kind(), kind, "unexpected error: {err}"),
    }
}
