//! Receive hooks that call back into the ledger during a transfer.

use reqnet_lib::prelude::*;
use reqnet_lib::test_utils::{assert_balances, ctx, TestLedger};
use std::sync::{Arc, Mutex};

/// Hook at a payee address that tries to pull value back out of the request
/// it is being paid from.
struct RefundOnReceive {
    native: NativeExtension,
    me: Address,
    target: Mutex<Option<RequestId>>,
    outcome: Mutex<Option<Result<()>>>,
}

impl ReceiveHook for RefundOnReceive {
    fn on_receive(&self, ledger: &mut Ledger, _from: Address, _asset: &AssetId, amount: Amount) -> Result<()> {
        let Some(id) = *self.target.lock().unwrap() else {
            return Ok(());
        };
        let result = self
            .native
            .refund(ledger, &ctx(self.me).with_value(amount), &id, amount);
        *self.outcome.lock().unwrap() = Some(result);
        Ok(())
    }
}

/// Hook that tries to pay the same request again.
struct PayOnReceive {
    native: NativeExtension,
    me: Address,
    target: Mutex<Option<RequestId>>,
    outcome: Mutex<Option<Result<()>>>,
}

impl ReceiveHook for PayOnReceive {
    fn on_receive(&self, ledger: &mut Ledger, _from: Address, _asset: &AssetId, _amount: Amount) -> Result<()> {
        let Some(id) = *self.target.lock().unwrap() else {
            return Ok(());
        };
        let result = self
            .native
            .pay(ledger, &ctx(self.me).with_value(1), &id, &[Amount::new(1)], &[]);
        *self.outcome.lock().unwrap() = Some(result);
        Ok(())
    }
}

struct Refuse;

impl ReceiveHook for Refuse {
    fn on_receive(&self, _: &mut Ledger, _: Address, _: &AssetId, _: Amount) -> Result<()> {
        Err(LedgerError::invalid_input("recipient", "refuses payments"))
    }
}

#[test]
fn refund_reentry_during_payment_is_locked_out() {
    let mut t = TestLedger::new();
    let id = t.create_native(&[Amount::new(100)]);
    let hook = Arc::new(RefundOnReceive {
        native: t.native,
        me: t.payee,
        target: Mutex::new(Some(id)),
        outcome: Mutex::new(None),
    });
    t.ledger.register_hook(t.payee, hook.clone());

    t.native
        .pay(&mut t.ledger, &ctx(t.payer).with_value(40), &id, &[Amount::new(40)], &[])
        .unwrap();

    assert_eq!(
        hook.outcome.lock().unwrap().clone(),
        Some(Err(LedgerError::RequestLocked(id)))
    );
    assert_balances(&t.ledger, &id, &[40]);
    assert!(!t.ledger.is_locked(&id));
}

#[test]
fn pay_reentry_during_refund_is_locked_out() {
    let mut t = TestLedger::new();
    let id = t.create_native(&[Amount::new(100)]);
    t.native
        .pay(&mut t.ledger, &ctx(t.payer).with_value(40), &id, &[Amount::new(40)], &[])
        .unwrap();

    let hook = Arc::new(PayOnReceive {
        native: t.native,
        me: t.payer,
        target: Mutex::new(Some(id)),
        outcome: Mutex::new(None),
    });
    t.ledger.register_hook(t.payer, hook.clone());

    t.native
        .refund(&mut t.ledger, &ctx(t.payee).with_value(10), &id, Amount::new(10))
        .unwrap();

    assert_eq!(
        hook.outcome.lock().unwrap().clone(),
        Some(Err(LedgerError::RequestLocked(id)))
    );
    assert_balances(&t.ledger, &id, &[30]);
}

#[test]
fn reentry_on_another_request_is_allowed() {
    let mut t = TestLedger::new();
    let paid = t.create_native(&[Amount::new(100)]);
    let other = t.create_native(&[Amount::new(100)]);
    t.native
        .pay(&mut t.ledger, &ctx(t.payer).with_value(20), &other, &[Amount::new(20)], &[])
        .unwrap();

    // The payee refunds part of the other request whenever it is paid.
    let hook = Arc::new(RefundOnReceive {
        native: t.native,
        me: t.payee,
        target: Mutex::new(Some(other)),
        outcome: Mutex::new(None),
    });
    t.ledger.register_hook(t.payee, hook.clone());

    t.native
        .pay(&mut t.ledger, &ctx(t.payer).with_value(5), &paid, &[Amount::new(5)], &[])
        .unwrap();

    assert_eq!(hook.outcome.lock().unwrap().clone(), Some(Ok(())));
    assert_balances(&t.ledger, &paid, &[5]);
    assert_balances(&t.ledger, &other, &[15]);
}

#[test]
fn failing_recipient_rolls_back_everything() {
    let mut t = TestLedger::new();
    let sub = t.sub(0);
    let id = t.create_native(&[Amount::new(100), Amount::new(50)]);
    t.ledger.register_hook(sub, Arc::new(Refuse));

    let payer_before = t.ledger.native_balance(&t.payer);
    let payee_before = t.ledger.native_balance(&t.payee);
    let events_before = t.ledger.events().len();

    let err = t
        .native
        .pay(
            &mut t.ledger,
            &ctx(t.payer).with_value(30),
            &id,
            &[Amount::new(10), Amount::new(20)],
            &[Amount::ZERO, Amount::new(5)],
        )
        .unwrap_err();
    assert_eq!(err.code(), LedgerErrorCode::InvalidInput);

    assert_balances(&t.ledger, &id, &[0, 0]);
    assert_eq!(t.ledger.request(&id).unwrap().sub_payees[0].expected_amount, Amount::new(50));
    assert_eq!(t.ledger.native_balance(&t.payer), payer_before);
    assert_eq!(t.ledger.native_balance(&t.payee), payee_before);
    assert_eq!(t.ledger.native_balance(&t.native.address()), Amount::ZERO);
    assert_eq!(t.ledger.events().len(), events_before);
    assert!(!t.ledger.is_locked(&id));
}

#[test]
fn failing_recipient_rolls_back_signed_redemption() {
    let mut t = TestLedger::new();
    let signed = t.sign(&t.native, &[Amount::new(100)]);
    t.ledger.register_hook(t.payee, Arc::new(Refuse));

    let err = t
        .native
        .broadcast_signed_request(&mut t.ledger, &ctx(t.payer).with_value(10), &signed, &[Amount::new(10)], &[])
        .unwrap_err();
    assert_eq!(err.code(), LedgerErrorCode::InvalidInput);
    assert_eq!(t.ledger.core().request_count(), 0);
    assert!(!t.ledger.is_redeemed(&signed.terms.request_hash().unwrap()));
}
