//! Property-based tests for the request ledger.
//!
//! These tests use proptest to check bookkeeping invariants over random
//! operation sequences.

#[cfg(test)]
mod ledger_properties {
    use proptest::prelude::*;
    use reqnet_lib::prelude::*;
    use reqnet_lib::test_utils::{ctx, TestLedger};

    #[derive(Debug, Clone)]
    enum Op {
        Pay(usize, i128),
        Refund(usize, i128),
        Additional(usize, i128),
        Subtract(usize, i128),
        Accept,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..3, 0i128..500).prop_map(|(i, a)| Op::Pay(i, a)),
            (0usize..3, 0i128..500).prop_map(|(i, a)| Op::Refund(i, a)),
            (0usize..3, 0i128..500).prop_map(|(i, a)| Op::Additional(i, a)),
            (0usize..3, 0i128..500).prop_map(|(i, a)| Op::Subtract(i, a)),
            Just(Op::Accept),
        ]
    }

    fn at(index: usize, amount: i128) -> Vec<Amount> {
        let mut list = vec![Amount::ZERO; index + 1];
        list[index] = Amount::new(amount);
        list
    }

    proptest! {
        /// Balance of every slot equals payments minus refunds, whatever
        /// mix of operations succeeds or fails.
        #[test]
        fn balance_tracks_payments_minus_refunds(
            expected in prop::collection::vec(0i128..1_000, 3),
            ops in prop::collection::vec(op(), 1..40),
        ) {
            let mut t = TestLedger::new();
            let expected: Vec<Amount> = expected.into_iter().map(Amount::new).collect();
            let id = t.create_native(&expected);
            let payees = t.payees(3);
            let mut paid = [0i128; 3];
            let mut refunded = [0i128; 3];

            for op in ops {
                match op {
                    Op::Pay(i, a) => {
                        let result = t.native.pay(&mut t.ledger, &ctx(t.payer).with_value(a), &id, &at(i, a), &[]);
                        if result.is_ok() {
                            paid[i] += a;
                        }
                    }
                    Op::Refund(i, a) => {
                        let result = t.native.refund(&mut t.ledger, &ctx(payees[i]).with_value(a), &id, Amount::new(a));
                        if result.is_ok() {
                            refunded[i] += a;
                        } else {
                            prop_assert!(a > paid[i] - refunded[i]);
                        }
                    }
                    Op::Additional(i, a) => {
                        let _ = t.native.additional(&mut t.ledger, &ctx(t.payer), &id, &at(i, a));
                    }
                    Op::Subtract(i, a) => {
                        let _ = t.native.subtract(&mut t.ledger, &ctx(t.payee), &id, &at(i, a));
                    }
                    Op::Accept => {
                        t.native.accept(&mut t.ledger, &ctx(t.payer), &id).unwrap();
                    }
                }
            }

            let request = t.ledger.request(&id).unwrap();
            for (slot, payee) in request.payees() {
                let i = slot.index();
                prop_assert_eq!(payee.balance, Amount::new(paid[i] - refunded[i]));
                prop_assert!(!payee.balance.is_negative());
            }
        }

        /// Subtract never drives a slot's expected amount below its balance.
        #[test]
        fn subtract_never_exceeds_unmet(
            expected in 0i128..1_000,
            payment in 0i128..1_000,
            cut in 0i128..2_000,
        ) {
            let mut t = TestLedger::new();
            let id = t.create_native(&[Amount::new(expected)]);
            let _ = t.native.pay(&mut t.ledger, &ctx(t.payer).with_value(payment), &id, &[Amount::new(payment)], &[]);
            let before = t.ledger.request(&id).unwrap().payee.clone();
            let unmet = before.unmet().unwrap();

            let result = t.native.subtract(&mut t.ledger, &ctx(t.payee), &id, &[Amount::new(cut)]);
            let after = &t.ledger.request(&id).unwrap().payee;

            if Amount::new(cut) <= unmet {
                prop_assert!(result.is_ok());
                prop_assert_eq!(after.expected_amount.value(), expected - cut);
            } else {
                prop_assert!(result.is_err());
                prop_assert_eq!(after, &before);
            }
        }

        /// Accepting twice leaves the same state as accepting once.
        #[test]
        fn accept_is_idempotent(
            expected in prop::collection::vec(-1_000i128..1_000, 1..4),
            payment in 0i128..100,
        ) {
            let mut t = TestLedger::new();
            let expected: Vec<Amount> = expected.into_iter().map(Amount::new).collect();
            let id = t.create_native(&expected);
            t.native.pay(&mut t.ledger, &ctx(t.payer).with_value(payment), &id, &[Amount::new(payment)], &[]).unwrap();

            t.native.accept(&mut t.ledger, &ctx(t.payer), &id).unwrap();
            let once = t.ledger.request(&id).unwrap().clone();
            let events = t.ledger.events().clone();

            t.native.accept(&mut t.ledger, &ctx(t.payer), &id).unwrap();
            prop_assert_eq!(t.ledger.request(&id).unwrap(), &once);
            prop_assert_eq!(t.ledger.events(), &events);
        }

        /// Changing any signed field invalidates the signature.
        #[test]
        fn tampered_amounts_fail_verification(
            amount in 0i128..1_000_000,
            delta in 1i128..1_000,
        ) {
            let t = TestLedger::new();
            let signed = t.sign(&t.native, &[Amount::new(amount)]);
            prop_assert!(signed.verify(reqnet_lib::test_utils::NOW).is_ok());

            let mut tampered = signed.clone();
            tampered.terms.expected_amounts[0] = Amount::new(amount + delta);
            prop_assert_eq!(
                tampered.verify(reqnet_lib::test_utils::NOW),
                Err(LedgerError::SignatureMismatch)
            );
        }

        /// Fees never exceed the cap and never go negative.
        #[test]
        fn fee_estimate_is_bounded(
            numerator in 0i128..1_000,
            denominator in 1i128..1_000,
            max in 0i128..10_000,
            principal in -1_000_000i128..1_000_000,
        ) {
            let schedule = FeeSchedule::new(numerator, denominator, max).unwrap();
            let fee = schedule.estimate(Amount::new(principal)).unwrap();
            prop_assert!(!fee.is_negative());
            prop_assert!(fee <= Amount::new(max));
            if principal < 0 {
                prop_assert_eq!(fee, Amount::ZERO);
            }
        }
    }
}
