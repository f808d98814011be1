//! Signed-request golden vectors and on-ledger redemption.

use reqnet_lib::prelude::*;
use reqnet_lib::signing::wrap_message;
use reqnet_lib::test_utils::{
    assert_balances, assert_error_kind, assert_event_names, ctx, ctx_at, TestLedger, NOW,
    PAYEE_SECRET,
};

mod golden {
    use super::*;

    const PUBLIC_KEY: &str = "ea4a6c63e29c520abef5507b132ec5f9954776aebebe7b92421eea691446d22c";
    const PRIMARY: &str = "0xfe812c12f3ab4ce6ac5db69ac352f906cb1b11ef";
    const EXTENSION: &str = "0x7c9d60951b6a26806cabdd23fa4b96d0c3949ad0";
    const CANONICAL: &str = "00000000000000155245514e45545f5349474e45445f52455155455354017c9d60951b6a26806cabdd23fa4b96d0c3949ad0000000000000000002fe812c12f3ab4ce6ac5db69ac352f906cb1b11ef22222222222222222222222222222222222222220000000000000002000000000000000000000000000003e8000000000000000000000000000000fa00000000000000020100000000333333333333333333333333333333333333333300000000000000000a696e766f6963652d3432000000006553ff10";
    const HASH: &str = "664ce9bb533cc4b0959499f6f5336d581c4ac960536da863202fc5cd003afae4";
    const DIGEST: &str = "20fa5f6bcb254b2fccaa3046bb480060e568b0205047d50c5865117be65fe180";
    const SIGNATURE: &str = "b6b5553497f84adc5a39d158b28cdf5ce6c99e9facbcf569b13b46db2ece0aa2589db048242926c198bd1a6893da9308f12445d6c6b46ecbb7402487a7721506";
    const HASH_WITH_PAYER: &str = "e5c2fae63e0f44d605babd2957e48a9b971f56c250e4ff23e23a70e465f68f63";

    fn terms() -> RequestTerms {
        RequestTerms {
            extension: Address::from_label("native"),
            payer: None,
            payees: vec![PRIMARY.parse().unwrap(), Address([0x22; 20])],
            expected_amounts: vec![Amount::new(1000), Amount::new(250)],
            payee_routes: vec![Some(Route::Account(Address([0x33; 20]))), None],
            data: "invoice-42".into(),
            expires_at: 1_700_003_600,
        }
    }

    #[test]
    fn identity_matches_vector() {
        let identity = SigningIdentity::from_secret_bytes(&PAYEE_SECRET);
        assert_eq!(hex::encode(identity.public_key()), PUBLIC_KEY);
        assert_eq!(identity.address().to_string(), PRIMARY);
        assert_eq!(Address::from_label("native").to_string(), EXTENSION);
    }

    #[test]
    fn canonical_bytes_match_vector() {
        let bytes = terms().canonical_bytes().unwrap();
        assert_eq!(bytes.len(), 199);
        assert_eq!(hex::encode(bytes), CANONICAL);
    }

    #[test]
    fn hashes_match_vector() {
        let hash = terms().request_hash().unwrap();
        assert_eq!(hex::encode(hash), HASH);
        assert_eq!(hex::encode(wrap_message(&hash)), DIGEST);
        assert_eq!(hex::encode(terms().signing_digest().unwrap()), DIGEST);

        let mut restricted = terms();
        restricted.payer = Some(Address([0x44; 20]));
        assert_eq!(hex::encode(restricted.request_hash().unwrap()), HASH_WITH_PAYER);
    }

    #[test]
    fn signature_matches_vector() {
        let identity = SigningIdentity::from_secret_bytes(&PAYEE_SECRET);
        let signed = SignedRequest::sign(terms(), AssetId::Native, &identity).unwrap();
        assert_eq!(hex::encode(signed.signature), SIGNATURE);
        assert!(signed.verify(1_700_003_599).is_ok());
    }

    #[test]
    fn transport_decoding_preserves_hash() {
        let identity = SigningIdentity::from_secret_bytes(&PAYEE_SECRET);
        let signed = SignedRequest::sign(terms(), AssetId::Native, &identity)
            .unwrap()
            .with_refund_route(Route::Account(Address([0x55; 20])));
        let decoded = SignedRequest::from_transport(&signed.to_transport().unwrap()).unwrap();

        assert_eq!(hex::encode(decoded.terms.request_hash().unwrap()), HASH);
        assert_eq!(decoded.refund_route, signed.refund_route);
        assert!(decoded.verify(1_700_000_000).is_ok());
    }
}

#[test]
fn expired_and_tampered_requests_leave_nothing_behind() {
    let mut t = TestLedger::new();
    let signed = t.sign(&t.native, &[Amount::new(1000)]);

    let err = t
        .native
        .broadcast_signed_request(&mut t.ledger, &ctx_at(t.payer, NOW + 3601), &signed, &[], &[])
        .unwrap_err();
    assert!(matches!(err, LedgerError::Expired { .. }));
    assert_eq!(err.kind(), ErrorKind::Protocol);

    let mut tampered = signed.clone();
    tampered.terms.expected_amounts[0] = Amount::new(1);
    let err = t
        .native
        .broadcast_signed_request(&mut t.ledger, &ctx_at(t.payer, NOW + 10), &tampered, &[], &[])
        .unwrap_err();
    assert_eq!(err, LedgerError::SignatureMismatch);

    assert_eq!(t.ledger.core().request_count(), 0);
    assert!(t.ledger.events().is_empty());
    assert!(!t.ledger.is_redeemed(&signed.terms.request_hash().unwrap()));
}

#[test]
fn broadcast_creates_accepts_and_pays_in_one_step() {
    let mut t = TestLedger::new();
    let mut terms = t.terms(t.native.address(), &[Amount::new(1000), Amount::new(100)]);
    terms.data = "order-9".into();
    let signed = t.sign_terms(&t.native, terms);
    let payee_before = t.ledger.native_balance(&t.payee);

    let start = t.ledger.events().len();
    let id = t
        .native
        .broadcast_signed_request(
            &mut t.ledger,
            &ctx(t.payer).with_value(700),
            &signed,
            &[Amount::new(600), Amount::new(100)],
            &[Amount::new(50)],
        )
        .unwrap();

    let request = t.ledger.request(&id).unwrap();
    assert_eq!(request.state, RequestState::Accepted);
    assert_eq!(request.creator, t.payee);
    assert_eq!(request.payer, t.payer);
    assert_eq!(request.payee.expected_amount, Amount::new(1050));
    assert_eq!(request.data, "order-9");
    assert_balances(&t.ledger, &id, &[600, 100]);
    assert_event_names(
        &t.ledger,
        start,
        &[
            "Created",
            "NewSubPayee",
            "Accepted",
            "UpdateExpectedAmount",
            "UpdateBalance",
            "UpdateBalance",
        ],
    );
    assert_eq!(
        t.ledger.native_balance(&t.payee),
        payee_before.add_or_overflow(Amount::new(600), "test").unwrap()
    );
}

#[test]
fn signed_request_redeems_once() {
    let mut t = TestLedger::new();
    let signed = t.sign(&t.native, &[Amount::new(10)]);

    t.native
        .broadcast_signed_request(&mut t.ledger, &ctx(t.payer), &signed, &[], &[])
        .unwrap();
    assert!(t.ledger.is_redeemed(&signed.terms.request_hash().unwrap()));

    let err = t
        .native
        .broadcast_signed_request(&mut t.ledger, &ctx(t.payer), &signed, &[], &[])
        .unwrap_err();
    assert_eq!(err, LedgerError::AlreadyRedeemed);
    assert_eq!(t.ledger.core().request_count(), 1);
}

#[test]
fn broadcast_enforces_parties_and_extension() {
    let mut t = TestLedger::new();
    let signed = t.sign(&t.native, &[Amount::new(10)]);

    assert_eq!(
        t.native
            .broadcast_signed_request(&mut t.ledger, &ctx(t.payee), &signed, &[], &[])
            .unwrap_err(),
        LedgerError::SelfDealing(t.payee)
    );
    assert!(matches!(
        t.token
            .broadcast_signed_request(&mut t.ledger, &ctx(t.payer), &signed, &[], &[])
            .unwrap_err(),
        LedgerError::WrongExtension { .. }
    ));

    let mut terms = t.terms(t.native.address(), &[Amount::new(10)]);
    terms.payer = Some(t.payer);
    let restricted = t.sign_terms(&t.native, terms);
    let stranger = Address::from_label("stranger");
    assert!(matches!(
        t.native
            .broadcast_signed_request(&mut t.ledger, &ctx(stranger), &restricted, &[], &[])
            .unwrap_err(),
        LedgerError::PayerMismatch { .. }
    ));
    t.native
        .broadcast_signed_request(&mut t.ledger, &ctx(t.payer), &restricted, &[], &[])
        .unwrap();
}

#[test]
fn broadcast_rejects_a_relabelled_asset() {
    let mut t = TestLedger::new();
    let terms = t.terms(t.native.address(), &[Amount::new(10)]);
    let relabelled = SignedRequest::sign(terms, t.token.asset(), &t.payee_key).unwrap();

    let err = t
        .native
        .broadcast_signed_request(&mut t.ledger, &ctx(t.payer), &relabelled, &[], &[])
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::WrongAsset {
            signed: t.token.asset(),
            actual: AssetId::Native,
        }
    );
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert_eq!(t.ledger.core().request_count(), 0);
    assert!(!t.ledger.is_redeemed(&relabelled.terms.request_hash().unwrap()));
}

#[test]
fn broadcast_rejects_negative_expected_amounts() {
    let mut t = TestLedger::new();
    let signed = t.sign(&t.native, &[Amount::new(-5)]);
    assert_error_kind(
        t.native
            .broadcast_signed_request(&mut t.ledger, &ctx(t.payer), &signed, &[], &[]),
        ErrorKind::Validation,
    );
}

#[test]
fn payer_refund_route_travels_unsigned() {
    let mut t = TestLedger::new();
    let savings = Address::from_label("payer-savings");
    let signed = t
        .sign(&t.native, &[Amount::new(100)])
        .with_refund_route(Route::Account(savings));
    let id = t
        .native
        .broadcast_signed_request(
            &mut t.ledger,
            &ctx(t.payer).with_value(100),
            &signed,
            &[Amount::new(100)],
            &[],
        )
        .unwrap();

    t.native
        .refund(&mut t.ledger, &ctx(t.payee).with_value(40), &id, Amount::new(40))
        .unwrap();
    assert_eq!(t.ledger.native_balance(&savings), Amount::new(40));
    assert_balances(&t.ledger, &id, &[60]);
}

#[test]
fn token_broadcast_pulls_principal_by_allowance() {
    let mut t = TestLedger::new();
    let token = t.token.token();
    let signed = t.sign(&t.token, &[Amount::new(300)]);

    let err = t
        .token
        .broadcast_signed_request(&mut t.ledger, &ctx(t.payer).with_value(300), &signed, &[Amount::new(300)], &[])
        .unwrap_err();
    assert!(matches!(err, LedgerError::ValueMismatch { .. }));

    let payee_before = t.ledger.token_balance(&token, &t.payee);
    let id = t
        .token
        .broadcast_signed_request(&mut t.ledger, &ctx(t.payer), &signed, &[Amount::new(300)], &[])
        .unwrap();
    assert_balances(&t.ledger, &id, &[300]);
    assert_eq!(
        t.ledger.token_balance(&token, &t.payee),
        payee_before.add_or_overflow(Amount::new(300), "test").unwrap()
    );
}
