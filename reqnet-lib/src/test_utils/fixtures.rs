//! Deployed test ledger and fixtures.

use crate::access::AccessRegistry;
use crate::config::{Deployment, LedgerConfig};
use crate::extensions::{
    CurrencyExtension, EscrowExtension, ExternalExtension, NativeExtension, PayeeCreation,
    TokenExtension,
};
use crate::ledger::{CallContext, Ledger};
use crate::signing::{RequestTerms, SignedRequest, SigningIdentity};
use crate::types::RequestId;
use crate::{Address, Amount};
use std::sync::Arc;

/// Native and token units minted to the payer and the payee.
pub const FUNDING: i128 = 1_000_000;

/// Ledger time every test context starts at.
pub const NOW: i64 = 1_700_000_000;

/// Secret key of the payee identity.
pub const PAYEE_SECRET: [u8; 32] = [7u8; 32];

/// Context for `sender` at [`NOW`] with nothing attached.
pub fn ctx(sender: Address) -> CallContext {
    CallContext::new(sender, NOW)
}

/// Context for `sender` at `now`.
pub fn ctx_at(sender: Address, now: i64) -> CallContext {
    CallContext::new(sender, now)
}

/// A deployment with a funded payer and payee.
///
/// Both accounts hold [`FUNDING`] native units and tokens, and have granted
/// the token extension an unlimited allowance.
pub struct TestLedger {
    pub ledger: Ledger,
    pub access: Arc<AccessRegistry>,
    pub admin: Address,
    pub payee_key: SigningIdentity,
    pub payee: Address,
    pub payer: Address,
    pub native: NativeExtension,
    pub escrow: EscrowExtension,
    pub token: TokenExtension,
    pub external: ExternalExtension,
}

impl Default for TestLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl TestLedger {
    pub fn new() -> Self {
        Self::with_config(&LedgerConfig::default())
    }

    pub fn with_config(config: &LedgerConfig) -> Self {
        let admin = Address::from_label("admin");
        let deployment = Deployment::new(config, admin).expect("test deployment");
        let payee_key = SigningIdentity::from_secret_bytes(&PAYEE_SECRET);
        let mut t = Self {
            ledger: deployment.ledger,
            access: deployment.access,
            admin,
            payee: payee_key.address(),
            payee_key,
            payer: Address::from_label("payer"),
            native: deployment.native,
            escrow: deployment.escrow,
            token: deployment.token,
            external: deployment.external,
        };
        t.fund(t.payee);
        t.fund(t.payer);
        t
    }

    /// Mint [`FUNDING`] of both assets to `account` and approve the token
    /// extension.
    pub fn fund(&mut self, account: Address) {
        let token = self.token.token();
        self.ledger
            .mint_native(&self.admin, account, Amount::new(FUNDING))
            .expect("mint native");
        self.ledger
            .mint_token(&self.admin, &token, account, Amount::new(FUNDING))
            .expect("mint token");
        self.ledger
            .approve(&ctx(account), &token, self.token.address(), Amount::MAX)
            .expect("approve");
    }

    /// Address of the `n`-th sub payee.
    pub fn sub(&self, n: usize) -> Address {
        Address::from_label(&format!("sub-payee-{n}"))
    }

    /// The payee followed by `count - 1` sub payees.
    pub fn payees(&self, count: usize) -> Vec<Address> {
        std::iter::once(self.payee)
            .chain((0..count.saturating_sub(1)).map(|n| self.sub(n)))
            .collect()
    }

    /// Fee the payee must attach when creating through `extension`.
    pub fn creation_fee(&self, extension: &Address, expected: &[Amount]) -> Amount {
        let total = Amount::sum(expected, "total").expect("total");
        self.ledger.fees().estimate(extension, total).expect("fee")
    }

    fn create_with(&mut self, extension: &dyn CurrencyExtension, expected: &[Amount]) -> RequestId {
        let fee = self.creation_fee(&extension.address(), expected);
        let params = PayeeCreation::new(self.payees(expected.len()), expected.to_vec(), self.payer);
        extension
            .create_request_as_payee(&mut self.ledger, &ctx(self.payee).with_value(fee), params)
            .expect("create request")
    }

    /// Payee-created native request with one payee per expected amount.
    pub fn create_native(&mut self, expected: &[Amount]) -> RequestId {
        let native = self.native;
        self.create_with(&native, expected)
    }

    /// Payee-created token request with one payee per expected amount.
    pub fn create_token(&mut self, expected: &[Amount]) -> RequestId {
        let token = self.token;
        self.create_with(&token, expected)
    }

    /// Terms for `extension` with one payee per expected amount, valid for an
    /// hour after [`NOW`].
    pub fn terms(&self, extension: Address, expected: &[Amount]) -> RequestTerms {
        RequestTerms {
            extension,
            payer: None,
            payees: self.payees(expected.len()),
            expected_amounts: expected.to_vec(),
            payee_routes: Vec::new(),
            data: String::new(),
            expires_at: NOW + 3600,
        }
    }

    /// Payee-signed request for `extension`.
    pub fn sign(&self, extension: &dyn CurrencyExtension, expected: &[Amount]) -> SignedRequest {
        self.sign_terms(extension, self.terms(extension.address(), expected))
    }

    pub fn sign_terms(&self, extension: &dyn CurrencyExtension, terms: RequestTerms) -> SignedRequest {
        SignedRequest::sign(terms, extension.asset(), &self.payee_key).expect("sign")
    }
}
