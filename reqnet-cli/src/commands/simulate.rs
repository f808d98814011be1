//! Simulate command - run a request lifecycle on an in-memory ledger

use anyhow::{Context, Result};
use reqnet_lib::{
    Address, Amount, CallContext, CurrencyExtension, Deployment, ErrorKind, PayeeCreation,
    RequestId, RequestTerms, SettlingExtension, SignedRequest, SigningIdentity,
};
use std::path::Path;

use crate::ui;

/// Native value minted to every simulated party.
const FUNDING: i128 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Scenario {
    /// Pay a split request
    A,
    /// Payer raises the primary expected amount
    B,
    /// Scenario B, then the payee lowers expected amounts and over-subtracts
    C,
    /// Expired and tampered signed requests
    D,
    /// Cancel with and without a balance
    E,
    /// Escrowed payment held, then released to the payees
    F,
}

struct Simulation {
    deployment: Deployment,
    payee: SigningIdentity,
    sub_payee: Address,
    payer: Address,
    third_party: Address,
    now: i64,
    steps: usize,
}

impl Simulation {
    fn new(deployment: Deployment) -> Result<Self> {
        let mut sim = Self {
            deployment,
            payee: SigningIdentity::generate(),
            sub_payee: Address::from_label("sim/sub-payee"),
            payer: Address::from_label("sim/payer"),
            third_party: Address::from_label("sim/third-party"),
            now: super::now(),
            steps: 0,
        };
        let admin = sim.deployment.admin;
        for account in [sim.payee.address(), sim.payer, sim.third_party] {
            sim.deployment
                .ledger
                .mint_native(&admin, account, Amount::new(FUNDING))?;
        }
        Ok(sim)
    }

    fn ctx(&self, sender: Address) -> CallContext {
        CallContext::new(sender, self.now)
    }

    fn step(&mut self, text: &str) {
        self.steps += 1;
        ui::step(self.steps, text);
    }

    /// Creation parameters for the primary payee and one sub-payee, with
    /// the payee's context carrying the fee for `extension`.
    fn creation(&self, extension: Address, expected: [i128; 2]) -> Result<(PayeeCreation, CallContext)> {
        let expected: Vec<Amount> = expected.into_iter().map(Amount::new).collect();
        let fee = self
            .deployment
            .ledger
            .fees()
            .estimate(&extension, Amount::sum(&expected, "total")?)?;
        let params = PayeeCreation::new(vec![self.payee.address(), self.sub_payee], expected, self.payer)
            .with_data("simulation");
        Ok((params, self.ctx(self.payee.address()).with_value(fee)))
    }

    /// Payee-created native request for the primary payee and one sub-payee.
    fn create(&mut self, expected: [i128; 2]) -> Result<RequestId> {
        let native = self.deployment.native;
        let (params, ctx) = self.creation(native.address(), expected)?;
        let id = native.create_request_as_payee(&mut self.deployment.ledger, &ctx, params)?;
        Ok(id)
    }

    fn show(&self, id: &RequestId) -> Result<()> {
        let request = self.deployment.ledger.request(id)?;
        ui::key_value("State", &request.state.to_string());
        for (slot, payee) in request.payees() {
            ui::key_value(
                &format!("Payee {}", slot.index()),
                &format!("expected {} balance {}", payee.expected_amount, payee.balance),
            );
        }
        Ok(())
    }
}

/// Report an operation that should fail with `kind`.
fn expect_failure<T>(result: reqnet_lib::Result<T>, kind: ErrorKind) -> Result<()> {
    match result {
        Err(e) if e.kind() == kind => {
            ui::success(&format!("Rejected as expected: {e} ({kind:?}, code {})", e.code() as i32));
            Ok(())
        }
        Err(e) => anyhow::bail!("expected a {kind:?} error, got {e}"),
        Ok(_) => anyhow::bail!("expected a {kind:?} error, but the operation succeeded"),
    }
}

pub fn run(storage_dir: &Path, scenario: Scenario, verbose: bool) -> Result<()> {
    let config = super::load_config(storage_dir)?;
    let mut sim = Simulation::new(super::deploy(&config)?)?;
    tracing::info!(?scenario, "running simulation");

    ui::header(&format!("Scenario {scenario:?}"));
    ui::key_value("Payee", &sim.payee.address().to_string());
    ui::key_value("Sub-payee", &sim.sub_payee.to_string());
    ui::key_value("Payer", &sim.payer.to_string());
    ui::separator();

    match scenario {
        Scenario::A => pay_split(&mut sim)?,
        Scenario::B => {
            raise_expected(&mut sim)?;
        }
        Scenario::C => lower_expected(&mut sim)?,
        Scenario::D => signed_rejections(&mut sim)?,
        Scenario::E => cancel_rules(&mut sim)?,
        Scenario::F => escrow_release(&mut sim)?,
    }

    if verbose {
        ui::header("Events");
        ui::json(&serde_json::to_value(sim.deployment.ledger.events().all())?);
    }
    ui::success(&format!("Scenario {scenario:?} completed"));
    Ok(())
}

fn pay_split(sim: &mut Simulation) -> Result<()> {
    sim.step("Payee creates a request for 100 with a sub-payee expecting 20");
    let id = sim.create([100, 20])?;
    sim.show(&id)?;

    sim.step("A third party pays [5, 3] on the payer's behalf");
    let native = sim.deployment.native;
    let ctx = sim.ctx(sim.third_party).with_value(8);
    native
        .pay(
            &mut sim.deployment.ledger,
            &ctx,
            &id,
            &[Amount::new(5), Amount::new(3)],
            &[],
        )
        .context("paying request")?;
    sim.show(&id)
}

fn raise_expected(sim: &mut Simulation) -> Result<RequestId> {
    sim.step("Payee creates a request for 100 with a sub-payee expecting 20");
    let id = sim.create([100, 20])?;

    sim.step("Payer adds [10, 0] before accepting");
    let native = sim.deployment.native;
    let ctx = sim.ctx(sim.payer);
    native
        .additional(
            &mut sim.deployment.ledger,
            &ctx,
            &id,
            &[Amount::new(10), Amount::ZERO],
        )
        .context("raising expected amount")?;
    sim.show(&id)?;
    Ok(id)
}

fn lower_expected(sim: &mut Simulation) -> Result<()> {
    let id = raise_expected(sim)?;

    sim.step("Payee subtracts [30, 5]");
    let native = sim.deployment.native;
    let ctx = sim.ctx(sim.payee.address());
    native
        .subtract(
            &mut sim.deployment.ledger,
            &ctx,
            &id,
            &[Amount::new(30), Amount::new(5)],
        )
        .context("lowering expected amount")?;
    sim.show(&id)?;

    sim.step("Payee subtracts [1000] from the primary");
    expect_failure(
        native.subtract(&mut sim.deployment.ledger, &ctx, &id, &[Amount::new(1000)]),
        ErrorKind::Validation,
    )?;
    sim.show(&id)
}

fn signed_rejections(sim: &mut Simulation) -> Result<()> {
    let native = sim.deployment.native;
    let signed_at = sim.now;

    sim.step("Payee signs a request for 1000 expiring in one hour");
    let terms = RequestTerms {
        extension: native.address(),
        payer: None,
        payees: vec![sim.payee.address()],
        expected_amounts: vec![Amount::new(1000)],
        payee_routes: Vec::new(),
        data: "simulation".into(),
        expires_at: signed_at + 3600,
    };
    let signed = SignedRequest::sign(terms, native.asset(), &sim.payee)?;
    ui::key_value("Request Hash", &hex::encode(signed.terms.request_hash()?));
    ui::key_value("Expires", &ui::timestamp(signed.terms.expires_at));

    sim.step("Payer broadcasts one second after expiry");
    let late = CallContext::new(sim.payer, signed_at + 3601);
    expect_failure(
        native.broadcast_signed_request(&mut sim.deployment.ledger, &late, &signed, &[], &[]),
        ErrorKind::Protocol,
    )?;

    sim.step("Payer broadcasts a copy with a tampered amount");
    let mut tampered = signed.clone();
    tampered.terms.expected_amounts[0] = Amount::new(1);
    let early = CallContext::new(sim.payer, signed_at + 10);
    expect_failure(
        native.broadcast_signed_request(&mut sim.deployment.ledger, &early, &tampered, &[], &[]),
        ErrorKind::Protocol,
    )?;

    let count = sim.deployment.ledger.core().request_count();
    ui::key_value("Requests Created", &count.to_string());
    if count != 0 {
        ui::warning("rejected broadcasts left requests behind");
    }
    Ok(())
}

fn cancel_rules(sim: &mut Simulation) -> Result<()> {
    let native = sim.deployment.native;
    let payee = sim.payee.address();

    sim.step("Payee creates a request and the payer pays 50");
    let paid = sim.create([100, 0])?;
    let ctx = sim.ctx(sim.payer).with_value(50);
    native.pay(&mut sim.deployment.ledger, &ctx, &paid, &[Amount::new(50)], &[])?;
    sim.show(&paid)?;

    sim.step("Payee cancels the paid request");
    let ctx = sim.ctx(payee);
    expect_failure(
        native.cancel(&mut sim.deployment.ledger, &ctx, &paid),
        ErrorKind::State,
    )?;

    sim.step("Payee creates an unpaid request and cancels it");
    let unpaid = sim.create([100, 0])?;
    native
        .cancel(&mut sim.deployment.ledger, &ctx, &unpaid)
        .context("canceling unpaid request")?;
    sim.show(&unpaid)
}

fn escrow_release(sim: &mut Simulation) -> Result<()> {
    let escrow = sim.deployment.escrow;
    let agent = Address::from_label("sim/escrow-agent");
    ui::key_value("Escrow Agent", &agent.to_string());

    sim.step("Payee creates an escrowed request for 100 with a sub-payee expecting 20");
    let (params, ctx) = sim.creation(escrow.address(), [100, 20])?;
    let id = escrow
        .create_escrowed_request(&mut sim.deployment.ledger, &ctx, params, agent)
        .context("creating escrowed request")?;

    sim.step("Payer pays [100, 20] into escrow");
    let ctx = sim.ctx(sim.payer).with_value(120);
    escrow
        .pay(
            &mut sim.deployment.ledger,
            &ctx,
            &id,
            &[Amount::new(100), Amount::new(20)],
            &[],
        )
        .context("paying into escrow")?;
    sim.show(&id)?;
    ui::key_value(
        "Held",
        &sim.deployment.ledger.native_balance(&escrow.address()).to_string(),
    );

    sim.step("Agent releases the escrow to the payees");
    let ctx = sim.ctx(agent);
    escrow
        .release_to_payee(&mut sim.deployment.ledger, &ctx, &id)
        .context("releasing escrow")?;
    ui::key_value(
        "Sub-payee Holds",
        &sim.deployment.ledger.native_balance(&sim.sub_payee).to_string(),
    );

    sim.step("Payer pays again after release");
    let ctx = sim.ctx(sim.payer).with_value(1);
    expect_failure(
        escrow.pay(&mut sim.deployment.ledger, &ctx, &id, &[Amount::new(1)], &[]),
        ErrorKind::State,
    )?;
    sim.show(&id)
}
