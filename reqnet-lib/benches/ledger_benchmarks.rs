//! Signing and settlement benchmarks
//!
//! Run with: `cargo bench --bench ledger_benchmarks`

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use reqnet_lib::prelude::*;
use reqnet_lib::test_utils::{ctx, TestLedger};

/// Benchmark canonical hashing of request terms
fn bench_request_hash(c: &mut Criterion) {
    let t = TestLedger::new();
    let terms = t.terms(t.native.address(), &[Amount::new(1000), Amount::new(250)]);

    c.bench_function("request_hash", |b| {
        b.iter(|| black_box(terms.request_hash()))
    });
}

/// Benchmark signing and verifying a request
fn bench_sign_and_verify(c: &mut Criterion) {
    let t = TestLedger::new();
    let signed = t.sign(&t.native, &[Amount::new(1000)]);

    c.bench_function("signed_request_sign", |b| {
        b.iter(|| black_box(t.sign(&t.native, black_box(&[Amount::new(1000)]))))
    });
    c.bench_function("signed_request_verify", |b| {
        b.iter(|| black_box(signed.verify(reqnet_lib::test_utils::NOW)))
    });
}

/// Benchmark paying a request split across payees
fn bench_split_payment(c: &mut Criterion) {
    let mut group = c.benchmark_group("split_payment");
    for payees in [1usize, 4, 16] {
        group.throughput(Throughput::Elements(payees as u64));
        let amounts = vec![Amount::new(1); payees];
        let value = payees as i128;
        group.bench_function(format!("{payees}_payees"), |b| {
            b.iter_batched(
                || {
                    let mut t = TestLedger::new();
                    let id = t.create_native(&vec![Amount::new(100); payees]);
                    (t, id)
                },
                |(mut t, id)| {
                    t.native
                        .pay(&mut t.ledger, &ctx(t.payer).with_value(value), &id, &amounts, &[])
                        .unwrap();
                    t
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_request_hash, bench_sign_and_verify, bench_split_payment);
criterion_main!(benches);
