//! Benchmark for ledger operations against the in-memory store.
//!
//! TARGET: keyed operations stay cheap enough to run inline after each tick
//!
//! Run with: cargo bench --package bullion_economy --bench ledger_benchmark

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use bullion_economy::{accounts, Ledger, LedgerConfig, MemoryStore, ReservationService};

fn ledger() -> Ledger {
    let config = LedgerConfig {
        backoff_min_ms: 0,
        backoff_max_ms: 0,
        ..LedgerConfig::default()
    };
    Ledger::new(Arc::new(MemoryStore::new()), "bench", config).expect("valid config")
}

fn benchmark_ledger(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger");

    group.bench_function("deposit_keyed", |b| {
        let ledger = ledger();
        let mut n = 0u64;
        b.iter(|| {
            n += 1;
            let key = format!("dep:{n}");
            black_box(ledger.deposit("acc", 1, Some(&key)).expect("deposit"))
        });
    });

    group.bench_function("deposit_replay", |b| {
        let ledger = ledger();
        ledger.deposit("acc", 1, Some("same")).expect("deposit");
        b.iter(|| black_box(ledger.deposit("acc", 1, Some("same")).expect("deposit")));
    });

    group.bench_function("transfer_fire_once", |b| {
        let ledger = ledger();
        ledger.deposit("a", 1 << 40, None).expect("deposit");
        b.iter(|| black_box(ledger.transfer("a", "b", 1, None).expect("transfer")));
    });

    group.finish();
}

fn benchmark_reservations(c: &mut Criterion) {
    let mut group = c.benchmark_group("reservations");

    group.bench_function("reserve_release", |b| {
        let svc = ReservationService::new(ledger());
        svc.ledger()
            .deposit(accounts::BANKROLL, 1 << 40, None)
            .expect("deposit");
        b.iter(|| {
            svc.reserve_exit("s1", 100, 900, 0).expect("reserve");
            black_box(svc.release_exit("s1").expect("release"))
        });
    });

    group.bench_function("spend_pellet", |b| {
        let svc = ReservationService::new(ledger());
        svc.credit_pellet_reserve(1 << 40, None).expect("credit");
        b.iter(|| black_box(svc.spend_pellet(5).expect("spend")));
    });

    group.finish();
}

criterion_group!(benches, benchmark_ledger, benchmark_reservations);
criterion_main!(benches);
