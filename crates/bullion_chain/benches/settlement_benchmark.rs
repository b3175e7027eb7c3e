//! # Settlement Performance Benchmark
//!
//! REQUIREMENTS:
//! - Log parsing: well under 1µs
//! - Ticket signing: fast enough to sign every exit inline
//!
//! Run with: `cargo bench --package bullion_chain`

#![allow(missing_docs)]

use std::sync::Arc;

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::SolEvent;
use bullion_chain::{
    Eip712TicketSigner, EventParser, IBullionVault, SettlementEvent, SettlementSync, VaultTransfer,
};
use bullion_economy::{Ledger, LedgerConfig, MemoryStore, TicketClaim, TicketSigner};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_parse(c: &mut Criterion) {
    let mut player = [0u8; 32];
    player[12..].copy_from_slice(Address::repeat_byte(1).as_slice());
    let topics = [IBullionVault::Deposited::SIGNATURE_HASH.0, [7u8; 32], player];
    let data = U256::from(1_000u64).to_be_bytes::<32>();

    c.bench_function("parse_deposit_log", |b| {
        b.iter(|| black_box(EventParser::parse(&topics, &data, 12345, 0)));
    });
}

fn bench_sign(c: &mut Criterion) {
    let signer = Eip712TicketSigner::from_hex(
        "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318",
        1,
        Address::repeat_byte(0x11),
    )
    .expect("valid key");
    let claim = TicketClaim {
        server_id: "room-1".into(),
        session_id: "s1".into(),
        player: "0x2222222222222222222222222222222222222222".into(),
        amount: 640,
        deadline: 1_700_000_900,
    };

    c.bench_function("sign_exit_ticket", |b| {
        b.iter(|| black_box(signer.sign(&claim).expect("sign")));
    });
}

fn bench_apply(c: &mut Criterion) {
    let store = Arc::new(MemoryStore::new());
    let ledger = Ledger::new(store, "bench", LedgerConfig::default()).expect("valid config");
    let mut sync = SettlementSync::new(ledger, 500);
    let mut n = 0u64;

    c.bench_function("apply_deposit", |b| {
        b.iter(|| {
            n += 1;
            let mut id = [0u8; 32];
            id[24..].copy_from_slice(&n.to_be_bytes());
            let event = SettlementEvent::Deposited(VaultTransfer {
                event_id: B256::from(id),
                player: Address::repeat_byte(1),
                amount: U256::from(1_000u64),
                block_number: n,
                log_index: 0,
            });
            sync.apply(&event).expect("apply");
        });
    });
}

criterion_group!(benches, bench_parse, bench_sign, bench_apply);
criterion_main!(benches);
