//! Ledger and reservation behaviour through the public API only.

use std::sync::Arc;
use std::thread;

use bullion_economy::{
    accounts, ExitRequest, KvStore, Ledger, LedgerConfig, LedgerError, LedgerResult, MemoryStore,
    ReservationService, TicketClaim, TicketSigner,
};

struct FixedSigner;

impl TicketSigner for FixedSigner {
    fn sign(&self, claim: &TicketClaim) -> LedgerResult<Vec<u8>> {
        Ok(format!("{}:{}", claim.session_id, claim.amount).into_bytes())
    }
}

fn fast_config() -> LedgerConfig {
    LedgerConfig {
        backoff_min_ms: 0,
        backoff_max_ms: 1,
        max_attempts: 64,
        ..LedgerConfig::default()
    }
}

fn new_ledger(server: &str) -> (Arc<MemoryStore>, Ledger) {
    let store = Arc::new(MemoryStore::new());
    let ledger = Ledger::new(store.clone(), server, fast_config()).unwrap();
    (store, ledger)
}

fn total(ledger: &Ledger, names: &[&str]) -> u64 {
    names.iter().map(|n| ledger.balance(n).unwrap()).sum()
}

#[test]
fn deposit_with_same_key_counts_once() {
    let (_, ledger) = new_ledger("room-1");
    assert_eq!(ledger.deposit("acc1", 100, Some("k1")).unwrap(), 100);
    assert_eq!(ledger.deposit("acc1", 100, Some("k1")).unwrap(), 100);
    assert_eq!(ledger.balance("acc1").unwrap(), 100);
}

#[test]
fn short_transfer_is_refused_without_side_effects() {
    let (_, ledger) = new_ledger("room-1");
    ledger.deposit("a", 30, None).unwrap();
    assert!(!ledger.transfer("a", "b", 50, None).unwrap());
    assert_eq!(ledger.balance("a").unwrap(), 30);
    assert_eq!(ledger.balance("b").unwrap(), 0);
}

#[test]
fn reserve_exit_tracks_bankroll() {
    let (_, ledger) = new_ledger("room-1");
    let svc = ReservationService::new(ledger.clone());

    ledger.deposit(accounts::BANKROLL, 40, Some("dep-1")).unwrap();
    assert!(!svc.reserve_exit("s1", 50, 900, 0).unwrap());

    ledger.deposit(accounts::BANKROLL, 60, Some("dep-2")).unwrap();
    assert!(svc.reserve_exit("s1", 50, 900, 0).unwrap());
    assert_eq!(svc.bankroll().unwrap(), 50);
    assert_eq!(svc.reserved_total().unwrap(), 50);
}

#[test]
fn every_keyed_operation_replays() {
    let (_, ledger) = new_ledger("room-1");
    ledger.deposit("a", 100, None).unwrap();

    for _ in 0..2 {
        assert!(ledger.withdraw("a", 10, Some("w")).unwrap());
        assert!(ledger.burn("a", 5, Some("b")).unwrap());
        assert!(ledger.transfer("a", "c", 20, Some("t")).unwrap());
    }
    assert_eq!(ledger.balance("a").unwrap(), 65);
    assert_eq!(ledger.balance("c").unwrap(), 20);
}

#[test]
fn key_reuse_with_other_operation_is_an_error() {
    let (_, ledger) = new_ledger("room-1");
    ledger.deposit("a", 100, Some("shared")).unwrap();

    let err = ledger.transfer("a", "b", 1, Some("shared")).unwrap_err();
    match err {
        LedgerError::IdempotencyConflict { recorded, requested, .. } => {
            assert_eq!(recorded, "deposit");
            assert_eq!(requested, "transfer");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(ledger.balance("b").unwrap(), 0);
}

#[test]
fn server_scopes_do_not_share_balances_or_keys() {
    let store = Arc::new(MemoryStore::new());
    let one = Ledger::new(store.clone(), "room-1", fast_config()).unwrap();
    let two = Ledger::new(store.clone(), "room-2", fast_config()).unwrap();

    one.deposit("a", 10, Some("k")).unwrap();
    assert_eq!(two.deposit("a", 7, Some("k")).unwrap(), 7);
    assert_eq!(one.balance("a").unwrap(), 10);
    assert!(store.get("bullion:room-2:bal:a").unwrap().is_some());
}

#[test]
fn contention_exhaustion_is_hard_and_retryable() {
    let (store, ledger) = new_ledger("room-1");
    ledger.deposit("a", 50, None).unwrap();

    store.inject_conflicts(64);
    let err = ledger.transfer("a", "b", 20, Some("t1")).unwrap_err();
    assert!(matches!(err, LedgerError::ContentionExhausted { attempts: 64 }));
    assert_eq!(ledger.balance("a").unwrap(), 50);

    // Reissuing with the same key is safe.
    assert!(ledger.transfer("a", "b", 20, Some("t1")).unwrap());
    assert!(ledger.transfer("a", "b", 20, Some("t1")).unwrap());
    assert_eq!(ledger.balance("b").unwrap(), 20);
}

#[test]
fn sum_changes_only_by_signed_amounts() {
    let (_, ledger) = new_ledger("room-1");
    let names = ["a", "b", "c"];

    ledger.deposit("a", 500, None).unwrap();
    ledger.transfer("a", "b", 120, None).unwrap();
    ledger.transfer("b", "c", 70, Some("t")).unwrap();
    ledger.transfer("c", "a", 1_000, None).unwrap();
    assert_eq!(total(&ledger, &names), 500);

    ledger.burn("b", 30, None).unwrap();
    ledger.withdraw("c", 20, Some("w")).unwrap();
    assert_eq!(total(&ledger, &names), 450);
}

#[test]
fn concurrent_transfers_conserve_total() {
    let (_, ledger) = new_ledger("room-1");
    let names = ["p0", "p1", "p2", "p3"];
    for name in names {
        ledger.deposit(name, 1_000, None).unwrap();
    }

    let workers: Vec<_> = (0..4)
        .map(|w| {
            let ledger = ledger.clone();
            thread::spawn(move || {
                for i in 0..200 {
                    let from = names[(w + i) % 4];
                    let to = names[(w + i + 1) % 4];
                    let key = format!("w{w}-{i}");
                    let keyed = i % 2 == 0;
                    ledger
                        .transfer(from, to, 7, keyed.then_some(key.as_str()))
                        .unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(total(&ledger, &names), 4_000);
}

#[test]
fn exit_settlement_path() {
    let (_, ledger) = new_ledger("room-1");
    let svc = ReservationService::new(ledger.clone());
    ledger.deposit(accounts::BANKROLL, 1_000, None).unwrap();

    assert!(svc.reserve_exit("s1", 640, 900, 100).unwrap());
    assert_eq!(svc.commit_exit("s1").unwrap(), Some(640));

    let request = ExitRequest {
        wallet: "0xF00".into(),
        session_id: "s1".into(),
        amount: 640,
        deadline: ledger.ticket_deadline(100),
    };
    let first = ledger
        .withdraw_with_ticket(&request, &FixedSigner, Some("exit:s1"))
        .unwrap()
        .unwrap();
    let again = ledger
        .withdraw_with_ticket(&request, &FixedSigner, Some("exit:s1"))
        .unwrap()
        .unwrap();

    assert_eq!(first, again);
    assert_eq!(first.claim.deadline, 1_000);
    assert_eq!(first.signature, b"s1:640".to_vec());
    assert_eq!(ledger.balance(accounts::EXIT_POOL).unwrap(), 0);
    assert_eq!(ledger.balance(&accounts::pending_exit("0xf00")).unwrap(), 640);
    assert_eq!(svc.observed_bankroll().unwrap(), 360);
}

#[test]
fn sweep_twice_credits_once() {
    let (_, ledger) = new_ledger("room-1");
    let svc = ReservationService::new(ledger.clone());
    ledger.deposit(accounts::BANKROLL, 300, None).unwrap();
    for (i, session) in ["s1", "s2", "s3"].iter().enumerate() {
        assert!(svc.reserve_exit(session, 100, 10 * (i as u64 + 1), 0).unwrap());
    }
    assert_eq!(svc.bankroll().unwrap(), 0);

    assert_eq!(svc.sweep_expired_reservations(20, 1).unwrap(), 1);
    assert_eq!(svc.sweep_expired_reservations(20, 10).unwrap(), 1);
    assert_eq!(svc.sweep_expired_reservations(20, 10).unwrap(), 0);
    assert_eq!(svc.bankroll().unwrap(), 200);
    assert_eq!(svc.reserved_total().unwrap(), 100);

    // A manual release after the sweep is a no-op.
    assert!(!svc.release_exit("s1").unwrap());
    assert_eq!(svc.bankroll().unwrap(), 200);
}

#[test]
fn concurrent_pellet_spends_never_overdraw() {
    let (_, ledger) = new_ledger("room-1");
    let svc = ReservationService::new(ledger);
    svc.credit_pellet_reserve(100, Some("seed")).unwrap();

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let svc = svc.clone();
            thread::spawn(move || (0..50).filter(|_| svc.spend_pellet(3).unwrap()).count())
        })
        .collect();
    let spent: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();

    assert_eq!(spent, 33);
    assert_eq!(svc.pellet_reserve().unwrap(), 1);
}
