//! Deposit to exit to redemption, through the queue, ledger and signer.

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolEvent;
use bullion_chain::{Eip712TicketSigner, IBullionVault, SettlementQueue, SettlementSync};
use bullion_economy::{
    accounts, ExitRequest, Ledger, LedgerConfig, MemoryStore, ReservationService,
};

const KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

fn raw_log(signature: [u8; 32], id: u8, player: Address, amount: u64) -> ([[u8; 32]; 3], [u8; 32]) {
    let mut player_topic = [0u8; 32];
    player_topic[12..].copy_from_slice(player.as_slice());
    ([signature, [id; 32], player_topic], U256::from(amount).to_be_bytes::<32>())
}

fn ledger() -> Ledger {
    Ledger::new(Arc::new(MemoryStore::new()), "room-1", LedgerConfig::default()).unwrap()
}

#[test]
fn redelivered_deposit_credits_once() {
    let ledger = ledger();
    let queue = SettlementQueue::new(16);
    let mut sync = SettlementSync::new(ledger.clone(), 500);
    let player = Address::repeat_byte(0x33);

    let (topics, data) = raw_log(IBullionVault::Deposited::SIGNATURE_HASH.0, 1, player, 2_000);
    assert!(queue.push_raw_log(&topics, &data, 10, 0));
    assert!(queue.push_raw_log(&topics, &data, 10, 0));
    assert_eq!(sync.drain(&queue).unwrap(), 2);

    let wallet = format!("{player:#x}");
    assert_eq!(ledger.balance(&accounts::stake(&wallet)).unwrap(), 2_000);
    assert_eq!(ledger.balance(accounts::BANKROLL).unwrap(), 2_000);
    assert_eq!(ledger.balance(accounts::PELLET_RESERVE).unwrap(), 100);
    assert_eq!(sync.last_block(), 10);
}

#[test]
fn exit_ticket_redeems_against_pending() {
    let ledger = ledger();
    let reservations = ReservationService::new(ledger.clone());
    let vault = Address::repeat_byte(0x11);
    let signer = Eip712TicketSigner::from_hex(KEY, 1, vault).unwrap();
    let mut sync = SettlementSync::new(ledger.clone(), 0);
    let player = Address::repeat_byte(0x44);
    let wallet = format!("{player:#x}");

    let (topics, data) = raw_log(IBullionVault::Deposited::SIGNATURE_HASH.0, 1, player, 1_000);
    let queue = SettlementQueue::new(4);
    queue.push_raw_log(&topics, &data, 1, 0);
    sync.drain(&queue).unwrap();

    assert!(reservations.reserve_exit("s1", 400, 900, 0).unwrap());
    assert_eq!(reservations.commit_exit("s1").unwrap(), Some(400));
    let request = ExitRequest {
        wallet: wallet.clone(),
        session_id: "s1".into(),
        amount: 400,
        deadline: ledger.ticket_deadline(0),
    };
    let ticket = ledger
        .withdraw_with_ticket(&request, &signer, Some("exit:s1"))
        .unwrap()
        .unwrap();

    let typed = Eip712TicketSigner::ticket_for(&ticket.claim).unwrap();
    assert_eq!(signer.recover(&typed, &ticket.signature).unwrap(), signer.address());
    assert_eq!(ledger.balance(&accounts::pending_exit(&wallet)).unwrap(), 400);

    let (topics, data) = raw_log(IBullionVault::ExitRedeemed::SIGNATURE_HASH.0, 2, player, 400);
    queue.push_raw_log(&topics, &data, 2, 0);
    queue.push_raw_log(&topics, &data, 2, 0);
    sync.drain(&queue).unwrap();

    assert_eq!(ledger.balance(&accounts::pending_exit(&wallet)).unwrap(), 0);
    assert_eq!(sync.drift_events(), 0);
    assert_eq!(reservations.bankroll().unwrap(), 600);
}
