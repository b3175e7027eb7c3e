//! # Settlement Events
//!
//! Vault logs the ledger cares about, parsed straight from raw topics and
//! data without an ABI decoder round trip.

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::SolEvent;

use crate::contracts::IBullionVault;

/// Everything the settlement sync consumes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SettlementEvent {
    /// Funds entered the vault for a player.
    Deposited(VaultTransfer),
    /// An exit ticket was redeemed.
    ExitRedeemed(VaultTransfer),
    /// A new block was mined (for sync purposes).
    NewBlock(u64),
}

/// Payload shared by both vault events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VaultTransfer {
    /// Unique id assigned by the vault.
    pub event_id: B256,
    /// Player address.
    pub player: Address,
    /// Amount in the smallest unit.
    pub amount: U256,
    /// Block where this occurred.
    pub block_number: u64,
    /// Log index within the block.
    pub log_index: u32,
}

impl VaultTransfer {
    /// Ledger idempotency key for the `part` of this event's effect.
    #[must_use]
    pub fn key(&self, part: &str) -> String {
        format!("chain:{}:{part}", self.event_id)
    }

    /// Wallet string used in ledger account names.
    #[must_use]
    pub fn wallet(&self) -> String {
        format!("{:#x}", self.player)
    }
}

impl SettlementEvent {
    /// Block the event belongs to.
    #[must_use]
    pub const fn block_number(&self) -> u64 {
        match self {
            Self::Deposited(t) | Self::ExitRedeemed(t) => t.block_number,
            Self::NewBlock(n) => *n,
        }
    }
}

/// Event parser for raw log data.
pub struct EventParser;

impl EventParser {
    /// Parses a vault log. `None` for foreign or malformed logs.
    ///
    /// Layout: topics `[signature, eventId, player]`, data `amount(32)`.
    #[must_use]
    pub fn parse(topics: &[[u8; 32]], data: &[u8], block_number: u64, log_index: u32) -> Option<SettlementEvent> {
        if topics.len() < 3 || data.len() < 32 {
            return None;
        }
        let signature = B256::from(topics[0]);
        let transfer = VaultTransfer {
            event_id: B256::from(topics[1]),
            player: Address::from_slice(&topics[2][12..32]),
            amount: U256::from_be_slice(&data[..32]),
            block_number,
            log_index,
        };

        if signature == IBullionVault::Deposited::SIGNATURE_HASH {
            Some(SettlementEvent::Deposited(transfer))
        } else if signature == IBullionVault::ExitRedeemed::SIGNATURE_HASH {
            Some(SettlementEvent::ExitRedeemed(transfer))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_log(signature: B256, id: u8, player: Address, amount: u64) -> ([[u8; 32]; 3], Vec<u8>) {
        let mut player_topic = [0u8; 32];
        player_topic[12..].copy_from_slice(player.as_slice());
        let topics = [signature.0, [id; 32], player_topic];
        (topics, U256::from(amount).to_be_bytes::<32>().to_vec())
    }

    #[test]
    fn test_parse_deposit() {
        let player = Address::repeat_byte(7);
        let (topics, data) = raw_log(IBullionVault::Deposited::SIGNATURE_HASH, 1, player, 500);

        let event = EventParser::parse(&topics, &data, 12345, 3).unwrap();
        let SettlementEvent::Deposited(t) = event else {
            panic!("Wrong event type");
        };
        assert_eq!(t.player, player);
        assert_eq!(t.amount, U256::from(500));
        assert_eq!(t.event_id, B256::repeat_byte(1));
        assert_eq!(t.block_number, 12345);
        assert_eq!(t.wallet(), "0x0707070707070707070707070707070707070707");
    }

    #[test]
    fn test_parse_redeem_and_reject_foreign() {
        let player = Address::repeat_byte(2);
        let (topics, data) = raw_log(IBullionVault::ExitRedeemed::SIGNATURE_HASH, 9, player, 1);
        assert!(matches!(
            EventParser::parse(&topics, &data, 1, 0),
            Some(SettlementEvent::ExitRedeemed(_))
        ));

        let (topics, data) = raw_log(B256::ZERO, 9, player, 1);
        assert_eq!(EventParser::parse(&topics, &data, 1, 0), None);
        assert_eq!(EventParser::parse(&topics[..2], &data, 1, 0), None);
    }
}
