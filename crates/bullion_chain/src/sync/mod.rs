//! # Settlement Sync
//!
//! Applies observed vault events to the ledger. Each effect is keyed on the
//! event id, so re-delivered or re-ordered events never double-apply.
//!
//! | Event          | Effect                                                       |
//! |----------------|--------------------------------------------------------------|
//! | `Deposited`    | `stake:{wallet}` +amount, `bankroll` +amount, `pellet_reserve` +share |
//! | `ExitRedeemed` | `pending_exit:{wallet}` -amount                              |
//! | `NewBlock`     | last block only                                              |

use alloy_primitives::U256;
use bullion_economy::{accounts, Ledger};
use tracing::{debug, warn};

use crate::error::{ChainError, ChainResult};
use crate::events::{SettlementEvent, VaultTransfer};
use crate::queue::SettlementQueue;

/// Default share of every deposit earmarked for pellets (5%).
pub const DEFAULT_PELLET_SHARE_BPS: u64 = 500;

/// Ledger-side view of the vault.
pub struct SettlementSync {
    ledger: Ledger,
    pellet_share_bps: u64,
    last_block: u64,
    events_applied: u64,
    drift_events: u64,
}

impl SettlementSync {
    /// Sync writing into `ledger`.
    #[must_use]
    pub const fn new(ledger: Ledger, pellet_share_bps: u64) -> Self {
        Self {
            ledger,
            pellet_share_bps,
            last_block: 0,
            events_applied: 0,
            drift_events: 0,
        }
    }

    /// Returns the last processed block number.
    #[inline]
    #[must_use]
    pub const fn last_block(&self) -> u64 {
        self.last_block
    }

    /// Returns the number of events applied.
    #[inline]
    #[must_use]
    pub const fn events_applied(&self) -> u64 {
        self.events_applied
    }

    /// Redemptions the ledger could not match with a pending exit.
    #[inline]
    #[must_use]
    pub const fn drift_events(&self) -> u64 {
        self.drift_events
    }

    /// Processes a settlement event.
    ///
    /// # Errors
    ///
    /// `AmountOutOfRange` or a ledger failure. Nothing is partially applied
    /// per effect; a failed event can be re-applied as a whole.
    pub fn apply(&mut self, event: &SettlementEvent) -> ChainResult<()> {
        match event {
            SettlementEvent::Deposited(transfer) => self.apply_deposit(transfer)?,
            SettlementEvent::ExitRedeemed(transfer) => self.apply_redeem(transfer)?,
            SettlementEvent::NewBlock(_) => {}
        }
        self.last_block = self.last_block.max(event.block_number());
        self.events_applied += 1;
        Ok(())
    }

    /// Applies everything waiting in `queue`; returns how many were applied.
    ///
    /// # Errors
    ///
    /// Stops at the first failing event, which is lost from the queue and
    /// must be re-delivered by the producer.
    pub fn drain(&mut self, queue: &SettlementQueue) -> ChainResult<usize> {
        let mut applied = 0;
        while let Some(event) = queue.try_pop() {
            self.apply(&event)?;
            applied += 1;
        }
        Ok(applied)
    }

    fn apply_deposit(&mut self, transfer: &VaultTransfer) -> ChainResult<()> {
        let amount = ledger_amount(transfer.amount)?;
        let wallet = transfer.wallet();
        let share = pellet_share(amount, self.pellet_share_bps);

        self.ledger
            .deposit(&accounts::stake(&wallet), amount, Some(&transfer.key("stake")))?;
        self.ledger
            .deposit(accounts::BANKROLL, amount, Some(&transfer.key("bankroll")))?;
        self.ledger
            .deposit(accounts::PELLET_RESERVE, share, Some(&transfer.key("pellet")))?;

        debug!(wallet = %wallet, amount, share, block = transfer.block_number, "deposit settled");
        Ok(())
    }

    fn apply_redeem(&mut self, transfer: &VaultTransfer) -> ChainResult<()> {
        let amount = ledger_amount(transfer.amount)?;
        let wallet = transfer.wallet();

        let burned = self.ledger.burn(
            &accounts::pending_exit(&wallet),
            amount,
            Some(&transfer.key("redeem")),
        )?;
        if burned {
            debug!(wallet = %wallet, amount, block = transfer.block_number, "exit redeemed");
        } else {
            // Detected, not corrected: reconciliation decides.
            self.drift_events += 1;
            warn!(wallet = %wallet, amount, event_id = %transfer.event_id, "redemption without matching pending exit");
        }
        Ok(())
    }
}

fn ledger_amount(amount: U256) -> ChainResult<u64> {
    u64::try_from(amount).map_err(|_| ChainError::AmountOutOfRange(amount))
}

fn pellet_share(amount: u64, bps: u64) -> u64 {
    let share = u128::from(amount) * u128::from(bps) / 10_000;
    u64::try_from(share).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use alloy_primitives::{Address, B256};
    use bullion_economy::{LedgerConfig, MemoryStore};

    use super::*;

    fn sync() -> SettlementSync {
        let store = Arc::new(MemoryStore::new());
        let ledger = Ledger::new(store, "room-1", LedgerConfig::default()).unwrap();
        SettlementSync::new(ledger, DEFAULT_PELLET_SHARE_BPS)
    }

    fn transfer(id: u8, amount: u64, block: u64) -> VaultTransfer {
        VaultTransfer {
            event_id: B256::repeat_byte(id),
            player: Address::repeat_byte(0xaa),
            amount: U256::from(amount),
            block_number: block,
            log_index: 0,
        }
    }

    #[test]
    fn test_deposit_applies_once() {
        let mut sync = sync();
        let event = SettlementEvent::Deposited(transfer(1, 10_000, 5));
        sync.apply(&event).unwrap();
        sync.apply(&event).unwrap();

        let wallet = transfer(1, 0, 0).wallet();
        let ledger = &sync.ledger;
        assert_eq!(ledger.balance(&accounts::stake(&wallet)).unwrap(), 10_000);
        assert_eq!(ledger.balance(accounts::BANKROLL).unwrap(), 10_000);
        assert_eq!(ledger.balance(accounts::PELLET_RESERVE).unwrap(), 500);
        assert_eq!(sync.last_block(), 5);
    }

    #[test]
    fn test_redeem_without_pending_is_drift() {
        let mut sync = sync();
        sync.apply(&SettlementEvent::ExitRedeemed(transfer(2, 50, 9))).unwrap();
        assert_eq!(sync.drift_events(), 1);
        assert_eq!(sync.last_block(), 9);
    }

    #[test]
    fn test_oversized_amount_rejected() {
        let mut sync = sync();
        let mut big = transfer(3, 0, 1);
        big.amount = U256::MAX;
        assert!(matches!(
            sync.apply(&SettlementEvent::Deposited(big)),
            Err(ChainError::AmountOutOfRange(_))
        ));
        assert_eq!(sync.events_applied(), 0);
    }

    #[test]
    fn test_share_math() {
        assert_eq!(pellet_share(10_000, 500), 500);
        assert_eq!(pellet_share(19, 500), 0);
        assert_eq!(pellet_share(u64::MAX, 10_000), u64::MAX);
    }
}
