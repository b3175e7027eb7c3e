//! # Reservations
//!
//! Two budgets on top of the [`Ledger`]:
//!
//! - the **pellet reserve**, credited from deposits and recycled mass,
//!   spent one pellet at a time with a compare-and-decrement;
//! - the **exit escrow**, which sets bankroll aside for a session that
//!   started leaving so its payout cannot be spent twice.
//!
//! ```text
//!            reserve_exit               commit_exit
//! bankroll ───────────────► reserved ───────────────► exit_pool ──► pending_exit:{wallet}
//!     ▲                        │                                 (withdraw_with_ticket)
//!     └──── release / sweep ───┘
//! ```
//!
//! The observed bankroll (`bankroll + reserved_total`) is unchanged by
//! reserve and release.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::LedgerResult;
use crate::ledger::{accounts, Ledger};
use crate::store::{parse_amount, WriteOp};

/// Escrow held for one exiting session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Amount moved out of the bankroll.
    pub amount: u64,
    /// Unix seconds after which a sweep may release it.
    pub expires_at: u64,
}

/// Pellet budget and exit escrow for one server scope.
#[derive(Clone)]
pub struct ReservationService {
    ledger: Ledger,
}

impl ReservationService {
    /// Service sharing `ledger`'s store and scope.
    #[must_use]
    pub const fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }

    /// Underlying ledger.
    #[must_use]
    pub const fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    // =========================================================================
    // PELLET RESERVE
    // =========================================================================

    /// Current pellet budget.
    ///
    /// # Errors
    ///
    /// Store failure.
    pub fn pellet_reserve(&self) -> LedgerResult<u64> {
        self.ledger.balance(accounts::PELLET_RESERVE)
    }

    /// Adds to the pellet budget; returns the new budget.
    ///
    /// # Errors
    ///
    /// As [`Ledger::deposit`].
    pub fn credit_pellet_reserve(&self, amount: u64, key: Option<&str>) -> LedgerResult<u64> {
        self.ledger.deposit(accounts::PELLET_RESERVE, amount, key)
    }

    /// Takes `cost` from the pellet budget if it is there.
    ///
    /// # Errors
    ///
    /// `InvalidAmount` or a store failure.
    pub fn spend_pellet(&self, cost: u64) -> LedgerResult<bool> {
        self.ledger.validate_amount(cost)?;
        if cost == 0 {
            return Ok(true);
        }
        let key = self.ledger.keys().balance(accounts::PELLET_RESERVE);
        Ok(self.ledger.store().decr_if_at_least(&key, cost)?.is_some())
    }

    // =========================================================================
    // EXIT ESCROW
    // =========================================================================

    /// Unreserved bankroll.
    ///
    /// # Errors
    ///
    /// Store failure.
    pub fn bankroll(&self) -> LedgerResult<u64> {
        self.ledger.balance(accounts::BANKROLL)
    }

    /// Sum of live reservations.
    ///
    /// # Errors
    ///
    /// Store failure.
    pub fn reserved_total(&self) -> LedgerResult<u64> {
        let key = self.ledger.keys().reserved_total();
        let value = self.ledger.store().get(&key)?;
        Ok(parse_amount(&key, value.as_deref())?)
    }

    /// Bankroll including what is held in escrow.
    ///
    /// # Errors
    ///
    /// Store failure.
    pub fn observed_bankroll(&self) -> LedgerResult<u64> {
        Ok(self.bankroll()?.saturating_add(self.reserved_total()?))
    }

    /// Live reservation for `session_id`, if any.
    ///
    /// # Errors
    ///
    /// Store failure or an undecodable record.
    pub fn reservation(&self, session_id: &str) -> LedgerResult<Option<Reservation>> {
        let key = self.ledger.keys().reservation(session_id);
        match self.ledger.store().get(&key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Escrows `amount` for `session_id` until `now_secs + ttl_secs`.
    ///
    /// False when the session already holds a reservation or the bankroll
    /// cannot cover it.
    ///
    /// # Errors
    ///
    /// `InvalidAmount`, `ContentionExhausted` or a store failure.
    pub fn reserve_exit(&self, session_id: &str, amount: u64, ttl_secs: u64, now_secs: u64) -> LedgerResult<bool> {
        let delta = self.ledger.validate_amount(amount)?;
        let keys = self.ledger.keys();
        let res_key = keys.reservation(session_id);
        let bankroll = keys.balance(accounts::BANKROLL);
        let reserved = keys.reserved_total();
        let expiry = keys.expiry_index();
        let reservation = Reservation {
            amount,
            expires_at: now_secs.saturating_add(ttl_secs),
        };
        let record = serde_json::to_string(&reservation)?;

        let watch = [res_key.clone(), bankroll.clone(), reserved.clone()];
        let ok = self.ledger.commit_with_retry(&watch, |values| {
            if values[0].is_some() {
                return Ok((false, Vec::new()));
            }
            let available = parse_amount(&bankroll, values[1].as_deref())?;
            if available < amount {
                return Ok((false, Vec::new()));
            }
            Ok((
                true,
                vec![
                    WriteOp::IncrBy { key: bankroll.clone(), delta: -delta },
                    WriteOp::IncrBy { key: reserved.clone(), delta },
                    WriteOp::Set { key: res_key.clone(), value: record.clone(), ttl_secs: None },
                    WriteOp::ZAdd {
                        key: expiry.clone(),
                        member: session_id.to_string(),
                        score: reservation.expires_at,
                    },
                ],
            ))
        })?;
        debug!(server_id = %self.ledger.server_id(), session_id, amount, ok, "reserve exit");
        Ok(ok)
    }

    /// Returns the session's escrow to the bankroll. False when there is
    /// none.
    ///
    /// # Errors
    ///
    /// `ContentionExhausted` or a store failure.
    pub fn release_exit(&self, session_id: &str) -> LedgerResult<bool> {
        self.release(session_id, None)
    }

    /// Moves the session's escrow into the exit pool and records the commit;
    /// returns the amount. A repeated call returns the recorded amount
    /// without moving anything. `None` when the session has neither a
    /// reservation nor a recorded commit (never reserved, or swept).
    ///
    /// # Errors
    ///
    /// `ContentionExhausted` or a store failure.
    pub fn commit_exit(&self, session_id: &str) -> LedgerResult<Option<u64>> {
        let keys = self.ledger.keys();
        let res_key = keys.reservation(session_id);
        let marker = keys.exit_committed(session_id);
        let reserved = keys.reserved_total();
        let pool = keys.balance(accounts::EXIT_POOL);
        let expiry = keys.expiry_index();
        let marker_ttl = self.ledger.config().idempotency_ttl_secs;

        let watch = [res_key.clone(), marker.clone(), reserved.clone(), pool.clone()];
        let committed = self.ledger.commit_with_retry(&watch, |values| {
            let Some(raw) = &values[0] else {
                let earlier = values[1]
                    .as_deref()
                    .map(|v| parse_amount(&marker, Some(v)))
                    .transpose()?;
                return Ok((earlier, Vec::new()));
            };
            let reservation: Reservation = serde_json::from_str(raw)?;
            let delta = self.ledger.validate_amount(reservation.amount)?;
            Ok((
                Some(reservation.amount),
                vec![
                    WriteOp::IncrBy { key: reserved.clone(), delta: -delta },
                    WriteOp::IncrBy { key: pool.clone(), delta },
                    WriteOp::Delete { key: res_key.clone() },
                    WriteOp::ZRem { key: expiry.clone(), member: session_id.to_string() },
                    WriteOp::Set {
                        key: marker.clone(),
                        value: reservation.amount.to_string(),
                        ttl_secs: marker_ttl,
                    },
                ],
            ))
        })?;
        debug!(server_id = %self.ledger.server_id(), session_id, ?committed, "commit exit");
        Ok(committed)
    }

    /// Releases up to `limit` reservations whose expiry is at or before
    /// `now_secs`; returns how many were released. Safe to run concurrently
    /// and repeatedly.
    ///
    /// # Errors
    ///
    /// `ContentionExhausted` or a store failure.
    pub fn sweep_expired_reservations(&self, now_secs: u64, limit: usize) -> LedgerResult<usize> {
        let expiry = self.ledger.keys().expiry_index();
        let due = self.ledger.store().zrange_by_score(&expiry, now_secs, limit)?;

        let mut released = 0;
        for session_id in &due {
            if self.release(session_id, Some(now_secs))? {
                released += 1;
            }
        }
        if released > 0 {
            info!(server_id = %self.ledger.server_id(), released, "swept expired reservations");
        }
        Ok(released)
    }

    /// Release gated on existence and, when `expired_at` is set, on the
    /// record having expired by then. A missing record drops any stale
    /// index entry.
    fn release(&self, session_id: &str, expired_at: Option<u64>) -> LedgerResult<bool> {
        let keys = self.ledger.keys();
        let res_key = keys.reservation(session_id);
        let bankroll = keys.balance(accounts::BANKROLL);
        let reserved = keys.reserved_total();
        let expiry = keys.expiry_index();
        let unindex = WriteOp::ZRem {
            key: expiry,
            member: session_id.to_string(),
        };

        let watch = [res_key.clone(), bankroll.clone(), reserved.clone()];
        let ok = self.ledger.commit_with_retry(&watch, |values| {
            let Some(raw) = &values[0] else {
                return Ok((false, vec![unindex.clone()]));
            };
            let reservation: Reservation = serde_json::from_str(raw)?;
            if expired_at.is_some_and(|now| reservation.expires_at > now) {
                return Ok((false, Vec::new()));
            }
            let delta = self.ledger.validate_amount(reservation.amount)?;
            Ok((
                true,
                vec![
                    WriteOp::IncrBy { key: bankroll.clone(), delta },
                    WriteOp::IncrBy { key: reserved.clone(), delta: -delta },
                    WriteOp::Delete { key: res_key.clone() },
                    unindex.clone(),
                ],
            ))
        })?;
        if ok {
            debug!(server_id = %self.ledger.server_id(), session_id, "released exit reservation");
        }
        Ok(ok)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::LedgerConfig;
    use crate::store::MemoryStore;

    fn service() -> ReservationService {
        let store = Arc::new(MemoryStore::new());
        let ledger = Ledger::new(store, "room-1", LedgerConfig::default()).unwrap();
        ReservationService::new(ledger)
    }

    #[test]
    fn test_reserve_needs_bankroll() {
        let svc = service();
        svc.ledger().deposit(accounts::BANKROLL, 40, None).unwrap();
        assert!(!svc.reserve_exit("s1", 50, 900, 1_000).unwrap());

        svc.ledger().deposit(accounts::BANKROLL, 60, None).unwrap();
        assert!(svc.reserve_exit("s1", 50, 900, 1_000).unwrap());
        assert_eq!(svc.bankroll().unwrap(), 50);
        assert_eq!(svc.reserved_total().unwrap(), 50);
        assert_eq!(svc.observed_bankroll().unwrap(), 100);
        assert_eq!(
            svc.reservation("s1").unwrap(),
            Some(Reservation { amount: 50, expires_at: 1_900 })
        );
    }

    #[test]
    fn test_one_reservation_per_session() {
        let svc = service();
        svc.ledger().deposit(accounts::BANKROLL, 100, None).unwrap();
        assert!(svc.reserve_exit("s1", 10, 900, 0).unwrap());
        assert!(!svc.reserve_exit("s1", 10, 900, 0).unwrap());
        assert_eq!(svc.reserved_total().unwrap(), 10);
    }

    #[test]
    fn test_release_restores_exactly() {
        let svc = service();
        svc.ledger().deposit(accounts::BANKROLL, 100, None).unwrap();
        svc.reserve_exit("s1", 35, 900, 0).unwrap();

        assert!(svc.release_exit("s1").unwrap());
        assert!(!svc.release_exit("s1").unwrap());
        assert_eq!(svc.bankroll().unwrap(), 100);
        assert_eq!(svc.reserved_total().unwrap(), 0);
        assert_eq!(svc.reservation("s1").unwrap(), None);
    }

    #[test]
    fn test_commit_moves_into_exit_pool() {
        let svc = service();
        svc.ledger().deposit(accounts::BANKROLL, 100, None).unwrap();
        svc.reserve_exit("s1", 70, 900, 0).unwrap();

        assert_eq!(svc.commit_exit("s1").unwrap(), Some(70));
        assert_eq!(svc.commit_exit("s1").unwrap(), Some(70));
        assert_eq!(svc.bankroll().unwrap(), 30);
        assert_eq!(svc.reserved_total().unwrap(), 0);
        assert_eq!(svc.ledger().balance(accounts::EXIT_POOL).unwrap(), 70);
    }

    #[test]
    fn test_commit_after_sweep_finds_nothing() {
        let svc = service();
        svc.ledger().deposit(accounts::BANKROLL, 100, None).unwrap();
        svc.reserve_exit("s1", 40, 10, 0).unwrap();

        assert_eq!(svc.sweep_expired_reservations(60, 8).unwrap(), 1);
        assert_eq!(svc.commit_exit("s1").unwrap(), None);
        assert_eq!(svc.commit_exit("never").unwrap(), None);
        assert_eq!(svc.bankroll().unwrap(), 100);
        assert_eq!(svc.ledger().balance(accounts::EXIT_POOL).unwrap(), 0);
    }

    #[test]
    fn test_sweep_only_expired_and_only_once() {
        let svc = service();
        svc.ledger().deposit(accounts::BANKROLL, 100, None).unwrap();
        svc.reserve_exit("early", 10, 100, 0).unwrap();
        svc.reserve_exit("late", 20, 500, 0).unwrap();

        assert_eq!(svc.sweep_expired_reservations(200, 10).unwrap(), 1);
        assert_eq!(svc.sweep_expired_reservations(200, 10).unwrap(), 0);
        assert_eq!(svc.bankroll().unwrap(), 80);
        assert_eq!(svc.reserved_total().unwrap(), 20);

        assert_eq!(svc.sweep_expired_reservations(500, 10).unwrap(), 1);
        assert_eq!(svc.bankroll().unwrap(), 100);
        assert_eq!(svc.reserved_total().unwrap(), 0);
    }

    #[test]
    fn test_spend_pellet_never_overdraws() {
        let svc = service();
        svc.credit_pellet_reserve(12, Some("recycle:1")).unwrap();
        svc.credit_pellet_reserve(12, Some("recycle:1")).unwrap();
        assert!(svc.spend_pellet(5).unwrap());
        assert!(svc.spend_pellet(5).unwrap());
        assert!(!svc.spend_pellet(5).unwrap());
        assert_eq!(svc.pellet_reserve().unwrap(), 2);
    }
}
