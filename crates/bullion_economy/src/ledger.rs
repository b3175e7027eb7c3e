//! # The Ledger
//!
//! Account balances for one server scope, held in a shared [`KvStore`].
//!
//! ## Exactly Once
//!
//! Every mutating call takes an optional idempotency key.
//!
//! ```text
//! with key:    cached?  ──yes──► same op? ──yes──► cached outcome
//!                 │                 └──no───► IdempotencyConflict
//!                 no
//!                 ▼
//!              watch [idem, accounts...] ─► decide ─► commit {balances + record}
//!                 ▲                                        │
//!                 └────────── conflict (jittered retry) ◄──┘
//!
//! without key: one atomic store call, no record, no retry ("fire once")
//! ```
//!
//! Failed outcomes (`false`, `None`) are recorded too: a retry after a
//! refusal stays refused even if funds arrived in between.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::store::{parse_amount, KvStore, TxOutcome, WriteOp};
use crate::ticket::{ExitRequest, ExitTicket, TicketClaim, TicketSigner};

/// Well-known account names.
pub mod accounts {
    /// Liquidity backing exit payouts.
    pub const BANKROLL: &str = "bankroll";
    /// Spend budget for pellets.
    pub const PELLET_RESERVE: &str = "pellet_reserve";
    /// Reserved exits waiting for a ticket.
    pub const EXIT_POOL: &str = "exit_pool";

    /// Ticketed payouts waiting for on-chain redemption.
    #[must_use]
    pub fn pending_exit(wallet: &str) -> String {
        format!("pending_exit:{}", wallet.to_ascii_lowercase())
    }

    /// Deposited funds not yet staked into a room.
    #[must_use]
    pub fn stake(wallet: &str) -> String {
        format!("stake:{}", wallet.to_ascii_lowercase())
    }
}

/// Current unix time in seconds.
#[must_use]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

/// Store key layout for one server scope.
#[derive(Clone, Debug)]
pub(crate) struct Keys {
    prefix: String,
}

impl Keys {
    fn new(namespace: &str, server_id: &str) -> Self {
        Self {
            prefix: format!("{namespace}:{server_id}:"),
        }
    }

    pub(crate) fn balance(&self, account: &str) -> String {
        format!("{}bal:{account}", self.prefix)
    }

    pub(crate) fn idempotency(&self, key: &str) -> String {
        format!("{}idem:{key}", self.prefix)
    }

    pub(crate) fn reserved_total(&self) -> String {
        format!("{}exit:reserved_total", self.prefix)
    }

    pub(crate) fn reservation(&self, session_id: &str) -> String {
        format!("{}exit:res:{session_id}", self.prefix)
    }

    pub(crate) fn exit_committed(&self, session_id: &str) -> String {
        format!("{}exit:committed:{session_id}", self.prefix)
    }

    pub(crate) fn expiry_index(&self) -> String {
        format!("{}exit:expiry", self.prefix)
    }
}

/// Operation recorded against an idempotency key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    /// Credit.
    Deposit,
    /// Debit into the void (recycled mass, stake buy-in).
    Burn,
    /// Debit paid out elsewhere.
    Withdraw,
    /// Account to account.
    Transfer,
    /// Exit pool to pending exit, plus a signed ticket.
    WithdrawWithTicket,
}

impl OpKind {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Burn => "burn",
            Self::Withdraw => "withdraw",
            Self::Transfer => "transfer",
            Self::WithdrawWithTicket => "withdraw_with_ticket",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct IdempotencyRecord {
    op: OpKind,
    outcome: serde_json::Value,
}

/// Balances for one server scope.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn KvStore>,
    config: Arc<LedgerConfig>,
    server_id: String,
    keys: Keys,
}

impl Ledger {
    /// Ledger for `server_id` over `store`.
    ///
    /// # Errors
    ///
    /// Invalid config or a server id containing ':'.
    pub fn new(store: Arc<dyn KvStore>, server_id: &str, config: LedgerConfig) -> LedgerResult<Self> {
        config.validate()?;
        if server_id.is_empty() || server_id.contains(':') {
            return Err(LedgerError::InvalidConfig(format!(
                "server id {server_id:?} must be non-empty and contain no ':'"
            )));
        }
        Ok(Self {
            keys: Keys::new(&config.namespace, server_id),
            store,
            config: Arc::new(config),
            server_id: server_id.to_string(),
        })
    }

    /// Server scope.
    #[must_use]
    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Tuning in use.
    #[must_use]
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub(crate) fn store(&self) -> &dyn KvStore {
        self.store.as_ref()
    }

    pub(crate) const fn keys(&self) -> &Keys {
        &self.keys
    }

    /// Ticket deadline for a ticket issued at `now_secs`.
    #[must_use]
    pub fn ticket_deadline(&self, now_secs: u64) -> u64 {
        now_secs.saturating_add(self.config.ticket_ttl_secs)
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Balance of `account`; unknown accounts hold 0.
    ///
    /// # Errors
    ///
    /// Store failure or a corrupt value.
    pub fn balance(&self, account: &str) -> LedgerResult<u64> {
        let key = self.keys.balance(account);
        let value = self.store.get(&key)?;
        Ok(parse_amount(&key, value.as_deref())?)
    }

    // =========================================================================
    // MUTATIONS
    // =========================================================================

    /// Credits `amount`; returns the new balance. Zero is a no-op.
    ///
    /// # Errors
    ///
    /// `InvalidAmount`, `IdempotencyConflict`, `ContentionExhausted` or a
    /// store failure.
    pub fn deposit(&self, account: &str, amount: u64, key: Option<&str>) -> LedgerResult<u64> {
        let delta = self.validate_amount(amount)?;
        if amount == 0 {
            return self.balance(account);
        }
        let bal = self.keys.balance(account);

        let new_balance = match key {
            None => {
                let raw = self.store.incr_by(&bal, delta)?;
                parse_amount(&bal, Some(&raw.to_string()))?
            }
            Some(k) => self.idempotent(OpKind::Deposit, k, vec![bal.clone()], |values| {
                let current = parse_amount(&bal, values[0].as_deref())?;
                let writes = vec![WriteOp::IncrBy { key: bal.clone(), delta }];
                Ok((current + amount, writes))
            })?,
        };
        debug!(server_id = %self.server_id, account, amount, new_balance, "deposit");
        Ok(new_balance)
    }

    /// Debits `amount` without crediting anything. False (and no change)
    /// when the balance is short.
    ///
    /// # Errors
    ///
    /// As [`Ledger::deposit`].
    pub fn burn(&self, account: &str, amount: u64, key: Option<&str>) -> LedgerResult<bool> {
        self.debit(OpKind::Burn, account, amount, key)
    }

    /// Debits `amount` paid out through some external channel. Same rules
    /// as [`Ledger::burn`], recorded as a different operation.
    ///
    /// # Errors
    ///
    /// As [`Ledger::deposit`].
    pub fn withdraw(&self, account: &str, amount: u64, key: Option<&str>) -> LedgerResult<bool> {
        self.debit(OpKind::Withdraw, account, amount, key)
    }

    fn debit(&self, op: OpKind, account: &str, amount: u64, key: Option<&str>) -> LedgerResult<bool> {
        let delta = self.validate_amount(amount)?;
        if amount == 0 {
            return Ok(true);
        }
        let bal = self.keys.balance(account);

        let ok = match key {
            None => self.store.decr_if_at_least(&bal, amount)?.is_some(),
            Some(k) => self.idempotent(op, k, vec![bal.clone()], |values| {
                let current = parse_amount(&bal, values[0].as_deref())?;
                if current < amount {
                    return Ok((false, Vec::new()));
                }
                Ok((true, vec![WriteOp::IncrBy { key: bal.clone(), delta: -delta }]))
            })?,
        };
        debug!(server_id = %self.server_id, op = op.as_str(), account, amount, ok, "debit");
        Ok(ok)
    }

    /// Moves `amount` from `from` to `to`. False (and no change) when `from`
    /// is short.
    ///
    /// # Errors
    ///
    /// As [`Ledger::deposit`].
    pub fn transfer(&self, from: &str, to: &str, amount: u64, key: Option<&str>) -> LedgerResult<bool> {
        let delta = self.validate_amount(amount)?;
        if amount == 0 {
            return Ok(true);
        }
        if from == to {
            return Ok(self.balance(from)? >= amount);
        }
        let (src, dst) = (self.keys.balance(from), self.keys.balance(to));

        let ok = match key {
            None => self.store.move_if_at_least(&src, &dst, amount)?.is_some(),
            Some(k) => self.idempotent(OpKind::Transfer, k, vec![src.clone(), dst.clone()], |values| {
                let current = parse_amount(&src, values[0].as_deref())?;
                if current < amount {
                    return Ok((false, Vec::new()));
                }
                Ok((
                    true,
                    vec![
                        WriteOp::IncrBy { key: src.clone(), delta: -delta },
                        WriteOp::IncrBy { key: dst.clone(), delta },
                    ],
                ))
            })?,
        };
        debug!(server_id = %self.server_id, from, to, amount, ok, "transfer");
        Ok(ok)
    }

    /// Exit settlement: moves the payout from the exit pool into the
    /// wallet's pending-exit account and returns a signed ticket. `None`
    /// when the pool is short.
    ///
    /// # Errors
    ///
    /// As [`Ledger::deposit`], plus `Signing`.
    pub fn withdraw_with_ticket(
        &self,
        request: &ExitRequest,
        signer: &dyn TicketSigner,
        key: Option<&str>,
    ) -> LedgerResult<Option<ExitTicket>> {
        let delta = self.validate_amount(request.amount)?;
        let claim = TicketClaim {
            server_id: self.server_id.clone(),
            session_id: request.session_id.clone(),
            player: request.wallet.clone(),
            amount: request.amount,
            deadline: request.deadline,
        };
        let signature = signer.sign(&claim)?;
        let ticket = ExitTicket { claim, signature };

        let pool = self.keys.balance(accounts::EXIT_POOL);
        let pending = self.keys.balance(&accounts::pending_exit(&request.wallet));
        let amount = request.amount;

        let issued = match key {
            None => self
                .store
                .move_if_at_least(&pool, &pending, amount)?
                .map(|_| ticket),
            Some(k) => self.idempotent(
                OpKind::WithdrawWithTicket,
                k,
                vec![pool.clone(), pending.clone()],
                |values| {
                    let available = parse_amount(&pool, values[0].as_deref())?;
                    if available < amount {
                        return Ok((None, Vec::new()));
                    }
                    Ok((
                        Some(ticket.clone()),
                        vec![
                            WriteOp::IncrBy { key: pool.clone(), delta: -delta },
                            WriteOp::IncrBy { key: pending.clone(), delta },
                        ],
                    ))
                },
            )?,
        };

        if issued.is_some() {
            debug!(server_id = %self.server_id, session_id = %request.session_id, amount, "exit ticket issued");
        } else {
            warn!(server_id = %self.server_id, session_id = %request.session_id, amount, "exit pool short, no ticket");
        }
        Ok(issued)
    }

    // =========================================================================
    // MACHINERY
    // =========================================================================

    pub(crate) fn validate_amount(&self, amount: u64) -> LedgerResult<i64> {
        let max = self.config.max_amount;
        if amount > max {
            return Err(LedgerError::InvalidAmount { amount, max });
        }
        i64::try_from(amount).map_err(|_| LedgerError::InvalidAmount { amount, max })
    }

    /// Runs `decide` under the idempotency protocol. `decide` sees the
    /// watched account values (not the record) and returns the outcome plus
    /// the balance writes; the record write is added here.
    fn idempotent<T, F>(&self, op: OpKind, key: &str, accounts: Vec<String>, mut decide: F) -> LedgerResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut(&[Option<String>]) -> LedgerResult<(T, Vec<WriteOp>)>,
    {
        let idem = self.keys.idempotency(key);
        if let Some(raw) = self.store.get(&idem)? {
            return Self::replay(op, key, &raw);
        }

        let ttl_secs = self.config.idempotency_ttl_secs;
        let mut watch = Vec::with_capacity(accounts.len() + 1);
        watch.push(idem.clone());
        watch.extend(accounts);

        self.commit_with_retry(&watch, |values| {
            // Another caller with the same key committed since the pre-check.
            if let Some(raw) = &values[0] {
                return Ok((Self::replay(op, key, raw)?, Vec::new()));
            }
            let (outcome, mut writes) = decide(&values[1..])?;
            let record = IdempotencyRecord {
                op,
                outcome: serde_json::to_value(&outcome)?,
            };
            writes.push(WriteOp::Set {
                key: idem.clone(),
                value: serde_json::to_string(&record)?,
                ttl_secs,
            });
            Ok((outcome, writes))
        })
    }

    fn replay<T: DeserializeOwned>(op: OpKind, key: &str, raw: &str) -> LedgerResult<T> {
        let record: IdempotencyRecord = serde_json::from_str(raw)?;
        if record.op != op {
            error!(key, recorded = record.op.as_str(), requested = op.as_str(), "idempotency key reused");
            return Err(LedgerError::IdempotencyConflict {
                key: key.to_string(),
                recorded: record.op.as_str().to_string(),
                requested: op.as_str().to_string(),
            });
        }
        Ok(serde_json::from_value(record.outcome)?)
    }

    /// Optimistic loop: plan, commit if nothing watched changed, else back
    /// off and try again. Exhaustion is a hard failure.
    pub(crate) fn commit_with_retry<T, F>(&self, watch: &[String], mut decide: F) -> LedgerResult<T>
    where
        F: FnMut(&[Option<String>]) -> LedgerResult<(T, Vec<WriteOp>)>,
    {
        let attempts = self.config.max_attempts;
        for attempt in 1..=attempts {
            let mut decided: Option<LedgerResult<T>> = None;
            let outcome = self.store.transact(watch, &mut |values: &[Option<String>]| {
                match decide(values) {
                    Ok((value, writes)) => {
                        decided = Some(Ok(value));
                        writes
                    }
                    Err(e) => {
                        decided = Some(Err(e));
                        Vec::new()
                    }
                }
            })?;

            match (outcome, decided) {
                (TxOutcome::Committed, Some(result)) => return result,
                (_, Some(Err(e))) => return Err(e),
                _ => {
                    warn!(server_id = %self.server_id, attempt, "store contention, retrying");
                    self.backoff();
                }
            }
        }
        error!(server_id = %self.server_id, attempts, "store contention, giving up");
        Err(LedgerError::ContentionExhausted { attempts })
    }

    fn backoff(&self) {
        let (lo, hi) = (self.config.backoff_min_ms, self.config.backoff_max_ms);
        let ms = if hi > lo {
            rand::thread_rng().gen_range(lo..=hi)
        } else {
            lo
        };
        if ms > 0 {
            std::thread::sleep(Duration::from_millis(ms));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    struct EchoSigner;

    impl TicketSigner for EchoSigner {
        fn sign(&self, claim: &TicketClaim) -> LedgerResult<Vec<u8>> {
            Ok(claim.session_id.as_bytes().to_vec())
        }
    }

    fn ledger() -> (Arc<MemoryStore>, Ledger) {
        let store = Arc::new(MemoryStore::new());
        let config = LedgerConfig {
            backoff_min_ms: 0,
            backoff_max_ms: 0,
            ..LedgerConfig::default()
        };
        let ledger = Ledger::new(store.clone(), "room-1", config).unwrap();
        (store, ledger)
    }

    #[test]
    fn test_deposit_twice_with_key_credits_once() {
        let (_, ledger) = ledger();
        assert_eq!(ledger.deposit("acc1", 100, Some("k1")).unwrap(), 100);
        assert_eq!(ledger.deposit("acc1", 100, Some("k1")).unwrap(), 100);
        assert_eq!(ledger.balance("acc1").unwrap(), 100);
    }

    #[test]
    fn test_deposit_without_key_is_fire_once() {
        let (_, ledger) = ledger();
        assert_eq!(ledger.deposit("acc1", 100, None).unwrap(), 100);
        assert_eq!(ledger.deposit("acc1", 100, None).unwrap(), 200);
        assert_eq!(ledger.deposit("acc1", 0, Some("zero")).unwrap(), 200);
    }

    #[test]
    fn test_transfer_short_changes_nothing() {
        let (_, ledger) = ledger();
        ledger.deposit("a", 30, None).unwrap();
        assert!(!ledger.transfer("a", "b", 50, Some("t1")).unwrap());
        assert_eq!(ledger.balance("a").unwrap(), 30);
        assert_eq!(ledger.balance("b").unwrap(), 0);

        // The refusal is cached, even after funds arrive.
        ledger.deposit("a", 100, None).unwrap();
        assert!(!ledger.transfer("a", "b", 50, Some("t1")).unwrap());
        assert!(ledger.transfer("a", "b", 50, Some("t2")).unwrap());
        assert_eq!(ledger.balance("a").unwrap(), 80);
        assert_eq!(ledger.balance("b").unwrap(), 50);
    }

    #[test]
    fn test_burn_and_withdraw() {
        let (_, ledger) = ledger();
        ledger.deposit("a", 10, None).unwrap();
        assert!(!ledger.burn("a", 11, None).unwrap());
        assert!(ledger.burn("a", 4, Some("b1")).unwrap());
        assert!(ledger.burn("a", 4, Some("b1")).unwrap());
        assert!(ledger.withdraw("a", 6, None).unwrap());
        assert_eq!(ledger.balance("a").unwrap(), 0);
    }

    #[test]
    fn test_key_reuse_across_ops_fails() {
        let (_, ledger) = ledger();
        ledger.deposit("a", 10, Some("k")).unwrap();
        assert!(matches!(
            ledger.burn("a", 1, Some("k")),
            Err(LedgerError::IdempotencyConflict { .. })
        ));
        assert_eq!(ledger.balance("a").unwrap(), 10);
    }

    #[test]
    fn test_amount_ceiling() {
        let (_, ledger) = ledger();
        let max = ledger.config().max_amount;
        assert!(matches!(
            ledger.deposit("a", max + 1, None),
            Err(LedgerError::InvalidAmount { .. })
        ));
        assert_eq!(ledger.balance("a").unwrap(), 0);
    }

    #[test]
    fn test_contention_exhausts() {
        let (store, ledger) = ledger();
        store.inject_conflicts(ledger.config().max_attempts);
        assert!(matches!(
            ledger.deposit("a", 5, Some("k")),
            Err(LedgerError::ContentionExhausted { attempts: 8 })
        ));
        assert_eq!(ledger.balance("a").unwrap(), 0);

        // One fewer conflict than the budget still commits.
        store.inject_conflicts(ledger.config().max_attempts - 1);
        assert_eq!(ledger.deposit("a", 5, Some("k")).unwrap(), 5);
    }

    #[test]
    fn test_withdraw_with_ticket() {
        let (_, ledger) = ledger();
        let request = ExitRequest {
            wallet: "0xABC".into(),
            session_id: "s1".into(),
            amount: 70,
            deadline: 1_000,
        };
        assert_eq!(
            ledger.withdraw_with_ticket(&request, &EchoSigner, Some("x1")).unwrap(),
            None
        );

        ledger.deposit(accounts::EXIT_POOL, 100, None).unwrap();
        let ticket = ledger
            .withdraw_with_ticket(&request, &EchoSigner, Some("x2"))
            .unwrap()
            .unwrap();
        assert_eq!(ticket.claim.server_id, "room-1");
        assert_eq!(ticket.claim.amount, 70);
        assert_eq!(ticket.signature, b"s1".to_vec());

        let replay = ledger
            .withdraw_with_ticket(&request, &EchoSigner, Some("x2"))
            .unwrap();
        assert_eq!(replay, Some(ticket));
        assert_eq!(ledger.balance(accounts::EXIT_POOL).unwrap(), 30);
        assert_eq!(ledger.balance(&accounts::pending_exit("0xabc")).unwrap(), 70);
    }

    #[test]
    fn test_keys_are_scoped() {
        let keys = Keys::new("bullion", "room-1");
        assert_eq!(keys.balance("bankroll"), "bullion:room-1:bal:bankroll");
        assert_eq!(keys.idempotency("k"), "bullion:room-1:idem:k");
        assert_eq!(keys.reservation("s"), "bullion:room-1:exit:res:s");
        assert_eq!(keys.expiry_index(), "bullion:room-1:exit:expiry");
    }
}
