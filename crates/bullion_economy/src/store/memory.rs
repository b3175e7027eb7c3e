//! In-process store with the same atomicity rules as the shared one.
//!
//! Every key carries a version bumped on each write. `transact` reads values
//! and versions under the lock, releases it while the plan runs, then commits
//! only if every watched version is unchanged. Threads sharing one
//! `MemoryStore` therefore see real optimistic conflicts.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::trace;

use super::{parse_amount, parse_int, KvStore, Plan, TxOutcome, WriteOp};
use crate::error::{StoreError, StoreResult};

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

#[derive(Debug, Default)]
struct Inner {
    values: HashMap<String, Entry>,
    /// (score, member) ordered, per sorted set.
    zsets: HashMap<String, BTreeSet<(u64, String)>>,
    versions: HashMap<String, u64>,
}

impl Inner {
    fn bump(&mut self, key: &str) {
        *self.versions.entry(key.to_string()).or_insert(0) += 1;
    }

    fn version(&self, key: &str) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }

    fn read(&mut self, key: &str, now: Instant) -> Option<String> {
        let expired = self
            .values
            .get(key)
            .and_then(|e| e.expires_at)
            .is_some_and(|at| at <= now);
        if expired {
            self.values.remove(key);
            self.bump(key);
        }
        self.values.get(key).map(|e| e.value.clone())
    }

    fn write(&mut self, key: &str, value: String, ttl_secs: Option<u64>, now: Instant) {
        let expires_at = ttl_secs.map(|s| now + Duration::from_secs(s));
        self.values.insert(key.to_string(), Entry { value, expires_at });
        self.bump(key);
    }

    fn incr(&mut self, key: &str, delta: i64, now: Instant) -> StoreResult<i64> {
        let current = parse_int(key, self.read(key, now).as_deref())?;
        let next = current.checked_add(delta).ok_or_else(|| StoreError::Corrupt {
            key: key.to_string(),
            value: format!("{current} + {delta} overflows"),
        })?;
        let ttl = self.values.get(key).and_then(|e| e.expires_at);
        self.values.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at: ttl,
            },
        );
        self.bump(key);
        Ok(next)
    }

    fn apply(&mut self, op: WriteOp, now: Instant) -> StoreResult<()> {
        match op {
            WriteOp::Set { key, value, ttl_secs } => self.write(&key, value, ttl_secs, now),
            WriteOp::IncrBy { key, delta } => {
                self.incr(&key, delta, now)?;
            }
            WriteOp::Delete { key } => {
                self.values.remove(&key);
                self.bump(&key);
            }
            WriteOp::ZAdd { key, member, score } => {
                let set = self.zsets.entry(key.clone()).or_default();
                set.retain(|(_, m)| *m != member);
                set.insert((score, member));
                self.bump(&key);
            }
            WriteOp::ZRem { key, member } => {
                if let Some(set) = self.zsets.get_mut(&key) {
                    set.retain(|(_, m)| *m != member);
                }
                self.bump(&key);
            }
        }
        Ok(())
    }
}

/// Thread-safe in-memory [`KvStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    injected_conflicts: AtomicU32,
}

impl MemoryStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` transactions report a conflict, as if another
    /// writer touched a watched key.
    pub fn inject_conflicts(&self, count: u32) {
        self.injected_conflicts.store(count, Ordering::SeqCst);
    }

    /// Number of keys holding a value (expired keys may still count until
    /// read).
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().values.len()
    }

    /// True when no key holds a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn take_injected_conflict(&self) -> bool {
        self.injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.inner.lock().read(key, Instant::now()))
    }

    fn zrange_by_score(&self, key: &str, max_score: u64, limit: usize) -> StoreResult<Vec<String>> {
        let inner = self.inner.lock();
        Ok(inner
            .zsets
            .get(key)
            .map(|set| {
                set.iter()
                    .take_while(|(score, _)| *score <= max_score)
                    .take(limit)
                    .map(|(_, member)| member.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn transact(&self, watch: &[String], plan: &mut Plan<'_>) -> StoreResult<TxOutcome> {
        let (values, versions): (Vec<Option<String>>, Vec<u64>) = {
            let mut inner = self.inner.lock();
            let now = Instant::now();
            watch
                .iter()
                .map(|k| (inner.read(k, now), inner.version(k)))
                .unzip()
        };

        let writes = plan(values.as_slice());

        let mut inner = self.inner.lock();
        let changed = watch
            .iter()
            .zip(&versions)
            .any(|(k, v)| inner.version(k) != *v);
        if changed || self.take_injected_conflict() {
            trace!(keys = watch.len(), "transaction conflict");
            return Ok(TxOutcome::Conflict);
        }

        // Validate integer targets first so a bad value cannot half-apply.
        let now = Instant::now();
        for op in &writes {
            if let WriteOp::IncrBy { key, .. } = op {
                parse_int(key, inner.read(key, now).as_deref())?;
            }
        }
        for op in writes {
            inner.apply(op, now)?;
        }
        Ok(TxOutcome::Committed)
    }

    fn incr_by(&self, key: &str, delta: i64) -> StoreResult<i64> {
        self.inner.lock().incr(key, delta, Instant::now())
    }

    fn decr_if_at_least(&self, key: &str, amount: u64) -> StoreResult<Option<u64>> {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        let current = parse_amount(key, inner.read(key, now).as_deref())?;
        if current < amount {
            return Ok(None);
        }
        let delta = to_delta(key, amount)?;
        inner.incr(key, -delta, now)?;
        Ok(Some(current - amount))
    }

    fn move_if_at_least(&self, from: &str, to: &str, amount: u64) -> StoreResult<Option<u64>> {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        let current = parse_amount(from, inner.read(from, now).as_deref())?;
        if current < amount {
            return Ok(None);
        }
        parse_int(to, inner.read(to, now).as_deref())?;
        let delta = to_delta(from, amount)?;
        inner.incr(from, -delta, now)?;
        inner.incr(to, delta, now)?;
        Ok(Some(current - amount))
    }
}

fn to_delta(key: &str, amount: u64) -> StoreResult<i64> {
    i64::try_from(amount).map_err(|_| StoreError::Corrupt {
        key: key.to_string(),
        value: amount.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(k: &[&str]) -> Vec<String> {
        k.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_transact_commits() {
        let store = MemoryStore::new();
        let outcome = store
            .transact(&keys(&["a"]), &mut |values: &[Option<String>]| {
                assert_eq!(values, &[None]);
                vec![
                    WriteOp::IncrBy { key: "a".into(), delta: 5 },
                    WriteOp::Set { key: "b".into(), value: "x".into(), ttl_secs: None },
                ]
            })
            .unwrap();
        assert_eq!(outcome, TxOutcome::Committed);
        assert_eq!(store.get("a").unwrap().as_deref(), Some("5"));
        assert_eq!(store.get("b").unwrap().as_deref(), Some("x"));
    }

    #[test]
    fn test_watched_write_conflicts() {
        let store = MemoryStore::new();
        let outcome = store
            .transact(&keys(&["a"]), &mut |_: &[Option<String>]| {
                // Another writer lands between read and commit.
                store.incr_by("a", 1).unwrap();
                vec![WriteOp::IncrBy { key: "a".into(), delta: 10 }]
            })
            .unwrap();
        assert_eq!(outcome, TxOutcome::Conflict);
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn test_injected_conflicts_run_out() {
        let store = MemoryStore::new();
        store.inject_conflicts(2);
        let mut plan = |_: &[Option<String>]| Vec::<WriteOp>::new();
        assert_eq!(store.transact(&[], &mut plan).unwrap(), TxOutcome::Conflict);
        assert_eq!(store.transact(&[], &mut plan).unwrap(), TxOutcome::Conflict);
        assert_eq!(store.transact(&[], &mut plan).unwrap(), TxOutcome::Committed);
    }

    #[test]
    fn test_corrupt_value_aborts_whole_commit() {
        let store = MemoryStore::new();
        store
            .transact(&[], &mut |_: &[Option<String>]| {
                vec![WriteOp::Set { key: "bad".into(), value: "nope".into(), ttl_secs: None }]
            })
            .unwrap();
        let result = store.transact(&[], &mut |_: &[Option<String>]| {
            vec![
                WriteOp::IncrBy { key: "good".into(), delta: 1 },
                WriteOp::IncrBy { key: "bad".into(), delta: 1 },
            ]
        });
        assert!(matches!(result, Err(StoreError::Corrupt { .. })));
        assert_eq!(store.get("good").unwrap(), None);
    }

    #[test]
    fn test_scripts() {
        let store = MemoryStore::new();
        store.incr_by("a", 30).unwrap();

        assert_eq!(store.decr_if_at_least("a", 50).unwrap(), None);
        assert_eq!(store.decr_if_at_least("a", 10).unwrap(), Some(20));
        assert_eq!(store.move_if_at_least("a", "b", 25).unwrap(), None);
        assert_eq!(store.move_if_at_least("a", "b", 20).unwrap(), Some(0));
        assert_eq!(store.get("b").unwrap().as_deref(), Some("20"));
    }

    #[test]
    fn test_sorted_set_range() {
        let store = MemoryStore::new();
        store
            .transact(&[], &mut |_: &[Option<String>]| {
                vec![
                    WriteOp::ZAdd { key: "z".into(), member: "late".into(), score: 300 },
                    WriteOp::ZAdd { key: "z".into(), member: "early".into(), score: 100 },
                    WriteOp::ZAdd { key: "z".into(), member: "mid".into(), score: 200 },
                    WriteOp::ZAdd { key: "z".into(), member: "early".into(), score: 150 },
                    WriteOp::ZRem { key: "z".into(), member: "mid".into() },
                ]
            })
            .unwrap();
        assert_eq!(store.zrange_by_score("z", 250, 10).unwrap(), vec!["early"]);
        assert_eq!(store.zrange_by_score("z", 1000, 1).unwrap(), vec!["early"]);
        assert_eq!(store.zrange_by_score("z", 1000, 10).unwrap(), vec!["early", "late"]);
        assert!(store.zrange_by_score("missing", 1000, 10).unwrap().is_empty());
    }

    #[test]
    fn test_ttl_expires() {
        let store = MemoryStore::new();
        store
            .transact(&[], &mut |_: &[Option<String>]| {
                vec![WriteOp::Set { key: "k".into(), value: "v".into(), ttl_secs: Some(0) }]
            })
            .unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }
}
