//! Redis-backed [`KvStore`] for rooms spread over several processes.
//!
//! `transact` maps onto WATCH / GET / MULTI / EXEC on one connection; EXEC
//! returning nil is a conflict. The two scripts run as Lua so the check and
//! the write are one server-side step.

use parking_lot::Mutex;
use redis::{Connection, Script, Value};
use tracing::trace;

use super::{KvStore, Plan, TxOutcome, WriteOp};
use crate::error::StoreResult;

const DECR_IF_AT_LEAST: &str = r"
local current = tonumber(redis.call('GET', KEYS[1]) or '0')
local amount = tonumber(ARGV[1])
if current < amount then return false end
return redis.call('DECRBY', KEYS[1], amount)
";

const MOVE_IF_AT_LEAST: &str = r"
local current = tonumber(redis.call('GET', KEYS[1]) or '0')
local amount = tonumber(ARGV[1])
if current < amount then return false end
redis.call('INCRBY', KEYS[2], amount)
return redis.call('DECRBY', KEYS[1], amount)
";

/// Shared-store backend over a single synchronous connection.
pub struct RedisStore {
    conn: Mutex<Connection>,
    decr_script: Script,
    move_script: Script,
}

impl RedisStore {
    /// Connects to `url` (`redis://host:port/db`).
    ///
    /// # Errors
    ///
    /// Returns the connection error.
    pub fn connect(url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection()?;
        Ok(Self {
            conn: Mutex::new(conn),
            decr_script: Script::new(DECR_IF_AT_LEAST),
            move_script: Script::new(MOVE_IF_AT_LEAST),
        })
    }
}

impl KvStore for RedisStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn.lock();
        Ok(redis::cmd("GET").arg(key).query(&mut *conn)?)
    }

    fn zrange_by_score(&self, key: &str, max_score: u64, limit: usize) -> StoreResult<Vec<String>> {
        let mut conn = self.conn.lock();
        Ok(redis::cmd("ZRANGEBYSCORE")
            .arg(key)
            .arg("-inf")
            .arg(max_score)
            .arg("LIMIT")
            .arg(0)
            .arg(limit)
            .query(&mut *conn)?)
    }

    fn transact(&self, watch: &[String], plan: &mut Plan<'_>) -> StoreResult<TxOutcome> {
        let mut conn = self.conn.lock();
        if !watch.is_empty() {
            redis::cmd("WATCH").arg(watch).query::<()>(&mut *conn)?;
        }
        let values: Vec<Option<String>> = if watch.is_empty() {
            Vec::new()
        } else {
            redis::cmd("MGET").arg(watch).query(&mut *conn)?
        };

        let writes = plan(values.as_slice());

        let mut pipe = redis::pipe();
        pipe.atomic();
        for op in writes {
            match op {
                WriteOp::Set { key, value, ttl_secs } => match ttl_secs {
                    Some(ttl) => pipe.cmd("SET").arg(key).arg(value).arg("EX").arg(ttl.max(1)).ignore(),
                    None => pipe.cmd("SET").arg(key).arg(value).ignore(),
                },
                WriteOp::IncrBy { key, delta } => pipe.cmd("INCRBY").arg(key).arg(delta).ignore(),
                WriteOp::Delete { key } => pipe.cmd("DEL").arg(key).ignore(),
                WriteOp::ZAdd { key, member, score } => {
                    pipe.cmd("ZADD").arg(key).arg(score).arg(member).ignore()
                }
                WriteOp::ZRem { key, member } => pipe.cmd("ZREM").arg(key).arg(member).ignore(),
            };
        }

        let result: Value = pipe.query(&mut *conn)?;
        if result == Value::Nil {
            trace!(keys = watch.len(), "transaction conflict");
            return Ok(TxOutcome::Conflict);
        }
        Ok(TxOutcome::Committed)
    }

    fn incr_by(&self, key: &str, delta: i64) -> StoreResult<i64> {
        let mut conn = self.conn.lock();
        Ok(redis::cmd("INCRBY").arg(key).arg(delta).query(&mut *conn)?)
    }

    fn decr_if_at_least(&self, key: &str, amount: u64) -> StoreResult<Option<u64>> {
        let mut conn = self.conn.lock();
        Ok(self.decr_script.key(key).arg(amount).invoke(&mut *conn)?)
    }

    fn move_if_at_least(&self, from: &str, to: &str, amount: u64) -> StoreResult<Option<u64>> {
        let mut conn = self.conn.lock();
        Ok(self
            .move_script
            .key(from)
            .key(to)
            .arg(amount)
            .invoke(&mut *conn)?)
    }
}
