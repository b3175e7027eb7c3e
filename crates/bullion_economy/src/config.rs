//! # Ledger Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so a file
//! only needs the values it changes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

/// 30 days.
const DEFAULT_IDEMPOTENCY_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Ledger and reservation tuning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// First segment of every store key.
    pub namespace: String,
    /// Largest amount a single call may move. Keeps every counter inside the
    /// store's signed 64-bit increment with room to spare.
    pub max_amount: u64,
    /// Lifetime of idempotency records; `None` keeps them forever.
    pub idempotency_ttl_secs: Option<u64>,
    /// Optimistic transaction attempts before giving up.
    pub max_attempts: u32,
    /// Lower bound of the retry jitter.
    pub backoff_min_ms: u64,
    /// Upper bound of the retry jitter.
    pub backoff_max_ms: u64,
    /// Validity window of an exit ticket.
    pub ticket_ttl_secs: u64,
    /// Lifetime of an exit reservation.
    pub reservation_ttl_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            namespace: "bullion".to_string(),
            max_amount: (1 << 53) - 1,
            idempotency_ttl_secs: Some(DEFAULT_IDEMPOTENCY_TTL_SECS),
            max_attempts: 8,
            backoff_min_ms: 1,
            backoff_max_ms: 5,
            ticket_ttl_secs: 900,
            reservation_ttl_secs: 900,
        }
    }
}

impl LedgerConfig {
    /// Parses and validates TOML.
    ///
    /// # Errors
    ///
    /// Parse failure or an invalid value.
    pub fn from_toml_str(text: &str) -> LedgerResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// IO, parse or validation failure.
    pub fn load(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Checks the values the ledger relies on.
    ///
    /// # Errors
    ///
    /// `LedgerError::InvalidConfig` naming the bad field.
    pub fn validate(&self) -> LedgerResult<()> {
        let bad = |msg: &str| Err(LedgerError::InvalidConfig(msg.to_string()));
        if self.namespace.is_empty() || self.namespace.contains(':') {
            return bad("namespace must be non-empty and contain no ':'");
        }
        if self.max_amount == 0 || i64::try_from(self.max_amount).is_err() {
            return bad("max_amount must be in 1..=i64::MAX");
        }
        if self.max_attempts == 0 {
            return bad("max_attempts must be positive");
        }
        if self.backoff_min_ms > self.backoff_max_ms {
            return bad("backoff_min_ms must not exceed backoff_max_ms");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.max_amount, 9_007_199_254_740_991);
        assert_eq!(config.idempotency_ttl_secs, Some(2_592_000));
    }

    #[test]
    fn test_partial_toml() {
        let config = LedgerConfig::from_toml_str("namespace = \"test\"\nmax_attempts = 3\n").unwrap();
        assert_eq!(config.namespace, "test");
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.ticket_ttl_secs, 900);
    }

    #[test]
    fn test_rejects_bad_namespace() {
        assert!(matches!(
            LedgerConfig::from_toml_str("namespace = \"a:b\""),
            Err(LedgerError::InvalidConfig(_))
        ));
    }
}
