//! # Server Configuration
//!
//! One TOML file for the whole process:
//!
//! ```toml
//! server_id = "room-1"
//! seed = 42
//! store_url = "redis://127.0.0.1/"   # omit for the in-process store
//! chain_id = 8453
//! vault_address = "0x..."
//! signer_key = "0x..."
//!
//! [sim]
//! exit_duration_ticks = 60
//!
//! [ledger]
//! max_attempts = 8
//! ```

use std::path::Path;
use std::sync::Arc;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use bullion_chain::{Eip712TicketSigner, DEFAULT_PELLET_SHARE_BPS};
use bullion_economy::{KvStore, Ledger, LedgerConfig, MemoryStore};
use bullion_sim::SimConfig;

use crate::error::{RoomError, RoomResult};

/// Well-known local development key. Never fund its address.
pub const DEV_SIGNER_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Process configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Ledger scope and ticket server id.
    pub server_id: String,
    /// Engine RNG seed.
    pub seed: u32,
    /// Buy-in burned from a player's stake on join.
    pub spawn_mass: u64,
    /// Shared store URL; `None` runs on the in-process store.
    pub store_url: Option<String>,
    /// Ticket signing key, hex.
    pub signer_key: String,
    /// EIP-712 chain id.
    pub chain_id: u64,
    /// Vault contract, the EIP-712 verifying contract.
    pub vault_address: String,
    /// Share of each deposit credited to the pellet reserve.
    pub pellet_share_bps: u64,
    /// Ticks between reservation sweeps.
    pub sweep_interval_ticks: u64,
    /// Reservations released per sweep at most.
    pub sweep_limit: usize,
    /// Notice channel capacity.
    pub notice_capacity: usize,
    /// Scripted bots the binary spawns.
    pub bots: u32,
    /// Ticks the binary runs for; 0 runs until killed.
    pub max_ticks: u64,
    /// Simulation tuning.
    pub sim: SimConfig,
    /// Ledger tuning.
    pub ledger: LedgerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_id: "room-1".to_string(),
            seed: 42,
            spawn_mass: 1_000,
            store_url: None,
            signer_key: DEV_SIGNER_KEY.to_string(),
            chain_id: 31_337,
            vault_address: Address::ZERO.to_string(),
            pellet_share_bps: DEFAULT_PELLET_SHARE_BPS,
            sweep_interval_ticks: 20,
            sweep_limit: 64,
            notice_capacity: 1024,
            bots: 8,
            max_ticks: 1_200,
            sim: SimConfig::default(),
            ledger: LedgerConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Parses and validates TOML.
    ///
    /// # Errors
    ///
    /// Parse failure or an invalid value in any section.
    pub fn from_toml_str(text: &str) -> RoomResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// IO, parse or validation failure.
    pub fn load(path: impl AsRef<Path>) -> RoomResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Checks every section.
    ///
    /// # Errors
    ///
    /// The first bad value found.
    pub fn validate(&self) -> RoomResult<()> {
        let bad = |msg: &str| Err(RoomError::InvalidConfig(msg.to_string()));
        if self.spawn_mass == 0 {
            return bad("spawn_mass must be positive");
        }
        if self.pellet_share_bps > 10_000 {
            return bad("pellet_share_bps must be <= 10000");
        }
        if self.sweep_interval_ticks == 0 || self.sweep_limit == 0 {
            return bad("sweep_interval_ticks and sweep_limit must be positive");
        }
        if self.notice_capacity == 0 {
            return bad("notice_capacity must be positive");
        }
        self.vault()?;
        self.sim.validate()?;
        self.ledger.validate()?;
        Ok(())
    }

    /// Parsed vault address.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when the address is malformed.
    pub fn vault(&self) -> RoomResult<Address> {
        self.vault_address
            .parse()
            .map_err(|_| RoomError::InvalidConfig(format!("vault_address {:?}", self.vault_address)))
    }

    /// Ticket signer for this deployment.
    ///
    /// # Errors
    ///
    /// Bad key or vault address.
    pub fn signer(&self) -> RoomResult<Eip712TicketSigner> {
        Ok(Eip712TicketSigner::from_hex(&self.signer_key, self.chain_id, self.vault()?)?)
    }

    /// Store named by `store_url`, or a fresh in-process store.
    ///
    /// # Errors
    ///
    /// Connection failure, or a URL given to a build without the `redis`
    /// feature.
    pub fn store(&self) -> RoomResult<Arc<dyn KvStore>> {
        match &self.store_url {
            None => Ok(Arc::new(MemoryStore::new())),
            #[cfg(feature = "redis")]
            Some(url) => Ok(Arc::new(bullion_economy::RedisStore::connect(url)?)),
            #[cfg(not(feature = "redis"))]
            Some(url) => Err(RoomError::InvalidConfig(format!(
                "store_url {url:?} needs the redis feature"
            ))),
        }
    }

    /// Ledger over `store` in this server's scope.
    ///
    /// # Errors
    ///
    /// Invalid ledger config or server id.
    pub fn ledger(&self, store: Arc<dyn KvStore>) -> RoomResult<Ledger> {
        Ok(Ledger::new(store, &self.server_id, self.ledger.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = ServerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.vault().unwrap(), Address::ZERO);
        config.signer().unwrap();
    }

    #[test]
    fn test_sections() {
        let config = ServerConfig::from_toml_str(
            "server_id = \"eu-7\"\nseed = 9\n[sim]\nexit_duration_ticks = 40\n[ledger]\nmax_attempts = 3\n",
        )
        .unwrap();
        assert_eq!(config.server_id, "eu-7");
        assert_eq!(config.sim.exit_duration_ticks, 40);
        assert_eq!(config.ledger.max_attempts, 3);
        assert_eq!(config.spawn_mass, 1_000);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            ServerConfig::from_toml_str("vault_address = \"nope\""),
            Err(RoomError::InvalidConfig(_))
        ));
        assert!(matches!(
            ServerConfig::from_toml_str("[sim]\nexit_duration_ticks = 0"),
            Err(RoomError::Sim(_))
        ));
        assert!(matches!(
            ServerConfig::from_toml_str("[ledger]\nnamespace = \"\""),
            Err(RoomError::Ledger(_))
        ));
    }

    #[cfg(not(feature = "redis"))]
    #[test]
    fn test_store_url_needs_feature() {
        let config = ServerConfig {
            store_url: Some("redis://127.0.0.1/".into()),
            ..ServerConfig::default()
        };
        assert!(config.store().is_err());
    }
}
