//! # Exit Ticket Signing
//!
//! EIP-712 signatures the vault verifies with `ecrecover`.
//!
//! ```text
//! digest = keccak256(0x19 0x01 || domainSeparator || hashStruct(ExitTicket))
//! signature = r(32) || s(32) || v(1), v in {27, 28}
//! ```
//!
//! RFC 6979 nonces make signing deterministic, so a ledger replay of a
//! cached ticket and a fresh signature over the same claim agree.

use std::borrow::Cow;

use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_sol_types::{Eip712Domain, SolStruct};
use bullion_economy::{LedgerError, LedgerResult, TicketClaim, TicketSigner};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};

use crate::contracts::{ExitTicket, DOMAIN_NAME, DOMAIN_VERSION};
use crate::error::{ChainError, ChainResult};

/// Length of an `r || s || v` signature.
pub const SIGNATURE_LEN: usize = 65;

/// Signs exit tickets for one vault deployment.
pub struct Eip712TicketSigner {
    key: SigningKey,
    address: Address,
    domain: Eip712Domain,
}

impl Eip712TicketSigner {
    /// Signer from a hex private key (with or without `0x`).
    ///
    /// # Errors
    ///
    /// `InvalidKey` when the hex is malformed or not a valid scalar.
    pub fn from_hex(key_hex: &str, chain_id: u64, vault: Address) -> ChainResult<Self> {
        let bytes: B256 = key_hex
            .trim()
            .parse()
            .map_err(|_| ChainError::InvalidKey("expected 32 bytes of hex".to_string()))?;
        let key = SigningKey::from_slice(bytes.as_slice()).map_err(|e| ChainError::InvalidKey(e.to_string()))?;
        Ok(Self::new(key, chain_id, vault))
    }

    /// Signer from a parsed key.
    #[must_use]
    pub fn new(key: SigningKey, chain_id: u64, vault: Address) -> Self {
        let address = address_of(key.verifying_key());
        let domain = Eip712Domain::new(
            Some(Cow::Borrowed(DOMAIN_NAME)),
            Some(Cow::Borrowed(DOMAIN_VERSION)),
            Some(U256::from(chain_id)),
            Some(vault),
            None,
        );
        Self { key, address, domain }
    }

    /// Address the vault must trust as ticket issuer.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Typed-data digest for `ticket` under this signer's domain.
    #[must_use]
    pub fn digest(&self, ticket: &ExitTicket) -> B256 {
        ticket.eip712_signing_hash(&self.domain)
    }

    /// Signs a typed ticket.
    ///
    /// # Errors
    ///
    /// `Signature` if the backend refuses the digest.
    pub fn sign_ticket(&self, ticket: &ExitTicket) -> ChainResult<[u8; SIGNATURE_LEN]> {
        let digest = self.digest(ticket);
        let (signature, recovery) = self
            .key
            .sign_prehash_recoverable(digest.as_slice())
            .map_err(|e| ChainError::Signature(e.to_string()))?;

        let mut out = [0u8; SIGNATURE_LEN];
        out[..64].copy_from_slice(&signature.to_bytes());
        out[64] = 27 + recovery.to_byte();
        Ok(out)
    }

    /// Address that produced `signature` over `ticket`, as `ecrecover` sees it.
    ///
    /// # Errors
    ///
    /// `Signature` on a malformed signature or a failed recovery.
    pub fn recover(&self, ticket: &ExitTicket, signature: &[u8]) -> ChainResult<Address> {
        if signature.len() != SIGNATURE_LEN {
            return Err(ChainError::Signature(format!(
                "expected {SIGNATURE_LEN} bytes, got {}",
                signature.len()
            )));
        }
        let sig = Signature::from_slice(&signature[..64]).map_err(|e| ChainError::Signature(e.to_string()))?;
        let recovery = signature[64]
            .checked_sub(27)
            .and_then(RecoveryId::from_byte)
            .ok_or_else(|| ChainError::Signature("v must be 27 or 28".to_string()))?;

        let digest = self.digest(ticket);
        let key = VerifyingKey::recover_from_prehash(digest.as_slice(), &sig, recovery)
            .map_err(|e| ChainError::Signature(e.to_string()))?;
        Ok(address_of(&key))
    }

    /// Typed form of a ledger claim.
    ///
    /// # Errors
    ///
    /// `InvalidAddress` when the claim's player is not an address.
    pub fn ticket_for(claim: &TicketClaim) -> ChainResult<ExitTicket> {
        let player: Address = claim
            .player
            .parse()
            .map_err(|_| ChainError::InvalidAddress(claim.player.clone()))?;
        Ok(ExitTicket::from_parts(
            &claim.server_id,
            &claim.session_id,
            player,
            claim.amount,
            claim.deadline,
        ))
    }
}

impl TicketSigner for Eip712TicketSigner {
    fn sign(&self, claim: &TicketClaim) -> LedgerResult<Vec<u8>> {
        let signed = Self::ticket_for(claim).and_then(|ticket| self.sign_ticket(&ticket));
        signed
            .map(|sig| sig.to_vec())
            .map_err(|e| LedgerError::Signing(e.to_string()))
    }
}

/// Ethereum address of a public key: last 20 bytes of the keccak of the
/// uncompressed point without its prefix byte.
fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}
