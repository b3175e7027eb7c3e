//! # Exit Tickets
//!
//! A ticket is a signed, time-limited authorization a settlement contract
//! redeems for the payout. The ledger builds the claim; a [`TicketSigner`]
//! supplies the signature. Signing must be deterministic so a replayed call
//! produces the same ticket it cached.

use serde::{Deserialize, Serialize};

use crate::error::LedgerResult;

/// What a ticket authorizes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketClaim {
    /// Room the player left.
    pub server_id: String,
    /// Session that exited.
    pub session_id: String,
    /// Payout address.
    pub player: String,
    /// Payout amount in the smallest unit.
    pub amount: u64,
    /// Unix seconds after which the ticket is void.
    pub deadline: u64,
}

/// A signed claim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitTicket {
    /// The authorization.
    #[serde(flatten)]
    pub claim: TicketClaim,
    /// Signature bytes, in whatever layout the signer's verifier expects.
    pub signature: Vec<u8>,
}

/// Signs ticket claims.
pub trait TicketSigner: Send + Sync {
    /// Signs `claim`.
    ///
    /// # Errors
    ///
    /// `LedgerError::Signing` when the claim cannot be encoded or signed.
    fn sign(&self, claim: &TicketClaim) -> LedgerResult<Vec<u8>>;
}

/// Everything the exit path needs to know about one payout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExitRequest {
    /// Payout address.
    pub wallet: String,
    /// Exiting session.
    pub session_id: String,
    /// Amount to pay.
    pub amount: u64,
    /// Unix seconds after which the ticket is void.
    pub deadline: u64,
}
