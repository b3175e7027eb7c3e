//! # Contract Definitions
//!
//! The vault contract players deposit into and redeem exit tickets from.

// The sol! macro generates code that we can't document, so allow missing_docs
#![allow(missing_docs)]

use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_sol_types::sol;

sol! {
    /// Payout authorization, hashed and signed as EIP-712 typed data.
    #[derive(Debug, PartialEq, Eq)]
    struct ExitTicket {
        bytes32 serverId;
        bytes32 sessionId;
        address player;
        uint256 amount;
        uint256 deadline;
    }

    /// The settlement vault.
    #[derive(Debug)]
    interface IBullionVault {
        /// A player funded their stake.
        event Deposited(bytes32 indexed eventId, address indexed player, uint256 amount);

        /// A ticket was redeemed and the payout sent.
        event ExitRedeemed(bytes32 indexed eventId, address indexed player, uint256 amount);

        /// Pays out a signed exit ticket.
        function redeemExit(ExitTicket ticket, bytes signature) external;
    }
}

/// EIP-712 domain name of the vault.
pub const DOMAIN_NAME: &str = "BullionVault";

/// EIP-712 domain version of the vault.
pub const DOMAIN_VERSION: &str = "1";

/// On-chain form of a server or session id.
#[inline]
#[must_use]
pub fn id_hash(id: &str) -> B256 {
    keccak256(id.as_bytes())
}

impl ExitTicket {
    /// Builds the typed-data ticket from ledger values.
    #[must_use]
    pub fn from_parts(server_id: &str, session_id: &str, player: Address, amount: u64, deadline: u64) -> Self {
        Self {
            serverId: id_hash(server_id),
            sessionId: id_hash(session_id),
            player,
            amount: U256::from(amount),
            deadline: U256::from(deadline),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_sol_types::{SolEvent, SolStruct};

    #[test]
    fn test_event_signatures() {
        assert_eq!(
            IBullionVault::Deposited::SIGNATURE,
            "Deposited(bytes32,address,uint256)"
        );
        assert_eq!(
            IBullionVault::Deposited::SIGNATURE_HASH,
            keccak256("Deposited(bytes32,address,uint256)")
        );
    }

    #[test]
    fn test_ticket_struct_hash() {
        let player = Address::repeat_byte(0xab);
        let ticket = ExitTicket::from_parts("room-1", "s1", player, 640, 1_000);

        let type_hash = keccak256(
            "ExitTicket(bytes32 serverId,bytes32 sessionId,address player,uint256 amount,uint256 deadline)",
        );
        let mut encoded = Vec::with_capacity(6 * 32);
        encoded.extend_from_slice(type_hash.as_slice());
        encoded.extend_from_slice(keccak256(b"room-1").as_slice());
        encoded.extend_from_slice(keccak256(b"s1").as_slice());
        encoded.extend_from_slice(&[0u8; 12]);
        encoded.extend_from_slice(player.as_slice());
        encoded.extend_from_slice(&U256::from(640).to_be_bytes::<32>());
        encoded.extend_from_slice(&U256::from(1_000).to_be_bytes::<32>());

        assert_eq!(ticket.eip712_hash_struct(), keccak256(&encoded));
    }
}
