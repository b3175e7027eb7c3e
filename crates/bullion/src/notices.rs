//! # Room Notices
//!
//! What the room tells the transport layer after each tick.
//!
//! ```text
//! ┌─────────────┐      ┌─────────────┐      ┌─────────────┐
//! │ RoomDriver  │─────>│   Notice    │─────>│  Transport  │
//! │ (tick)      │      │   Channel   │      │  (clients)  │
//! └─────────────┘      └─────────────┘      └─────────────┘
//! ```
//!
//! Notices are advisory. Money has already moved by the time one is sent, so
//! a full channel drops the notice, never a payout.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::warn;

use bullion_core::EntityId;
use bullion_economy::ExitTicket;

/// Events for the transport layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoomNotice {
    /// A player paid the buy-in and entered the world.
    PlayerJoined {
        /// Session.
        session_id: String,
        /// Wallet charged.
        wallet: String,
    },

    /// A player exited and their ticket is ready for redemption.
    PlayerExited {
        /// Session.
        session_id: String,
        /// The signed payout.
        ticket: ExitTicket,
    },

    /// A player exited but the payout is still being settled. Retried on
    /// later ticks.
    ExitPending {
        /// Session.
        session_id: String,
        /// Amount owed.
        amount: u64,
    },

    /// A player died, was liquidated, or timed out.
    PlayerDied {
        /// Session.
        session_id: String,
        /// Wallet.
        wallet: String,
        /// Mass dropped in the world.
        spilled: u64,
    },

    /// A pellet was removed because the spend budget could not fund it.
    PelletRevoked {
        /// The pickup.
        id: EntityId,
    },
}

/// Bounded notice channel.
pub struct NoticeBus {
    sender: Sender<RoomNotice>,
    receiver: Receiver<RoomNotice>,
}

impl NoticeBus {
    /// Creates a new bus.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum notices in flight before new ones are dropped.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self { sender, receiver }
    }

    /// Creates a sender handle (clone for multiple producers).
    #[must_use]
    pub fn sender(&self) -> NoticeSender {
        NoticeSender {
            sender: self.sender.clone(),
        }
    }

    /// Creates a receiver handle.
    #[must_use]
    pub fn receiver(&self) -> NoticeReceiver {
        NoticeReceiver {
            receiver: self.receiver.clone(),
        }
    }

    /// Creates a new pair of sender and receiver.
    #[must_use]
    pub fn create_pair(capacity: usize) -> (NoticeSender, NoticeReceiver) {
        let bus = Self::new(capacity);
        (bus.sender(), bus.receiver())
    }
}

/// Handle for sending notices.
#[derive(Clone)]
pub struct NoticeSender {
    sender: Sender<RoomNotice>,
}

impl NoticeSender {
    /// Sends a notice (non-blocking). Returns `false` if it was dropped.
    #[inline]
    pub fn send(&self, notice: RoomNotice) -> bool {
        match self.sender.try_send(notice) {
            Ok(()) => true,
            Err(TrySendError::Full(notice)) => {
                warn!(?notice, "notice channel full, dropping");
                false
            }
            // Nobody listening is fine for headless rooms.
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Handle for receiving notices.
#[derive(Clone)]
pub struct NoticeReceiver {
    receiver: Receiver<RoomNotice>,
}

impl NoticeReceiver {
    /// Receives all pending notices (non-blocking).
    #[inline]
    pub fn drain(&self) -> Vec<RoomNotice> {
        self.receiver.try_iter().collect()
    }

    /// Receives one notice (non-blocking).
    #[inline]
    pub fn try_recv(&self) -> Option<RoomNotice> {
        self.receiver.try_recv().ok()
    }

    /// Returns the number of pending notices.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn died(n: u64) -> RoomNotice {
        RoomNotice::PlayerDied {
            session_id: format!("s{n}"),
            wallet: "0xabc".into(),
            spilled: n,
        }
    }

    #[test]
    fn test_send_receive() {
        let (sender, receiver) = NoticeBus::create_pair(8);
        assert!(sender.send(died(1)));
        assert_eq!(receiver.pending_count(), 1);
        assert_eq!(receiver.try_recv(), Some(died(1)));
        assert_eq!(receiver.try_recv(), None);
    }

    #[test]
    fn test_full_channel_drops() {
        let (sender, receiver) = NoticeBus::create_pair(2);
        for n in 0..5 {
            let _ = sender.send(died(n));
        }
        assert_eq!(receiver.drain(), vec![died(0), died(1)]);
    }

    #[test]
    fn test_disconnected_receiver() {
        let bus = NoticeBus::new(2);
        let sender = bus.sender();
        drop(bus);
        assert!(!sender.send(died(1)));
    }
}
