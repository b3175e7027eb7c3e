//! # Settlement Queue
//!
//! Bounded hand-off between whatever watches the chain and the thread that
//! applies events to the ledger.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │   Indexer    │ ──▶ │   Parser     │ ──▶ │   Channel    │ ──▶ SettlementSync
//! │   / RPC      │     │              │     │   (Bounded)  │
//! └──────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! A full queue refuses the event rather than blocking the producer; the
//! producer re-delivers it later and the event id keeps the replay harmless.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::warn;

use crate::events::{EventParser, SettlementEvent};

/// Counters for the queue.
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Events accepted into the channel.
    pub events_received: AtomicU64,
    /// Events refused because the channel was full.
    pub events_dropped: AtomicU64,
    /// Raw logs that were not vault events.
    pub logs_ignored: AtomicU64,
}

/// Bounded settlement event channel.
#[derive(Clone)]
pub struct SettlementQueue {
    sender: Sender<SettlementEvent>,
    receiver: Receiver<SettlementEvent>,
    stats: Arc<QueueStats>,
}

impl SettlementQueue {
    /// Queue holding at most `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            stats: Arc::new(QueueStats::default()),
        }
    }

    /// Returns a clone of the event receiver.
    #[must_use]
    pub fn receiver(&self) -> Receiver<SettlementEvent> {
        self.receiver.clone()
    }

    /// Returns a reference to the statistics.
    #[must_use]
    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }

    /// Events waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// True when nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Enqueues an event; `false` if the channel is full.
    pub fn push(&self, event: SettlementEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => {
                self.stats.events_received.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                self.stats.events_dropped.fetch_add(1, Ordering::Relaxed);
                warn!(block = e.into_inner().block_number(), "settlement queue full, event refused");
                false
            }
        }
    }

    /// Parses a raw log and enqueues it. `false` for foreign logs or a full
    /// channel.
    pub fn push_raw_log(&self, topics: &[[u8; 32]], data: &[u8], block_number: u64, log_index: u32) -> bool {
        match EventParser::parse(topics, data, block_number, log_index) {
            Some(event) => self.push(event),
            None => {
                self.stats.logs_ignored.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Takes the next waiting event, if any.
    #[must_use]
    pub fn try_pop(&self) -> Option<SettlementEvent> {
        self.receiver.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded() {
        let queue = SettlementQueue::new(2);
        assert!(queue.push(SettlementEvent::NewBlock(1)));
        assert!(queue.push(SettlementEvent::NewBlock(2)));
        assert!(!queue.push(SettlementEvent::NewBlock(3)));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.stats().events_dropped.load(Ordering::Relaxed), 1);

        assert_eq!(queue.try_pop(), Some(SettlementEvent::NewBlock(1)));
        assert_eq!(queue.try_pop(), Some(SettlementEvent::NewBlock(2)));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_foreign_log_ignored() {
        let queue = SettlementQueue::new(4);
        assert!(!queue.push_raw_log(&[[0u8; 32]; 3], &[0u8; 32], 1, 0));
        assert_eq!(queue.stats().logs_ignored.load(Ordering::Relaxed), 1);
        assert!(queue.is_empty());
    }
}
