// SPDX-License-Identifier: BUSL-1.1
//! # Event Feed
//!
//! Publish mechanism for appended ledger events. Interested readers (UI
//! timelines, trust engines, notification relays) subscribe with an optional
//! per-trade filter and receive every matching event over a channel.
//!
//! Delivery is decoupled from the write path: a slow, full, or dropped
//! subscriber never blocks or fails a commit. Disconnected subscribers are
//! pruned on the next publish.

use caravel_core::TradeId;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;

use crate::event::TradeEvent;

struct Subscriber {
    id: u64,
    filter: Option<TradeId>,
    sender: Sender<TradeEvent>,
}

/// Fan-out registry for appended events.
pub struct EventFeed {
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: std::sync::atomic::AtomicU64,
}

impl EventFeed {
    /// Create an empty feed.
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Subscribe to every appended event.
    pub fn subscribe(&self) -> Receiver<TradeEvent> {
        self.register(None)
    }

    /// Subscribe to events for a single trade.
    pub fn subscribe_trade(&self, trade_id: TradeId) -> Receiver<TradeEvent> {
        self.register(Some(trade_id))
    }

    fn register(&self, filter: Option<TradeId>) -> Receiver<TradeEvent> {
        let (sender, receiver) = unbounded();
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.subscribers.write().push(Subscriber { id, filter, sender });
        receiver
    }

    /// Deliver an event to every matching subscriber.
    ///
    /// Send failures mean the receiver was dropped; those subscribers are
    /// pruned. Nothing here can fail the caller.
    pub fn publish(&self, event: &TradeEvent) {
        let mut dead: Vec<u64> = Vec::new();
        {
            let subscribers = self.subscribers.read();
            for sub in subscribers.iter() {
                if let Some(filter) = sub.filter {
                    if filter != event.trade_id {
                        continue;
                    }
                }
                if sub.sender.send(event.clone()).is_err() {
                    dead.push(sub.id);
                }
            }
        }
        if !dead.is_empty() {
            tracing::debug!(
                pruned = dead.len(),
                trade_id = %event.trade_id,
                "pruning disconnected event feed subscribers"
            );
            self.subscribers.write().retain(|s| !dead.contains(&s.id));
        }
    }

    /// Number of live subscriptions (for diagnostics).
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for EventFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventFeed")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
