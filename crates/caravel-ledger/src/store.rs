// SPDX-License-Identifier: BUSL-1.1
//! # Trade Store
//!
//! The durable-store abstraction behind the kernel: each trade's record and
//! its event log live in one slot behind one `DashMap` entry lock, so a
//! status update and its ledger append are a single write — a status can
//! never change without its audit entry, and vice versa.
//!
//! [`TradeStore::commit_transition`] is the compare-and-swap: the expected-
//! status check, the sequence assignment, and the write all happen inside
//! the entry's critical section. Two concurrent callers attempting the same
//! transition cannot both succeed; the loser observes
//! [`LedgerError::StaleState`] (and leaves a `transition_conflict` audit
//! event behind), unless it is a retry of the already-applied request, in
//! which case the original result is returned.
//!
//! ## Integrity Invariants
//!
//! - Event sequence numbers are strictly increasing per trade, assigned
//!   inside the same critical section as the append.
//! - `Trade.status` always equals the fold of its transition events
//!   ([`fold_status_events`]); the stored value is a cache.
//! - `Trade.version` increments exactly once per committed status change.

use caravel_core::{
    Corridor, EventId, PartyId, Timestamp, TradeId, TradeStatus, TradeTerms,
};
use crossbeam_channel::Receiver;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::event::{EventBody, EventKind, TradeEvent};
use crate::feed::EventFeed;

// ---------------------------------------------------------------------------
// Record types
// ---------------------------------------------------------------------------

/// The persistent record of one trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Unique trade identifier.
    pub trade_id: TradeId,
    /// Monotonically increasing version; bumps once per status change.
    pub version: u64,
    /// Current lifecycle status (cache of the ledger fold).
    pub status: TradeStatus,
    /// The buying party.
    pub buyer: PartyId,
    /// The selling party.
    pub seller: PartyId,
    /// Commercial terms snapshot; immutable once recorded.
    pub terms: TradeTerms,
    /// The corridor the goods move through.
    pub corridor: Corridor,
    /// When the trade was created (UTC).
    pub created_at: Timestamp,
    /// When the trade last changed (UTC).
    pub updated_at: Timestamp,
}

impl Trade {
    /// The caller-facing snapshot of this trade.
    pub fn snapshot(&self) -> TradeSnapshot {
        TradeSnapshot {
            trade_id: self.trade_id,
            status: self.status,
            version: self.version,
            updated_at: self.updated_at,
        }
    }
}

/// The compact view of a trade handed to callers for optimistic concurrency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeSnapshot {
    /// The trade identifier.
    pub trade_id: TradeId,
    /// Current status.
    pub status: TradeStatus,
    /// Current version.
    pub version: u64,
    /// Last change time (UTC).
    pub updated_at: Timestamp,
}

/// The result of a committed (or idempotently replayed) transition.
#[derive(Debug, Clone)]
pub struct TransitionCommit {
    /// Snapshot after the commit.
    pub snapshot: TradeSnapshot,
    /// The `state_transition` event recording the change.
    pub event: TradeEvent,
    /// True when this call was a retry of an already-applied request and the
    /// original result was returned instead of appending a second event.
    pub replayed: bool,
}

struct TradeSlot {
    trade: Trade,
    events: Vec<TradeEvent>,
}

impl TradeSlot {
    fn make_event(&self, body: EventBody) -> TradeEvent {
        TradeEvent {
            event_id: EventId::new(),
            trade_id: self.trade.trade_id,
            sequence: self.events.len() as u64 + 1,
            body,
            recorded_at: Timestamp::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// The store
// ---------------------------------------------------------------------------

/// Conditional-write store for trades and their event ledgers.
///
/// Thread-safe via `DashMap`: each trade's slot is guarded by its own entry
/// lock, operations on different trades never contend, and every state-
/// changing operation is a single critical section — no read-decide-write
/// sequence ever spans two lock acquisitions.
pub struct TradeStore {
    slots: DashMap<TradeId, TradeSlot>,
    feed: EventFeed,
}

impl TradeStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            feed: EventFeed::new(),
        }
    }

    /// Create a new trade in `Draft` and append its `trade_created` event
    /// in the same insert.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::TradeExists`] if the identifier is already
    /// present (insert-if-absent, never overwrite).
    pub fn create_trade(
        &self,
        trade_id: TradeId,
        buyer: PartyId,
        seller: PartyId,
        terms: TradeTerms,
        corridor: Corridor,
    ) -> Result<Trade, LedgerError> {
        match self.slots.entry(trade_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(LedgerError::TradeExists {
                trade_id: trade_id.to_string(),
            }),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let now = Timestamp::now();
                let trade = Trade {
                    trade_id,
                    version: 1,
                    status: TradeStatus::Draft,
                    buyer,
                    seller,
                    terms,
                    corridor,
                    created_at: now,
                    updated_at: now,
                };
                let event = TradeEvent {
                    event_id: EventId::new(),
                    trade_id,
                    sequence: 1,
                    body: EventBody::TradeCreated { buyer, seller },
                    recorded_at: now,
                };
                let slot = vacant.insert(TradeSlot {
                    trade: trade.clone(),
                    events: vec![event.clone()],
                });
                drop(slot);
                self.feed.publish(&event);
                tracing::debug!(trade_id = %trade_id, "trade created");
                Ok(trade)
            }
        }
    }

    /// Commit a status transition: the compare-and-swap.
    ///
    /// Inside the trade's critical section, in order: (1) if the persisted
    /// status equals `expected`, append the `state_transition` event, set the
    /// status, bump the version — one write; (2) otherwise, if this is a
    /// retry of the most recently applied transition (`expected → to`),
    /// return the original event without appending; (3) otherwise append a
    /// `transition_conflict` audit event and fail with
    /// [`LedgerError::StaleState`].
    ///
    /// Legality of the `expected → to` edge is the caller's concern; the
    /// store records what it is told, conditionally.
    pub fn commit_transition(
        &self,
        trade_id: TradeId,
        expected: TradeStatus,
        to: TradeStatus,
        evidence: Option<String>,
    ) -> Result<TransitionCommit, LedgerError> {
        let mut slot = self
            .slots
            .get_mut(&trade_id)
            .ok_or_else(|| LedgerError::TradeNotFound {
                trade_id: trade_id.to_string(),
            })?;

        if slot.trade.status == expected {
            let event = slot.make_event(EventBody::StateTransition {
                from: expected,
                to,
                evidence,
            });
            slot.trade.status = to;
            slot.trade.version += 1;
            slot.trade.updated_at = event.recorded_at;
            slot.events.push(event.clone());
            let snapshot = slot.trade.snapshot();
            drop(slot);
            self.feed.publish(&event);
            tracing::debug!(
                trade_id = %trade_id,
                from = %expected,
                to = %to,
                version = snapshot.version,
                "transition committed"
            );
            return Ok(TransitionCommit {
                snapshot,
                event,
                replayed: false,
            });
        }

        // Idempotent retry: the request was already applied if the persisted
        // status is the target and the most recent transition is this edge.
        if slot.trade.status == to {
            let last_transition = slot
                .events
                .iter()
                .rev()
                .find(|e| e.kind() == EventKind::StateTransition);
            if let Some(event) = last_transition {
                if matches!(
                    event.body,
                    EventBody::StateTransition { from, to: applied, .. }
                        if from == expected && applied == to
                ) {
                    let commit = TransitionCommit {
                        snapshot: slot.trade.snapshot(),
                        event: event.clone(),
                        replayed: true,
                    };
                    tracing::debug!(
                        trade_id = %trade_id,
                        from = %expected,
                        to = %to,
                        "duplicate transition request replayed from ledger"
                    );
                    return Ok(commit);
                }
            }
        }

        // Lost the optimistic race: leave an audit record and fail.
        let actual = slot.trade.status;
        let event = slot.make_event(EventBody::TransitionConflict {
            expected,
            actual,
            target: to,
        });
        slot.events.push(event.clone());
        drop(slot);
        self.feed.publish(&event);
        tracing::debug!(
            trade_id = %trade_id,
            expected = %expected,
            actual = %actual,
            "transition rejected: stale state"
        );
        Err(LedgerError::StaleState {
            trade_id: trade_id.to_string(),
            expected: expected.as_str().to_string(),
            actual: actual.as_str().to_string(),
        })
    }

    /// Append a fact that does not change the trade's status (escrow
    /// signals, provider responses, milestone verifications, disputes).
    ///
    /// The sequence number is assigned inside the trade's critical section.
    pub fn append_signal(
        &self,
        trade_id: TradeId,
        body: EventBody,
    ) -> Result<TradeEvent, LedgerError> {
        let mut slot = self
            .slots
            .get_mut(&trade_id)
            .ok_or_else(|| LedgerError::TradeNotFound {
                trade_id: trade_id.to_string(),
            })?;
        let event = slot.make_event(body);
        slot.events.push(event.clone());
        slot.trade.updated_at = event.recorded_at;
        drop(slot);
        self.feed.publish(&event);
        Ok(event)
    }

    /// The full ordered event sequence for a trade.
    pub fn replay(&self, trade_id: TradeId) -> Result<Vec<TradeEvent>, LedgerError> {
        self.slots
            .get(&trade_id)
            .map(|slot| slot.events.clone())
            .ok_or_else(|| LedgerError::TradeNotFound {
                trade_id: trade_id.to_string(),
            })
    }

    /// The most recent `limit` events, newest first, without materializing
    /// the whole history.
    pub fn tail(&self, trade_id: TradeId, limit: usize) -> Result<Vec<TradeEvent>, LedgerError> {
        self.slots
            .get(&trade_id)
            .map(|slot| slot.events.iter().rev().take(limit).cloned().collect())
            .ok_or_else(|| LedgerError::TradeNotFound {
                trade_id: trade_id.to_string(),
            })
    }

    /// Recompute the trade's status purely from its event sequence.
    ///
    /// Used for consistency repair and by read paths that must not trust the
    /// cached status column.
    pub fn fold_status(&self, trade_id: TradeId) -> Result<TradeStatus, LedgerError> {
        self.slots
            .get(&trade_id)
            .map(|slot| fold_status_events(&slot.events))
            .ok_or_else(|| LedgerError::TradeNotFound {
                trade_id: trade_id.to_string(),
            })
    }

    /// The caller-facing snapshot for optimistic concurrency.
    pub fn snapshot(&self, trade_id: TradeId) -> Result<TradeSnapshot, LedgerError> {
        self.slots
            .get(&trade_id)
            .map(|slot| slot.trade.snapshot())
            .ok_or_else(|| LedgerError::TradeNotFound {
                trade_id: trade_id.to_string(),
            })
    }

    /// The full trade record.
    pub fn get_trade(&self, trade_id: TradeId) -> Result<Trade, LedgerError> {
        self.slots
            .get(&trade_id)
            .map(|slot| slot.trade.clone())
            .ok_or_else(|| LedgerError::TradeNotFound {
                trade_id: trade_id.to_string(),
            })
    }

    /// All trade records (unordered).
    pub fn list_trades(&self) -> Vec<Trade> {
        self.slots.iter().map(|slot| slot.trade.clone()).collect()
    }

    /// Subscribe to every appended event.
    pub fn subscribe(&self) -> Receiver<TradeEvent> {
        self.feed.subscribe()
    }

    /// Subscribe to events for a single trade.
    pub fn subscribe_trade(&self, trade_id: TradeId) -> Receiver<TradeEvent> {
        self.feed.subscribe_trade(trade_id)
    }
}

impl Default for TradeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TradeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeStore")
            .field("trade_count", &self.slots.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Status fold
// ---------------------------------------------------------------------------

/// Fold a trade's event sequence down to its current status.
///
/// Trades begin in `Draft`; each `state_transition` event moves the fold to
/// its `to` status. All other event kinds are facts that do not affect
/// status.
pub fn fold_status_events(events: &[TradeEvent]) -> TradeStatus {
    events
        .iter()
        .fold(TradeStatus::Draft, |current, event| match event.body {
            EventBody::StateTransition { to, .. } => to,
            _ => current,
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
