// SPDX-License-Identifier: BUSL-1.1
//! # Trade State Machine
//!
//! Owns every status change in the system. A transition request passes three
//! guards in order:
//!
//! 1. **Optimistic concurrency** — the caller names the status it believes
//!    the trade is in (`from_expected`). A cheap read fast-fails obviously
//!    stale requests; the authoritative check happens atomically inside the
//!    store's conditional write, so two racing callers can never both
//!    succeed.
//! 2. **Structural legality** — the target must be the immediate successor
//!    on the forward track, or `Disputed` from an eligible state, or a
//!    resolution out of `Disputed`.
//! 3. **Escrow gate** — financial preconditions evaluated against the full
//!    ledger history.
//!
//! Only then does the request reach [`TradeStore::commit_transition`], which
//! appends the `state_transition` event and updates status and version as
//! one write. Retries of an already-applied request are answered from the
//! ledger without a second event.

use std::sync::Arc;

use caravel_core::{TradeId, TradeStatus};
use caravel_ledger::{TradeSnapshot, TradeStore, TransitionCommit};

use crate::error::{lift_ledger, KernelError};
use crate::gate::EscrowGate;

/// Validates and commits trade status transitions.
pub struct TradeStateMachine {
    store: Arc<TradeStore>,
}

impl TradeStateMachine {
    /// Create a state machine over the given store.
    pub fn new(store: Arc<TradeStore>) -> Self {
        Self { store }
    }

    /// Request a transition of `trade_id` from `from_expected` to `to`.
    ///
    /// On success returns the committed (or idempotently replayed) result:
    /// the new snapshot and the `state_transition` event.
    ///
    /// # Errors
    ///
    /// - [`KernelError::StaleState`] — the persisted status is neither
    ///   `from_expected` nor already `to`; re-read and retry.
    /// - [`KernelError::IllegalTransition`] — the edge is not in the
    ///   lifecycle graph; fatal for this request.
    /// - [`KernelError::EscrowGateBlocked`] — a required financial signal
    ///   has not been recorded; retry after it arrives.
    pub fn request_transition(
        &self,
        trade_id: TradeId,
        from_expected: TradeStatus,
        to: TradeStatus,
        evidence: Option<String>,
    ) -> Result<TransitionCommit, KernelError> {
        let snapshot = self.store.snapshot(trade_id).map_err(lift_ledger)?;

        // Guard 1 (advisory read). A mismatch where the trade already sits
        // in the target falls through: the commit resolves whether it is an
        // idempotent retry of this exact edge.
        if snapshot.status != from_expected && snapshot.status != to {
            return Err(KernelError::StaleState {
                trade_id: trade_id.to_string(),
                expected: from_expected.as_str().to_string(),
                actual: snapshot.status.as_str().to_string(),
            });
        }

        // Guard 2: structural legality of the requested edge.
        if !from_expected.allows(to) {
            return Err(KernelError::IllegalTransition {
                trade_id: trade_id.to_string(),
                from: from_expected.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }

        // Guard 3: escrow gate over the ledger history.
        let events = self.store.replay(trade_id).map_err(lift_ledger)?;
        if let Err(requirement) = EscrowGate::check(from_expected, to, &events) {
            return Err(KernelError::EscrowGateBlocked {
                trade_id: trade_id.to_string(),
                from: from_expected.as_str().to_string(),
                to: to.as_str().to_string(),
                requirement: requirement.describe().to_string(),
            });
        }

        // The conditional write: guard 1 re-verified atomically.
        self.store
            .commit_transition(trade_id, from_expected, to, evidence)
            .map_err(lift_ledger)
    }

    /// The current snapshot for optimistic concurrency.
    pub fn snapshot(&self, trade_id: TradeId) -> Result<TradeSnapshot, KernelError> {
        self.store.snapshot(trade_id).map_err(lift_ledger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caravel_core::{Corridor, PartyId, TradeAmount, TradeTerms};
    use caravel_ledger::{EventBody, EventKind};

    fn sample_terms() -> TradeTerms {
        TradeTerms::new(
            "Polymer granulate",
            "40",
            TradeAmount::new("USD", "1200").unwrap(),
            TradeAmount::new("USD", "48000").unwrap(),
        )
        .unwrap()
    }

    fn machine_with_trade() -> (Arc<TradeStore>, TradeStateMachine, TradeId) {
        let store = Arc::new(TradeStore::new());
        let trade_id = TradeId::new();
        store
            .create_trade(
                trade_id,
                PartyId::new(),
                PartyId::new(),
                sample_terms(),
                Corridor::new("TRIST", "DEHAM"),
            )
            .unwrap();
        let machine = TradeStateMachine::new(Arc::clone(&store));
        (store, machine, trade_id)
    }

    /// Drive a trade along the forward track to `target`, recording the
    /// signals the gates need along the way.
    fn advance_to(
        store: &TradeStore,
        machine: &TradeStateMachine,
        trade_id: TradeId,
        target: TradeStatus,
    ) {
        let mut current = TradeStatus::Draft;
        while current != target {
            let next = current.successor().expect("target lies on the track");
            match next {
                TradeStatus::EscrowFunded => {
                    store
                        .append_signal(trade_id, EventBody::EscrowFunded { reference: None })
                        .unwrap();
                }
                TradeStatus::Settled => {
                    store
                        .append_signal(trade_id, EventBody::PaymentReleased { reference: None })
                        .unwrap();
                }
                _ => {}
            }
            machine
                .request_transition(trade_id, current, next, None)
                .unwrap();
            current = next;
        }
    }

    #[test]
    fn first_transition_succeeds() {
        let (_store, machine, trade_id) = machine_with_trade();
        let commit = machine
            .request_transition(trade_id, TradeStatus::Draft, TradeStatus::RfqCreated, None)
            .unwrap();
        assert_eq!(commit.snapshot.status, TradeStatus::RfqCreated);
        assert!(!commit.replayed);
    }

    #[test]
    fn skipping_a_state_is_illegal_and_appends_nothing() {
        let (store, machine, trade_id) = machine_with_trade();
        let before = store.replay(trade_id).unwrap().len();

        let result =
            machine.request_transition(trade_id, TradeStatus::Draft, TradeStatus::Quoted, None);
        assert!(matches!(result, Err(KernelError::IllegalTransition { .. })));
        assert_eq!(store.replay(trade_id).unwrap().len(), before);
    }

    #[test]
    fn stale_expectation_is_reported_before_legality() {
        let (_store, machine, trade_id) = machine_with_trade();
        machine
            .request_transition(trade_id, TradeStatus::Draft, TradeStatus::RfqCreated, None)
            .unwrap();

        // Caller still believes Draft and asks for an edge that would be
        // illegal from Draft anyway; the staleness is what it must learn.
        let result =
            machine.request_transition(trade_id, TradeStatus::Draft, TradeStatus::Contracted, None);
        assert!(matches!(result, Err(KernelError::StaleState { .. })));
    }

    #[test]
    fn funding_transition_blocked_until_signal_recorded() {
        let (store, machine, trade_id) = machine_with_trade();
        advance_to(&store, &machine, trade_id, TradeStatus::EscrowRequired);

        let result = machine.request_transition(
            trade_id,
            TradeStatus::EscrowRequired,
            TradeStatus::EscrowFunded,
            None,
        );
        assert!(matches!(result, Err(KernelError::EscrowGateBlocked { .. })));

        store
            .append_signal(trade_id, EventBody::EscrowFunded { reference: None })
            .unwrap();
        let commit = machine
            .request_transition(
                trade_id,
                TradeStatus::EscrowRequired,
                TradeStatus::EscrowFunded,
                None,
            )
            .unwrap();
        assert_eq!(commit.snapshot.status, TradeStatus::EscrowFunded);
    }

    #[test]
    fn gate_blocked_appends_nothing() {
        let (store, machine, trade_id) = machine_with_trade();
        advance_to(&store, &machine, trade_id, TradeStatus::EscrowRequired);
        let before = store.replay(trade_id).unwrap().len();

        let _ = machine.request_transition(
            trade_id,
            TradeStatus::EscrowRequired,
            TradeStatus::EscrowFunded,
            None,
        );
        assert_eq!(store.replay(trade_id).unwrap().len(), before);
    }

    #[test]
    fn retry_replays_the_original_commit() {
        let (store, machine, trade_id) = machine_with_trade();
        let first = machine
            .request_transition(trade_id, TradeStatus::Draft, TradeStatus::RfqCreated, None)
            .unwrap();
        let second = machine
            .request_transition(trade_id, TradeStatus::Draft, TradeStatus::RfqCreated, None)
            .unwrap();
        assert!(second.replayed);
        assert_eq!(second.event.event_id, first.event.event_id);
        assert_eq!(
            store
                .replay(trade_id)
                .unwrap()
                .iter()
                .filter(|e| e.kind() == EventKind::StateTransition)
                .count(),
            1
        );
    }

    #[test]
    fn dispute_requires_filed_dispute_then_resolves() {
        let (store, machine, trade_id) = machine_with_trade();
        advance_to(&store, &machine, trade_id, TradeStatus::Production);

        let blocked = machine.request_transition(
            trade_id,
            TradeStatus::Production,
            TradeStatus::Disputed,
            None,
        );
        assert!(matches!(blocked, Err(KernelError::EscrowGateBlocked { .. })));

        store
            .append_signal(
                trade_id,
                EventBody::DisputeCreated {
                    raised_by: PartyId::new(),
                    reason: "short shipment".to_string(),
                },
            )
            .unwrap();
        machine
            .request_transition(trade_id, TradeStatus::Production, TradeStatus::Disputed, None)
            .unwrap();

        // Unresolved closure is always available; settlement would need a
        // payment release.
        let to_settled = machine.request_transition(
            trade_id,
            TradeStatus::Disputed,
            TradeStatus::Settled,
            None,
        );
        assert!(matches!(to_settled, Err(KernelError::EscrowGateBlocked { .. })));

        let commit = machine
            .request_transition(trade_id, TradeStatus::Disputed, TradeStatus::Closed, None)
            .unwrap();
        assert_eq!(commit.snapshot.status, TradeStatus::Closed);
    }

    #[test]
    fn full_track_reaches_closed() {
        let (store, machine, trade_id) = machine_with_trade();
        advance_to(&store, &machine, trade_id, TradeStatus::Closed);
        assert_eq!(
            store.snapshot(trade_id).unwrap().status,
            TradeStatus::Closed
        );
        assert_eq!(store.fold_status(trade_id).unwrap(), TradeStatus::Closed);
    }

    #[test]
    fn unknown_trade_is_reported() {
        let store = Arc::new(TradeStore::new());
        let machine = TradeStateMachine::new(store);
        let result = machine.request_transition(
            TradeId::new(),
            TradeStatus::Draft,
            TradeStatus::RfqCreated,
            None,
        );
        assert!(matches!(result, Err(KernelError::TradeNotFound { .. })));
    }
}
