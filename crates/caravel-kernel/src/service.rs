// SPDX-License-Identifier: BUSL-1.1
//! # Trade Kernel Facade
//!
//! Composes the store, state machine, escrow gate, dispatch coordinator, and
//! milestone tracker into the single surface collaborators call. Inbound
//! signals (escrow status, disputes) are recorded here; they append facts and
//! never trigger transitions on their own — a transition must always be
//! *requested* and pass the guards.

use std::sync::Arc;

use caravel_core::{
    Corridor, Milestone, MilestoneStage, PartyId, ProviderId, Timestamp, TradeId, TradeStatus,
    TradeTerms,
};
use caravel_ledger::{
    EventBody, Trade, TradeEvent, TradeSnapshot, TradeStore, TransitionCommit,
};
use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};

use crate::dispatch::{DispatchCoordinator, DispatchDecision, DispatchOutcome, Shipment};
use crate::error::{lift_ledger, KernelError};
use crate::machine::TradeStateMachine;
use crate::milestone::{MilestoneState, MilestoneTracker};

/// An escrow status report from the payment collaborator.
///
/// Recording a signal only unblocks a gate for a subsequently requested
/// transition; it moves nothing by itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EscrowSignal {
    /// The buyer's deposit is held in escrow.
    Funded {
        /// Payment-gateway reference, if provided.
        reference: Option<String>,
    },
    /// The escrowed funds were released to the seller.
    Released {
        /// Payment-gateway reference, if provided.
        reference: Option<String>,
    },
    /// The escrowed funds were returned to the buyer.
    Refunded {
        /// Payment-gateway reference, if provided.
        reference: Option<String>,
    },
}

/// The kernel: one handle per process, shared freely across threads.
pub struct TradeKernel {
    store: Arc<TradeStore>,
    machine: TradeStateMachine,
    dispatch: DispatchCoordinator,
    milestones: MilestoneTracker,
}

impl TradeKernel {
    /// Create a kernel over a fresh store.
    pub fn new() -> Self {
        let store = Arc::new(TradeStore::new());
        Self {
            machine: TradeStateMachine::new(Arc::clone(&store)),
            dispatch: DispatchCoordinator::new(Arc::clone(&store)),
            milestones: MilestoneTracker::new(Arc::clone(&store)),
            store,
        }
    }

    /// The underlying store, for read paths and bindings that need it.
    pub fn store(&self) -> &Arc<TradeStore> {
        &self.store
    }

    // ── Trade lifecycle ────────────────────────────────────────────────

    /// Open a new trade in `Draft`.
    pub fn open_trade(
        &self,
        buyer: PartyId,
        seller: PartyId,
        terms: TradeTerms,
        corridor: Corridor,
    ) -> Result<Trade, KernelError> {
        self.store
            .create_trade(TradeId::new(), buyer, seller, terms, corridor)
            .map_err(lift_ledger)
    }

    /// Request a status transition (see [`TradeStateMachine`]).
    pub fn request_transition(
        &self,
        trade_id: TradeId,
        from_expected: TradeStatus,
        to: TradeStatus,
        evidence: Option<String>,
    ) -> Result<TransitionCommit, KernelError> {
        self.machine
            .request_transition(trade_id, from_expected, to, evidence)
    }

    /// The current snapshot for optimistic concurrency.
    pub fn snapshot(&self, trade_id: TradeId) -> Result<TradeSnapshot, KernelError> {
        self.machine.snapshot(trade_id)
    }

    // ── Inbound signals ────────────────────────────────────────────────

    /// Record an escrow status signal as a ledger fact.
    pub fn record_escrow_signal(
        &self,
        trade_id: TradeId,
        signal: EscrowSignal,
    ) -> Result<TradeEvent, KernelError> {
        let body = match signal {
            EscrowSignal::Funded { reference } => EventBody::EscrowFunded { reference },
            EscrowSignal::Released { reference } => EventBody::PaymentReleased { reference },
            EscrowSignal::Refunded { reference } => EventBody::EscrowRefunded { reference },
        };
        self.store
            .append_signal(trade_id, body)
            .map_err(lift_ledger)
    }

    /// Record a dispute filing as a ledger fact.
    ///
    /// The trade only enters `Disputed` when a party subsequently requests
    /// that transition; the gate requires this fact to exist.
    pub fn record_dispute(
        &self,
        trade_id: TradeId,
        raised_by: PartyId,
        reason: impl Into<String>,
    ) -> Result<TradeEvent, KernelError> {
        self.store
            .append_signal(
                trade_id,
                EventBody::DisputeCreated {
                    raised_by,
                    reason: reason.into(),
                },
            )
            .map_err(lift_ledger)
    }

    // ── Dispatch ───────────────────────────────────────────────────────

    /// Handle one provider response (see [`DispatchCoordinator`]).
    pub fn respond(
        &self,
        trade_id: TradeId,
        provider_id: ProviderId,
        decision: DispatchDecision,
        eta: Option<Timestamp>,
    ) -> Result<DispatchOutcome, KernelError> {
        self.dispatch.respond(trade_id, provider_id, decision, eta)
    }

    /// The shipment record for a trade, if one has been created.
    pub fn shipment(&self, trade_id: TradeId) -> Option<Shipment> {
        self.dispatch.shipment(trade_id)
    }

    /// Whether a provider is free to receive new offers.
    pub fn provider_available(&self, provider_id: ProviderId) -> bool {
        self.dispatch.is_available(provider_id)
    }

    // ── Milestones ─────────────────────────────────────────────────────

    /// Record milestone verification evidence.
    ///
    /// Completing the final delivery also moves the shipment record to
    /// `Delivered` and frees the provider.
    pub fn advance_milestone(
        &self,
        trade_id: TradeId,
        milestone: Milestone,
        stage: MilestoneStage,
        evidence: Option<String>,
    ) -> Result<MilestoneState, KernelError> {
        let state = self
            .milestones
            .advance(trade_id, milestone, stage, evidence)?;
        if milestone == Milestone::FinalDelivery && state.stage == MilestoneStage::Completed {
            if self.dispatch.mark_delivered(trade_id).is_none() {
                tracing::warn!(
                    trade_id = %trade_id,
                    "final delivery completed without an assigned shipment"
                );
            }
        }
        Ok(state)
    }

    /// The full milestone checklist in corridor order.
    pub fn milestones(&self, trade_id: TradeId) -> Result<Vec<MilestoneState>, KernelError> {
        self.milestones.milestones(trade_id)
    }

    // ── Reads and subscriptions ────────────────────────────────────────

    /// The full ordered event sequence for a trade.
    pub fn replay(&self, trade_id: TradeId) -> Result<Vec<TradeEvent>, KernelError> {
        self.store.replay(trade_id).map_err(lift_ledger)
    }

    /// The most recent `limit` events, newest first.
    pub fn tail(&self, trade_id: TradeId, limit: usize) -> Result<Vec<TradeEvent>, KernelError> {
        self.store.tail(trade_id, limit).map_err(lift_ledger)
    }

    /// Recompute the status purely from the ledger.
    pub fn fold_status(&self, trade_id: TradeId) -> Result<TradeStatus, KernelError> {
        self.store.fold_status(trade_id).map_err(lift_ledger)
    }

    /// Subscribe to every appended event.
    pub fn subscribe(&self) -> Receiver<TradeEvent> {
        self.store.subscribe()
    }

    /// Subscribe to events for a single trade.
    pub fn subscribe_trade(&self, trade_id: TradeId) -> Receiver<TradeEvent> {
        self.store.subscribe_trade(trade_id)
    }
}

impl Default for TradeKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TradeKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeKernel")
            .field("store", &self.store)
            .finish()
    }
}
