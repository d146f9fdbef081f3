// SPDX-License-Identifier: BUSL-1.1
//! # Milestone Tracker
//!
//! Maintains the per-trade checkpoint checklist (escrow → origin logistics →
//! export clearance → freight → import clearance → final delivery). The
//! checklist is driven entirely by `milestone_verified` events — it is not a
//! separate source of truth. A milestone's stage is the maximum stage among
//! its verification events, so replays are order-insensitive and regression
//! is structurally impossible.

use std::sync::Arc;

use caravel_core::{Milestone, MilestoneStage, Timestamp, TradeId};
use caravel_ledger::{EventBody, TradeEvent, TradeStore};
use serde::{Deserialize, Serialize};

use crate::error::{lift_ledger, KernelError};

/// The derived progress of one milestone for one trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneState {
    /// The milestone.
    pub milestone: Milestone,
    /// Current stage, folded from the ledger.
    pub stage: MilestoneStage,
    /// Evidence reference of the event that set the current stage.
    pub evidence: Option<String>,
    /// When the current stage was reached; `None` while `Pending`.
    pub reached_at: Option<Timestamp>,
}

impl MilestoneState {
    fn pending(milestone: Milestone) -> Self {
        Self {
            milestone,
            stage: MilestoneStage::Pending,
            evidence: None,
            reached_at: None,
        }
    }
}

/// Event-driven milestone checklist.
pub struct MilestoneTracker {
    store: Arc<TradeStore>,
}

impl MilestoneTracker {
    /// Create a tracker over the given store.
    pub fn new(store: Arc<TradeStore>) -> Self {
        Self { store }
    }

    /// Record verification evidence advancing `milestone` to `stage`.
    ///
    /// Idempotent by construction: if the milestone already sits at or past
    /// the requested stage, nothing is appended and the current state is
    /// returned. Advancing to `Pending` is likewise a no-op.
    pub fn advance(
        &self,
        trade_id: TradeId,
        milestone: Milestone,
        stage: MilestoneStage,
        evidence: Option<String>,
    ) -> Result<MilestoneState, KernelError> {
        let current = self.status_of(trade_id, milestone)?;
        if current.stage >= stage {
            return Ok(current);
        }

        self.store
            .append_signal(
                trade_id,
                EventBody::MilestoneVerified {
                    milestone,
                    stage,
                    evidence,
                },
            )
            .map_err(lift_ledger)?;
        tracing::debug!(
            trade_id = %trade_id,
            milestone = %milestone,
            stage = %stage,
            "milestone advanced"
        );
        self.status_of(trade_id, milestone)
    }

    /// The folded state of one milestone.
    pub fn status_of(
        &self,
        trade_id: TradeId,
        milestone: Milestone,
    ) -> Result<MilestoneState, KernelError> {
        let events = self.store.replay(trade_id).map_err(lift_ledger)?;
        Ok(fold_milestone(&events, milestone))
    }

    /// The full checklist in corridor order.
    pub fn milestones(&self, trade_id: TradeId) -> Result<Vec<MilestoneState>, KernelError> {
        let events = self.store.replay(trade_id).map_err(lift_ledger)?;
        Ok(Milestone::all()
            .iter()
            .map(|m| fold_milestone(&events, *m))
            .collect())
    }
}

/// Fold the events relevant to one milestone down to its state.
pub fn fold_milestone(events: &[TradeEvent], milestone: Milestone) -> MilestoneState {
    let mut state = MilestoneState::pending(milestone);
    for event in events {
        if let EventBody::MilestoneVerified {
            milestone: m,
            stage,
            ref evidence,
        } = event.body
        {
            if m == milestone && stage > state.stage {
                state.stage = stage;
                state.evidence = evidence.clone();
                state.reached_at = Some(event.recorded_at);
            }
        }
    }
    state
}
