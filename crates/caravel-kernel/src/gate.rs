// SPDX-License-Identifier: BUSL-1.1
//! # Escrow Gate
//!
//! A declarative rule table coupling state transitions to financial facts.
//! Some edges in the lifecycle graph are legal in shape but must not be
//! taken until an external signal has been recorded in the ledger:
//!
//! | edge | requires |
//! |------|----------|
//! | `ESCROW_REQUIRED → ESCROW_FUNDED` | an `escrow_funded` event |
//! | `ACCEPTED → SETTLED` | a `payment_released` event |
//! | `DISPUTED → SETTLED` | a `payment_released` event |
//! | any `* → DISPUTED` | a `dispute_created` event |
//! | forward moves out of `ESCROW_FUNDED`..`DELIVERED` | no refund in effect |
//!
//! The gate is stateless logic over the event sequence — it holds no data of
//! its own, and predicates are evaluated against ledger *history*, not just
//! the most recent event. The refund rule is the history-sensitive one: an
//! `escrow_refunded` signal freezes forward movement on the fulfillment
//! stretch until a newer `escrow_funded` supersedes it.

use caravel_core::TradeStatus;
use caravel_ledger::{EventBody, TradeEvent};

/// A financial precondition a gated transition waits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRequirement {
    /// An `escrow_funded` event must exist.
    EscrowFunded,
    /// A `payment_released` event must exist.
    PaymentReleased,
    /// A `dispute_created` event must exist.
    DisputeFiled,
    /// No `escrow_refunded` event may be in effect (i.e. recorded after the
    /// most recent `escrow_funded`).
    EscrowNotRefunded,
}

impl GateRequirement {
    /// Human-readable description for "waiting on X" surfaces.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::EscrowFunded => "an escrow funding signal",
            Self::PaymentReleased => "a payment release signal",
            Self::DisputeFiled => "a recorded dispute",
            Self::EscrowNotRefunded => "escrow to be re-funded after a refund",
        }
    }

    /// Evaluate this predicate against a trade's event history.
    pub fn satisfied(&self, events: &[TradeEvent]) -> bool {
        match self {
            Self::EscrowFunded => events
                .iter()
                .any(|e| matches!(e.body, EventBody::EscrowFunded { .. })),
            Self::PaymentReleased => events
                .iter()
                .any(|e| matches!(e.body, EventBody::PaymentReleased { .. })),
            Self::DisputeFiled => events
                .iter()
                .any(|e| matches!(e.body, EventBody::DisputeCreated { .. })),
            Self::EscrowNotRefunded => {
                // A refund only counts while no later funding supersedes it.
                let mut refund_in_effect = false;
                for event in events {
                    match event.body {
                        EventBody::EscrowRefunded { .. } => refund_in_effect = true,
                        EventBody::EscrowFunded { .. } => refund_in_effect = false,
                        _ => {}
                    }
                }
                !refund_in_effect
            }
        }
    }
}

impl std::fmt::Display for GateRequirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.describe())
    }
}

/// The stateless escrow gate.
pub struct EscrowGate;

impl EscrowGate {
    /// The requirements attached to an `from → to` edge, in evaluation
    /// order. Most edges have none.
    pub fn requirements_for(from: TradeStatus, to: TradeStatus) -> Vec<GateRequirement> {
        let mut requirements = Vec::new();

        if to == TradeStatus::Disputed {
            requirements.push(GateRequirement::DisputeFiled);
            // Raising a dispute is never frozen by a refund.
            return requirements;
        }

        match (from, to) {
            (TradeStatus::EscrowRequired, TradeStatus::EscrowFunded) => {
                requirements.push(GateRequirement::EscrowFunded);
            }
            (TradeStatus::Accepted, TradeStatus::Settled)
            | (TradeStatus::Disputed, TradeStatus::Settled) => {
                requirements.push(GateRequirement::PaymentReleased);
            }
            _ => {}
        }

        // Forward movement on the physical-fulfillment stretch is frozen
        // while a refund is in effect.
        if matches!(
            from,
            TradeStatus::EscrowFunded
                | TradeStatus::Production
                | TradeStatus::PickupScheduled
                | TradeStatus::InTransit
                | TradeStatus::Delivered
        ) {
            requirements.push(GateRequirement::EscrowNotRefunded);
        }

        requirements
    }

    /// Check every requirement on the edge against the event history.
    ///
    /// # Errors
    ///
    /// Returns the first unmet [`GateRequirement`].
    pub fn check(
        from: TradeStatus,
        to: TradeStatus,
        events: &[TradeEvent],
    ) -> Result<(), GateRequirement> {
        for requirement in Self::requirements_for(from, to) {
            if !requirement.satisfied(events) {
                return Err(requirement);
            }
        }
        Ok(())
    }
}
