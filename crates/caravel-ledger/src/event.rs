// SPDX-License-Identifier: BUSL-1.1
//! # Trade Events
//!
//! Immutable facts about a trade. Every event carries the trade it belongs
//! to, a per-trade sequence number assigned at append time, and a typed
//! body. Once written an event is never updated or deleted; the current
//! trade status is always derivable as a pure fold over the sequence.

use caravel_core::{
    EventId, Milestone, MilestoneStage, PartyId, ProviderId, ShipmentId, Timestamp, TradeId,
    TradeStatus,
};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Event kind
// ---------------------------------------------------------------------------

/// Discriminant for the kinds of facts the ledger records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Trade record created in `DRAFT`.
    TradeCreated,
    /// A validated status transition was committed.
    StateTransition,
    /// A transition attempt reached the conditional write and lost the race.
    TransitionConflict,
    /// The payment collaborator reported escrow funded.
    EscrowFunded,
    /// The payment collaborator reported escrowed funds released.
    PaymentReleased,
    /// The payment collaborator reported escrow refunded to the buyer.
    EscrowRefunded,
    /// A provider accepted a dispatch offer (before arbitration).
    ProviderAccepted,
    /// A provider declined a dispatch offer.
    ProviderRejected,
    /// A provider accepted but another responder had already won.
    ProviderAcceptedButLostRace,
    /// The dispatch race was won; the shipment has an assignee.
    ShipmentAssigned,
    /// Milestone evidence was verified.
    MilestoneVerified,
    /// A party raised a dispute.
    DisputeCreated,
}

impl EventKind {
    /// The canonical string identifier for serialization and timelines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TradeCreated => "trade_created",
            Self::StateTransition => "state_transition",
            Self::TransitionConflict => "transition_conflict",
            Self::EscrowFunded => "escrow_funded",
            Self::PaymentReleased => "payment_released",
            Self::EscrowRefunded => "escrow_refunded",
            Self::ProviderAccepted => "provider_accepted",
            Self::ProviderRejected => "provider_rejected",
            Self::ProviderAcceptedButLostRace => "provider_accepted_but_lost_race",
            Self::ShipmentAssigned => "shipment_assigned",
            Self::MilestoneVerified => "milestone_verified",
            Self::DisputeCreated => "dispute_created",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Event body
// ---------------------------------------------------------------------------

/// The typed payload of a ledger event.
///
/// Each variant corresponds to one [`EventKind`]; the serialized form is
/// tagged with the kind string so timeline consumers can dispatch without
/// knowing every payload shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum EventBody {
    /// Trade record created.
    #[serde(rename = "trade_created")]
    TradeCreated {
        /// The buying party.
        buyer: PartyId,
        /// The selling party.
        seller: PartyId,
    },

    /// Validated status transition.
    #[serde(rename = "state_transition")]
    StateTransition {
        /// Status before the transition.
        from: TradeStatus,
        /// Status after the transition.
        to: TradeStatus,
        /// Free-form evidence reference (document id, signature, token).
        #[serde(skip_serializing_if = "Option::is_none")]
        evidence: Option<String>,
    },

    /// Audit record of a transition attempt that lost the optimistic race.
    #[serde(rename = "transition_conflict")]
    TransitionConflict {
        /// The status the caller expected.
        expected: TradeStatus,
        /// The status actually persisted at write time.
        actual: TradeStatus,
        /// The target the caller was requesting.
        target: TradeStatus,
    },

    /// Escrow funded signal.
    #[serde(rename = "escrow_funded")]
    EscrowFunded {
        /// Payment-gateway reference, if provided.
        #[serde(skip_serializing_if = "Option::is_none")]
        reference: Option<String>,
    },

    /// Payment released signal.
    #[serde(rename = "payment_released")]
    PaymentReleased {
        /// Payment-gateway reference, if provided.
        #[serde(skip_serializing_if = "Option::is_none")]
        reference: Option<String>,
    },

    /// Escrow refunded signal.
    #[serde(rename = "escrow_refunded")]
    EscrowRefunded {
        /// Payment-gateway reference, if provided.
        #[serde(skip_serializing_if = "Option::is_none")]
        reference: Option<String>,
    },

    /// Provider accepted a dispatch offer.
    #[serde(rename = "provider_accepted")]
    ProviderAccepted {
        /// The responding provider.
        provider: ProviderId,
        /// Estimated pickup time offered by the provider.
        #[serde(skip_serializing_if = "Option::is_none")]
        eta: Option<Timestamp>,
    },

    /// Provider declined a dispatch offer.
    #[serde(rename = "provider_rejected")]
    ProviderRejected {
        /// The responding provider.
        provider: ProviderId,
    },

    /// Provider accepted after another responder had already won.
    #[serde(rename = "provider_accepted_but_lost_race")]
    ProviderAcceptedButLostRace {
        /// The losing provider.
        provider: ProviderId,
    },

    /// Shipment assigned to the winning provider.
    #[serde(rename = "shipment_assigned")]
    ShipmentAssigned {
        /// The shipment record that was assigned.
        shipment: ShipmentId,
        /// The winning provider.
        provider: ProviderId,
        /// Scheduled pickup time, if the provider offered one.
        #[serde(skip_serializing_if = "Option::is_none")]
        pickup_at: Option<Timestamp>,
    },

    /// Milestone evidence verified.
    #[serde(rename = "milestone_verified")]
    MilestoneVerified {
        /// The milestone the evidence applies to.
        milestone: Milestone,
        /// The stage the verification advances the milestone to.
        stage: MilestoneStage,
        /// Free-form evidence reference.
        #[serde(skip_serializing_if = "Option::is_none")]
        evidence: Option<String>,
    },

    /// A party raised a dispute.
    #[serde(rename = "dispute_created")]
    DisputeCreated {
        /// The party raising the dispute.
        raised_by: PartyId,
        /// Human-readable reason.
        reason: String,
    },
}

impl EventBody {
    /// The kind discriminant of this body.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::TradeCreated { .. } => EventKind::TradeCreated,
            Self::StateTransition { .. } => EventKind::StateTransition,
            Self::TransitionConflict { .. } => EventKind::TransitionConflict,
            Self::EscrowFunded { .. } => EventKind::EscrowFunded,
            Self::PaymentReleased { .. } => EventKind::PaymentReleased,
            Self::EscrowRefunded { .. } => EventKind::EscrowRefunded,
            Self::ProviderAccepted { .. } => EventKind::ProviderAccepted,
            Self::ProviderRejected { .. } => EventKind::ProviderRejected,
            Self::ProviderAcceptedButLostRace { .. } => EventKind::ProviderAcceptedButLostRace,
            Self::ShipmentAssigned { .. } => EventKind::ShipmentAssigned,
            Self::MilestoneVerified { .. } => EventKind::MilestoneVerified,
            Self::DisputeCreated { .. } => EventKind::DisputeCreated,
        }
    }
}

// ---------------------------------------------------------------------------
// The event record
// ---------------------------------------------------------------------------

/// One immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    /// Unique event identifier.
    pub event_id: EventId,
    /// The trade this event belongs to.
    pub trade_id: TradeId,
    /// Per-trade sequence number, strictly increasing from 1.
    pub sequence: u64,
    /// The typed fact.
    pub body: EventBody,
    /// When the event was appended (UTC).
    pub recorded_at: Timestamp,
}

impl TradeEvent {
    /// The kind discriminant of this event.
    pub fn kind(&self) -> EventKind {
        self.body.kind()
    }
}
