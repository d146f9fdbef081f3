// SPDX-License-Identifier: BUSL-1.1
//! # Trade Lifecycle Status
//!
//! The status of a trade progresses along a single ordered track from
//! [`Draft`](TradeStatus::Draft) to [`Closed`](TradeStatus::Closed), with
//! one exceptional branch: [`Disputed`](TradeStatus::Disputed) is reachable
//! from [`Contracted`](TradeStatus::Contracted) and every later non-terminal
//! state, and resolves back into the forward track at
//! [`Settled`](TradeStatus::Settled) or terminates at
//! [`Closed`](TradeStatus::Closed).
//!
//! ## Transition Graph
//!
//! ```text
//! Draft ─▶ RfqCreated ─▶ Quoted ─▶ Contracted ─▶ EscrowRequired
//!   ─▶ EscrowFunded ─▶ Production ─▶ PickupScheduled ─▶ InTransit
//!   ─▶ Delivered ─▶ Accepted ─▶ Settled ─▶ Closed
//!
//! Contracted..Settled (non-terminal) ──▶ Disputed
//!                                          ├─▶ Settled
//!                                          └─▶ Closed
//! ```
//!
//! The successor table here answers only *structural* legality ("is this
//! edge in the graph"). Financial preconditions (escrow funding, payment
//! release) are layered on top by the escrow gate in the kernel crate.

use serde::{Deserialize, Serialize};

/// The lifecycle status of a trade.
///
/// Ordered track plus the `Disputed` branch. The variant order of the
/// forward track is meaningful: [`successor()`](TradeStatus::successor)
/// walks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeStatus {
    /// Trade is being drafted by the initiating party.
    Draft,
    /// A request-for-quote has been published to sellers.
    RfqCreated,
    /// At least one quote has been attached and selected.
    Quoted,
    /// Both parties have signed the commercial terms.
    Contracted,
    /// Awaiting the buyer's escrow deposit.
    EscrowRequired,
    /// Escrow deposit confirmed by the payment collaborator.
    EscrowFunded,
    /// Goods are being produced or prepared for handover.
    Production,
    /// A logistics provider has been assigned and pickup is booked.
    PickupScheduled,
    /// Goods are moving through the corridor.
    InTransit,
    /// Goods have arrived at the destination.
    Delivered,
    /// The buyer has accepted the delivery.
    Accepted,
    /// Escrowed funds have been released to the seller.
    Settled,
    /// Trade lifecycle complete. Terminal state.
    Closed,
    /// A party has raised a dispute; the forward track is suspended.
    Disputed,
}

impl TradeStatus {
    /// The canonical string name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::RfqCreated => "RFQ_CREATED",
            Self::Quoted => "QUOTED",
            Self::Contracted => "CONTRACTED",
            Self::EscrowRequired => "ESCROW_REQUIRED",
            Self::EscrowFunded => "ESCROW_FUNDED",
            Self::Production => "PRODUCTION",
            Self::PickupScheduled => "PICKUP_SCHEDULED",
            Self::InTransit => "IN_TRANSIT",
            Self::Delivered => "DELIVERED",
            Self::Accepted => "ACCEPTED",
            Self::Settled => "SETTLED",
            Self::Closed => "CLOSED",
            Self::Disputed => "DISPUTED",
        }
    }

    /// Whether this status is terminal (no further transitions allowed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// The immediate successor on the forward track, if any.
    ///
    /// `Disputed` has no single successor — its resolutions are enumerated
    /// by [`valid_transitions()`](TradeStatus::valid_transitions).
    pub fn successor(&self) -> Option<TradeStatus> {
        match self {
            Self::Draft => Some(Self::RfqCreated),
            Self::RfqCreated => Some(Self::Quoted),
            Self::Quoted => Some(Self::Contracted),
            Self::Contracted => Some(Self::EscrowRequired),
            Self::EscrowRequired => Some(Self::EscrowFunded),
            Self::EscrowFunded => Some(Self::Production),
            Self::Production => Some(Self::PickupScheduled),
            Self::PickupScheduled => Some(Self::InTransit),
            Self::InTransit => Some(Self::Delivered),
            Self::Delivered => Some(Self::Accepted),
            Self::Accepted => Some(Self::Settled),
            Self::Settled => Some(Self::Closed),
            Self::Closed | Self::Disputed => None,
        }
    }

    /// Whether a dispute may be raised from this status.
    ///
    /// Disputes are available from `Contracted` onward: before signature
    /// there is nothing binding to dispute, and a closed trade is retained
    /// for audit only.
    pub fn can_dispute(&self) -> bool {
        !matches!(
            self,
            Self::Draft | Self::RfqCreated | Self::Quoted | Self::Closed | Self::Disputed
        )
    }

    /// Valid target statuses from this status.
    ///
    /// The union of the forward successor, the dispute branch where
    /// eligible, and the dispute resolutions.
    pub fn valid_transitions(&self) -> Vec<TradeStatus> {
        if *self == Self::Disputed {
            return vec![Self::Settled, Self::Closed];
        }
        let mut targets = Vec::with_capacity(2);
        if let Some(next) = self.successor() {
            targets.push(next);
        }
        if self.can_dispute() {
            targets.push(Self::Disputed);
        }
        targets
    }

    /// Whether `target` is a structurally legal transition from this status.
    pub fn allows(&self, target: TradeStatus) -> bool {
        self.valid_transitions().contains(&target)
    }
}

impl std::fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
