// SPDX-License-Identifier: BUSL-1.1
//! # Milestone Checklist Types
//!
//! The named checkpoints of a trade's physical and financial journey, in
//! corridor order. The checklist itself is fixed; per-trade progress is a
//! fold over the ledger's verification events, owned by the kernel crate.

use serde::{Deserialize, Serialize};

/// A named checkpoint in the journey of a trade's goods and funds.
///
/// The variant order is the corridor order: escrow first, final delivery
/// last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Milestone {
    /// Escrow deposit confirmed.
    EscrowFunded,
    /// Goods handed over to origin logistics.
    OriginLogistics,
    /// Export clearance granted at origin.
    ExportClearance,
    /// Main freight leg underway.
    Freight,
    /// Import clearance granted at destination.
    ImportClearance,
    /// Goods delivered to the buyer.
    FinalDelivery,
}

impl Milestone {
    /// All milestones in corridor order.
    pub fn all() -> &'static [Milestone] {
        &[
            Self::EscrowFunded,
            Self::OriginLogistics,
            Self::ExportClearance,
            Self::Freight,
            Self::ImportClearance,
            Self::FinalDelivery,
        ]
    }

    /// The canonical string identifier for serialization and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EscrowFunded => "escrow_funded",
            Self::OriginLogistics => "origin_logistics",
            Self::ExportClearance => "export_clearance",
            Self::Freight => "freight",
            Self::ImportClearance => "import_clearance",
            Self::FinalDelivery => "final_delivery",
        }
    }

    /// Human-readable label for timeline rendering.
    pub fn label(&self) -> &'static str {
        match self {
            Self::EscrowFunded => "Escrow Funded",
            Self::OriginLogistics => "Origin Logistics",
            Self::ExportClearance => "Export Clearance",
            Self::Freight => "Freight",
            Self::ImportClearance => "Import Clearance",
            Self::FinalDelivery => "Final Delivery",
        }
    }
}

impl std::fmt::Display for Milestone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The progress stage of one milestone. Stages only ever move forward; the
/// derive order (`Pending < InProgress < Completed`) is what milestone folds
/// compare by.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum MilestoneStage {
    /// Not yet started.
    Pending,
    /// Work underway, evidence partially collected.
    InProgress,
    /// Verified complete. Never regresses.
    Completed,
}

impl MilestoneStage {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for MilestoneStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
