// SPDX-License-Identifier: BUSL-1.1
//! # Milestone Checklist — Integration Tests
//!
//! The event-driven checklist from escrow funding to final delivery:
//! forward-only progress, idempotent advances, and the shipment hand-off on
//! delivery completion.

use caravel_core::{
    Corridor, Milestone, MilestoneStage, PartyId, ProviderId, TradeAmount, TradeId, TradeStatus,
    TradeTerms,
};
use caravel_kernel::{
    AssignmentState, DispatchDecision, EscrowSignal, TradeKernel,
};
use caravel_ledger::EventKind;

fn open_trade(kernel: &TradeKernel) -> TradeId {
    kernel
        .open_trade(
            PartyId::new(),
            PartyId::new(),
            TradeTerms::new(
                "Pharmaceutical intermediates",
                "60",
                TradeAmount::new("USD", "950").unwrap(),
                TradeAmount::new("USD", "57000").unwrap(),
            )
            .unwrap(),
            Corridor::new("INNSA", "NLRTM"),
        )
        .unwrap()
        .trade_id
}

fn advance_to(kernel: &TradeKernel, trade_id: TradeId, target: TradeStatus) {
    let mut current = kernel.snapshot(trade_id).unwrap().status;
    while current != target {
        let next = current.successor().unwrap();
        match next {
            TradeStatus::EscrowFunded => {
                kernel
                    .record_escrow_signal(trade_id, EscrowSignal::Funded { reference: None })
                    .unwrap();
            }
            TradeStatus::Settled => {
                kernel
                    .record_escrow_signal(trade_id, EscrowSignal::Released { reference: None })
                    .unwrap();
            }
            _ => {}
        }
        kernel
            .request_transition(trade_id, current, next, None)
            .unwrap();
        current = next;
    }
}

#[test]
fn checklist_walks_the_corridor_in_order() {
    let kernel = TradeKernel::new();
    let trade_id = open_trade(&kernel);

    let stages = [
        (Milestone::EscrowFunded, "pg-receipt-1"),
        (Milestone::OriginLogistics, "truck-gps-2"),
        (Milestone::ExportClearance, "customs-3"),
        (Milestone::Freight, "bol-4"),
        (Milestone::ImportClearance, "customs-5"),
        (Milestone::FinalDelivery, "pod-6"),
    ];

    for (milestone, evidence) in stages {
        kernel
            .advance_milestone(
                trade_id,
                milestone,
                MilestoneStage::Completed,
                Some(evidence.to_string()),
            )
            .unwrap();
    }

    let checklist = kernel.milestones(trade_id).unwrap();
    assert_eq!(checklist.len(), 6);
    for (state, (milestone, evidence)) in checklist.iter().zip(stages) {
        assert_eq!(state.milestone, milestone);
        assert_eq!(state.stage, MilestoneStage::Completed);
        assert_eq!(state.evidence.as_deref(), Some(evidence));
        assert!(state.reached_at.is_some());
    }
}

#[test]
fn milestones_never_regress() {
    let kernel = TradeKernel::new();
    let trade_id = open_trade(&kernel);

    kernel
        .advance_milestone(
            trade_id,
            Milestone::ExportClearance,
            MilestoneStage::Completed,
            Some("cleared".to_string()),
        )
        .unwrap();

    // Idempotent repeat and regression attempt: both no-ops.
    let before = kernel.replay(trade_id).unwrap().len();
    let state = kernel
        .advance_milestone(
            trade_id,
            Milestone::ExportClearance,
            MilestoneStage::Completed,
            Some("cleared".to_string()),
        )
        .unwrap();
    assert_eq!(state.stage, MilestoneStage::Completed);
    let state = kernel
        .advance_milestone(
            trade_id,
            Milestone::ExportClearance,
            MilestoneStage::InProgress,
            None,
        )
        .unwrap();
    assert_eq!(state.stage, MilestoneStage::Completed);
    assert_eq!(state.evidence.as_deref(), Some("cleared"));
    assert_eq!(kernel.replay(trade_id).unwrap().len(), before);
}

#[test]
fn each_advance_is_one_ledger_event() {
    let kernel = TradeKernel::new();
    let trade_id = open_trade(&kernel);

    kernel
        .advance_milestone(
            trade_id,
            Milestone::Freight,
            MilestoneStage::InProgress,
            None,
        )
        .unwrap();
    kernel
        .advance_milestone(
            trade_id,
            Milestone::Freight,
            MilestoneStage::Completed,
            None,
        )
        .unwrap();

    let verifications = kernel
        .replay(trade_id)
        .unwrap()
        .iter()
        .filter(|e| e.kind() == EventKind::MilestoneVerified)
        .count();
    assert_eq!(verifications, 2);
}

#[test]
fn completing_final_delivery_delivers_the_assigned_shipment() {
    let kernel = TradeKernel::new();
    let trade_id = open_trade(&kernel);
    advance_to(&kernel, trade_id, TradeStatus::Production);

    let provider = ProviderId::new();
    kernel
        .respond(trade_id, provider, DispatchDecision::Accept, None)
        .unwrap();
    assert!(!kernel.provider_available(provider));

    advance_to(&kernel, trade_id, TradeStatus::Delivered);
    kernel
        .advance_milestone(
            trade_id,
            Milestone::FinalDelivery,
            MilestoneStage::Completed,
            Some("signature-token".to_string()),
        )
        .unwrap();

    let shipment = kernel.shipment(trade_id).unwrap();
    assert_eq!(shipment.state, AssignmentState::Delivered);
    assert_eq!(shipment.assigned_provider, Some(provider));
    assert!(kernel.provider_available(provider));
}

#[test]
fn delivery_completion_without_a_shipment_is_tolerated() {
    let kernel = TradeKernel::new();
    let trade_id = open_trade(&kernel);

    // No dispatch ever happened; the milestone still completes and nothing
    // panics.
    let state = kernel
        .advance_milestone(
            trade_id,
            Milestone::FinalDelivery,
            MilestoneStage::Completed,
            None,
        )
        .unwrap();
    assert_eq!(state.stage, MilestoneStage::Completed);
    assert!(kernel.shipment(trade_id).is_none());
}

#[test]
fn milestones_are_scoped_per_trade() {
    let kernel = TradeKernel::new();
    let trade_a = open_trade(&kernel);
    let trade_b = open_trade(&kernel);

    kernel
        .advance_milestone(
            trade_a,
            Milestone::Freight,
            MilestoneStage::Completed,
            None,
        )
        .unwrap();

    let a_state = kernel.milestones(trade_a).unwrap();
    let b_state = kernel.milestones(trade_b).unwrap();
    assert_eq!(
        a_state
            .iter()
            .find(|m| m.milestone == Milestone::Freight)
            .unwrap()
            .stage,
        MilestoneStage::Completed
    );
    assert!(b_state.iter().all(|m| m.stage == MilestoneStage::Pending));
}
