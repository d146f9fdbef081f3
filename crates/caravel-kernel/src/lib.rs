// SPDX-License-Identifier: BUSL-1.1
#![deny(missing_docs)]

//! # caravel-kernel — Trade Lifecycle Kernel
//!
//! Coordinates a multi-party trade from request-for-quote through settlement
//! so that money, goods, and paperwork only move in a valid order:
//!
//! - **State Machine** ([`machine`]): validates and commits status
//!   transitions through a three-guard pipeline ending in the store's
//!   conditional write.
//!
//! - **Escrow Gate** ([`gate`]): the declarative rule table coupling
//!   transitions to financial facts recorded in the ledger.
//!
//! - **Dispatch Coordinator** ([`dispatch`]): race-safe "first responder
//!   wins" shipment assignment — exactly one of N concurrent acceptors
//!   commits, and every attempt is on the ledger.
//!
//! - **Milestone Tracker** ([`milestone`]): the event-driven checkpoint
//!   checklist from escrow funding to final delivery.
//!
//! - **Facade** ([`service`]): [`TradeKernel`] composes the pieces and
//!   records inbound escrow and dispute signals.
//!
//! The kernel decides nothing about business correctness of quotes or
//! prices, executes no payments, and performs no routing or provider
//! discovery — it arbitrates responses and guards the lifecycle.

pub mod dispatch;
pub mod error;
pub mod gate;
pub mod machine;
pub mod milestone;
pub mod service;

// Re-export primary types for ergonomic imports.
pub use dispatch::{
    AssignmentState, DispatchCoordinator, DispatchDecision, DispatchOutcome, Shipment,
};
pub use error::KernelError;
pub use gate::{EscrowGate, GateRequirement};
pub use machine::TradeStateMachine;
pub use milestone::{fold_milestone, MilestoneState, MilestoneTracker};
pub use service::{EscrowSignal, TradeKernel};
