// SPDX-License-Identifier: BUSL-1.1
//! # Kernel Error Types
//!
//! The kernel's failure taxonomy, split by how a caller should react:
//!
//! - **Contention** ([`StaleState`](KernelError::StaleState),
//!   [`JobAlreadyAssigned`](KernelError::JobAlreadyAssigned)) — expected
//!   under normal concurrent operation. `StaleState` is retryable after
//!   re-reading the snapshot; a lost dispatch race is final for that job.
//!
//! - **Precondition** ([`EscrowGateBlocked`](KernelError::EscrowGateBlocked))
//!   — the path is valid but a financial signal has not arrived yet.
//!   Retryable once the external event occurs; surfaced to users as
//!   "waiting on X", not as a bug.
//!
//! - **Illegal request** ([`IllegalTransition`](KernelError::IllegalTransition),
//!   [`TradeNotDispatchable`](KernelError::TradeNotDispatchable)) — caller
//!   logic error or a stale client view. Never retried verbatim.

use thiserror::Error;

use caravel_ledger::LedgerError;

/// Errors arising from kernel operations.
#[derive(Error, Debug)]
pub enum KernelError {
    /// The trade's persisted status did not match the caller's expectation.
    /// Re-read the snapshot and re-evaluate.
    #[error("stale state for {trade_id}: expected {expected}, found {actual}")]
    StaleState {
        /// The trade identifier.
        trade_id: String,
        /// The status the caller expected.
        expected: String,
        /// The status actually persisted.
        actual: String,
    },

    /// The requested target is not a legal successor of the current status.
    #[error("illegal transition for {trade_id}: {from} cannot move to {to}")]
    IllegalTransition {
        /// The trade identifier.
        trade_id: String,
        /// The status the transition was requested from.
        from: String,
        /// The illegal target.
        to: String,
    },

    /// The transition edge is valid but a required financial signal has not
    /// been observed in the ledger yet.
    #[error("transition {from} -> {to} for {trade_id} blocked: waiting on {requirement}")]
    EscrowGateBlocked {
        /// The trade identifier.
        trade_id: String,
        /// The status the transition was requested from.
        from: String,
        /// The gated target.
        to: String,
        /// Human-readable description of the unmet requirement.
        requirement: String,
    },

    /// Another provider already won the dispatch race for this trade.
    /// The winner's identity is deliberately not disclosed.
    #[error("dispatch job for {trade_id} is already assigned")]
    JobAlreadyAssigned {
        /// The trade identifier.
        trade_id: String,
    },

    /// The trade is not in a status that allows dispatch responses.
    #[error("trade {trade_id} is not dispatchable in status {status}")]
    TradeNotDispatchable {
        /// The trade identifier.
        trade_id: String,
        /// The current status.
        status: String,
    },

    /// No trade with this identifier is known to the kernel.
    #[error("trade not found: {trade_id}")]
    TradeNotFound {
        /// The unknown trade identifier.
        trade_id: String,
    },

    /// An underlying ledger failure not covered by a more specific variant.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl KernelError {
    /// Whether the caller may retry the same request after re-reading state
    /// (contention) or after an external event (precondition).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StaleState { .. } | Self::EscrowGateBlocked { .. }
        )
    }
}

/// Lift a ledger error into the kernel taxonomy, promoting the variants the
/// taxonomy names.
pub(crate) fn lift_ledger(err: LedgerError) -> KernelError {
    match err {
        LedgerError::StaleState {
            trade_id,
            expected,
            actual,
        } => KernelError::StaleState {
            trade_id,
            expected,
            actual,
        },
        LedgerError::TradeNotFound { trade_id } => KernelError::TradeNotFound { trade_id },
        other => KernelError::Ledger(other),
    }
}
