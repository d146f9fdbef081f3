// SPDX-License-Identifier: BUSL-1.1
//! # Ledger Error Types
//!
//! Every variant carries enough context for operators to diagnose a failure
//! without inspecting logs: the trade involved, and for optimistic-
//! concurrency conflicts the expected and actual statuses.

use thiserror::Error;

/// Errors arising from trade store and ledger operations.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// A trade with this identifier already exists.
    #[error("trade already exists: {trade_id}")]
    TradeExists {
        /// The conflicting trade identifier.
        trade_id: String,
    },

    /// No trade with this identifier is known to the store.
    #[error("trade not found: {trade_id}")]
    TradeNotFound {
        /// The unknown trade identifier.
        trade_id: String,
    },

    /// The conditional write found a different status than the caller
    /// expected. Retryable: re-read the snapshot and re-evaluate.
    #[error("stale state for {trade_id}: expected {expected}, found {actual}")]
    StaleState {
        /// The trade identifier.
        trade_id: String,
        /// The status the caller expected.
        expected: String,
        /// The status actually persisted.
        actual: String,
    },
}
