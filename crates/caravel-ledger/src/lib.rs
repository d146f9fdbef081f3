// SPDX-License-Identifier: BUSL-1.1
#![deny(missing_docs)]

//! # caravel-ledger — Event Ledger and Trade Store
//!
//! The append-only source of truth for everything the kernel knows about a
//! trade:
//!
//! - **Events** ([`event`]): immutable typed facts with per-trade sequence
//!   numbers — transitions, escrow signals, provider responses, milestone
//!   verifications, disputes.
//!
//! - **Store** ([`store`]): the conditional-write substrate. One entry lock
//!   per trade guards both the record and its log, so a status change and
//!   its audit event are a single write. `commit_transition` is the
//!   compare-and-swap every state change in the system funnels through.
//!
//! - **Feed** ([`feed`]): publish mechanism for appended events, decoupled
//!   from the write path — notification delivery can never affect commit
//!   correctness.

pub mod error;
pub mod event;
pub mod feed;
pub mod store;

// Re-export primary types for ergonomic imports.
pub use error::LedgerError;
pub use event::{EventBody, EventKind, TradeEvent};
pub use feed::EventFeed;
pub use store::{fold_status_events, Trade, TradeSnapshot, TradeStore, TransitionCommit};
