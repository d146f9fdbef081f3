// SPDX-License-Identifier: BUSL-1.1
//! # Dispatch Coordinator
//!
//! Turns N concurrent "I'll take this job" responses from independent
//! provider processes into exactly one committed shipment assignment.
//!
//! The serialization point is one conditional write: the shipment record is
//! created lazily via insert-if-absent, and the assignment sets the provider
//! only if the slot is still null — both inside a single entry lock, never
//! as a read followed by a separate write. No application-level locks are
//! held across the operation, nothing is retried on the caller's behalf,
//! and losers are told only that the job is taken, not who took it.
//!
//! Every response is recorded in the trade's ledger regardless of outcome:
//! `provider_rejected`, `provider_accepted` + `shipment_assigned` for the
//! winner, `provider_accepted_but_lost_race` for everyone else.

use std::sync::Arc;

use caravel_core::{ProviderId, ShipmentId, Timestamp, TradeId, TradeStatus};
use caravel_ledger::{EventBody, TradeStore};
use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};

use crate::error::{lift_ledger, KernelError};

// ---------------------------------------------------------------------------
// Shipment record
// ---------------------------------------------------------------------------

/// Assignment state of a shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentState {
    /// No provider has won the job yet.
    Unassigned,
    /// Exactly one provider holds the job.
    Assigned,
    /// The goods have been delivered.
    Delivered,
}

impl AssignmentState {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unassigned => "unassigned",
            Self::Assigned => "assigned",
            Self::Delivered => "delivered",
        }
    }
}

impl std::fmt::Display for AssignmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The physical fulfillment record for one trade's logistics leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    /// Unique shipment identifier.
    pub shipment_id: ShipmentId,
    /// The trade this shipment fulfills.
    pub trade_id: TradeId,
    /// Current assignment state.
    pub state: AssignmentState,
    /// The winning provider; `None` exactly while `Unassigned`.
    pub assigned_provider: Option<ProviderId>,
    /// Scheduled pickup time, if the winner offered one.
    pub scheduled_pickup: Option<Timestamp>,
    /// When the record was created (UTC).
    pub created_at: Timestamp,
    /// When the record last changed (UTC).
    pub updated_at: Timestamp,
}

impl Shipment {
    fn unassigned(trade_id: TradeId) -> Self {
        let now = Timestamp::now();
        Self {
            shipment_id: ShipmentId::new(),
            trade_id,
            state: AssignmentState::Unassigned,
            assigned_provider: None,
            scheduled_pickup: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Responses and outcomes
// ---------------------------------------------------------------------------

/// A provider's decision on a dispatch offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchDecision {
    /// The provider takes the job (subject to winning the race).
    Accept,
    /// The provider declines; it stays eligible for other jobs.
    Reject,
}

/// The successful outcomes of [`DispatchCoordinator::respond`].
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// The rejection was recorded.
    Rejected,
    /// The provider won the race and holds the shipment.
    Assigned(Shipment),
}

// ---------------------------------------------------------------------------
// The coordinator
// ---------------------------------------------------------------------------

/// Race-safe assignment of shipments to providers.
pub struct DispatchCoordinator {
    store: Arc<TradeStore>,
    shipments: DashMap<TradeId, Shipment>,
    busy_providers: DashSet<ProviderId>,
}

impl DispatchCoordinator {
    /// Create a coordinator over the given store.
    pub fn new(store: Arc<TradeStore>) -> Self {
        Self {
            store,
            shipments: DashMap::new(),
            busy_providers: DashSet::new(),
        }
    }

    /// Handle one provider response for a trade's dispatch offer.
    ///
    /// Rejections are recorded and always succeed. Acceptances race: the
    /// first conditional write wins, everyone else observes
    /// [`KernelError::JobAlreadyAssigned`] — including two calls arriving in
    /// the same instant from different threads.
    ///
    /// # Errors
    ///
    /// - [`KernelError::TradeNotDispatchable`] — the trade is not in
    ///   `Production`.
    /// - [`KernelError::JobAlreadyAssigned`] — another responder already
    ///   won; final for this job.
    pub fn respond(
        &self,
        trade_id: TradeId,
        provider_id: ProviderId,
        decision: DispatchDecision,
        eta: Option<Timestamp>,
    ) -> Result<DispatchOutcome, KernelError> {
        let snapshot = self.store.snapshot(trade_id).map_err(lift_ledger)?;

        if decision == DispatchDecision::Reject {
            self.store
                .append_signal(
                    trade_id,
                    EventBody::ProviderRejected {
                        provider: provider_id,
                    },
                )
                .map_err(lift_ledger)?;
            return Ok(DispatchOutcome::Rejected);
        }

        if snapshot.status != TradeStatus::Production {
            return Err(KernelError::TradeNotDispatchable {
                trade_id: trade_id.to_string(),
                status: snapshot.status.as_str().to_string(),
            });
        }

        // The single serialization point. Lazy creation and the null-check
        // assignment happen under one entry lock: concurrent first-creators
        // converge on one record, and only the first acceptor finds the
        // provider slot empty.
        let (won, shipment) = {
            let mut entry = self
                .shipments
                .entry(trade_id)
                .or_insert_with(|| Shipment::unassigned(trade_id));
            if entry.assigned_provider.is_none() {
                entry.assigned_provider = Some(provider_id);
                entry.state = AssignmentState::Assigned;
                entry.scheduled_pickup = eta;
                entry.updated_at = Timestamp::now();
                (true, entry.value().clone())
            } else {
                (false, entry.value().clone())
            }
        };

        if won {
            self.busy_providers.insert(provider_id);
            self.store
                .append_signal(
                    trade_id,
                    EventBody::ProviderAccepted {
                        provider: provider_id,
                        eta,
                    },
                )
                .map_err(lift_ledger)?;
            self.store
                .append_signal(
                    trade_id,
                    EventBody::ShipmentAssigned {
                        shipment: shipment.shipment_id,
                        provider: provider_id,
                        pickup_at: eta,
                    },
                )
                .map_err(lift_ledger)?;
            tracing::debug!(
                trade_id = %trade_id,
                provider_id = %provider_id,
                shipment_id = %shipment.shipment_id,
                "dispatch race won"
            );
            Ok(DispatchOutcome::Assigned(shipment))
        } else {
            self.store
                .append_signal(
                    trade_id,
                    EventBody::ProviderAcceptedButLostRace {
                        provider: provider_id,
                    },
                )
                .map_err(lift_ledger)?;
            tracing::debug!(
                trade_id = %trade_id,
                provider_id = %provider_id,
                "dispatch race lost"
            );
            Err(KernelError::JobAlreadyAssigned {
                trade_id: trade_id.to_string(),
            })
        }
    }

    /// The shipment record for a trade, if one has been created.
    pub fn shipment(&self, trade_id: TradeId) -> Option<Shipment> {
        self.shipments.get(&trade_id).map(|s| s.value().clone())
    }

    /// Whether a provider is free to receive new offers.
    pub fn is_available(&self, provider_id: ProviderId) -> bool {
        !self.busy_providers.contains(&provider_id)
    }

    /// Conditionally move an assigned shipment to `Delivered` and free its
    /// provider for new offers. Returns the updated record, or `None` when
    /// no assigned shipment exists for the trade.
    pub fn mark_delivered(&self, trade_id: TradeId) -> Option<Shipment> {
        let updated = {
            let mut entry = self.shipments.get_mut(&trade_id)?;
            if entry.state != AssignmentState::Assigned {
                return None;
            }
            entry.state = AssignmentState::Delivered;
            entry.updated_at = Timestamp::now();
            entry.value().clone()
        };
        if let Some(provider) = updated.assigned_provider {
            self.busy_providers.remove(&provider);
        }
        Some(updated)
    }
}

impl std::fmt::Debug for DispatchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchCoordinator")
            .field("shipment_count", &self.shipments.len())
            .field("busy_providers", &self.busy_providers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caravel_core::{Corridor, PartyId, TradeAmount, TradeTerms};
    use caravel_ledger::EventKind;

    fn sample_terms() -> TradeTerms {
        TradeTerms::new(
            "Machined parts",
            "12",
            TradeAmount::new("EUR", "900").unwrap(),
            TradeAmount::new("EUR", "10800").unwrap(),
        )
        .unwrap()
    }

    /// A trade already advanced into `Production`, where dispatch happens.
    fn dispatchable_trade() -> (Arc<TradeStore>, DispatchCoordinator, TradeId) {
        let store = Arc::new(TradeStore::new());
        let trade_id = TradeId::new();
        store
            .create_trade(
                trade_id,
                PartyId::new(),
                PartyId::new(),
                sample_terms(),
                Corridor::new("ITGOA", "EGALY"),
            )
            .unwrap();
        let track = [
            TradeStatus::Draft,
            TradeStatus::RfqCreated,
            TradeStatus::Quoted,
            TradeStatus::Contracted,
            TradeStatus::EscrowRequired,
            TradeStatus::EscrowFunded,
            TradeStatus::Production,
        ];
        for pair in track.windows(2) {
            store
                .commit_transition(trade_id, pair[0], pair[1], None)
                .unwrap();
        }
        let coordinator = DispatchCoordinator::new(Arc::clone(&store));
        (store, coordinator, trade_id)
    }

    #[test]
    fn first_acceptor_wins_and_is_marked_busy() {
        let (store, coordinator, trade_id) = dispatchable_trade();
        let provider = ProviderId::new();

        let outcome = coordinator
            .respond(trade_id, provider, DispatchDecision::Accept, None)
            .unwrap();
        let shipment = match outcome {
            DispatchOutcome::Assigned(s) => s,
            other => panic!("expected assignment, got {other:?}"),
        };
        assert_eq!(shipment.state, AssignmentState::Assigned);
        assert_eq!(shipment.assigned_provider, Some(provider));
        assert!(!coordinator.is_available(provider));

        let kinds: Vec<EventKind> = store
            .replay(trade_id)
            .unwrap()
            .iter()
            .map(|e| e.kind())
            .collect();
        assert!(kinds.contains(&EventKind::ProviderAccepted));
        assert!(kinds.contains(&EventKind::ShipmentAssigned));
    }

    #[test]
    fn second_acceptor_loses_with_audit_event() {
        let (store, coordinator, trade_id) = dispatchable_trade();
        let winner = ProviderId::new();
        let loser = ProviderId::new();

        coordinator
            .respond(trade_id, winner, DispatchDecision::Accept, None)
            .unwrap();
        let result = coordinator.respond(trade_id, loser, DispatchDecision::Accept, None);
        assert!(matches!(result, Err(KernelError::JobAlreadyAssigned { .. })));

        // The loser stays available and the loss is on the ledger.
        assert!(coordinator.is_available(loser));
        let last = store.tail(trade_id, 1).unwrap().remove(0);
        assert_eq!(last.kind(), EventKind::ProviderAcceptedButLostRace);
        // The winner's assignment was not disturbed.
        assert_eq!(
            coordinator.shipment(trade_id).unwrap().assigned_provider,
            Some(winner)
        );
    }

    #[test]
    fn rejection_is_recorded_without_assignment() {
        let (store, coordinator, trade_id) = dispatchable_trade();
        let provider = ProviderId::new();

        let outcome = coordinator
            .respond(trade_id, provider, DispatchDecision::Reject, None)
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Rejected);
        assert!(coordinator.shipment(trade_id).is_none());
        assert!(coordinator.is_available(provider));

        let last = store.tail(trade_id, 1).unwrap().remove(0);
        assert_eq!(last.kind(), EventKind::ProviderRejected);
    }

    #[test]
    fn accept_outside_production_is_not_dispatchable() {
        let store = Arc::new(TradeStore::new());
        let trade_id = TradeId::new();
        store
            .create_trade(
                trade_id,
                PartyId::new(),
                PartyId::new(),
                sample_terms(),
                Corridor::new("ITGOA", "EGALY"),
            )
            .unwrap();
        let coordinator = DispatchCoordinator::new(Arc::clone(&store));

        let result = coordinator.respond(
            trade_id,
            ProviderId::new(),
            DispatchDecision::Accept,
            None,
        );
        assert!(matches!(
            result,
            Err(KernelError::TradeNotDispatchable { .. })
        ));
    }

    #[test]
    fn unknown_trade_is_reported() {
        let store = Arc::new(TradeStore::new());
        let coordinator = DispatchCoordinator::new(store);
        let result = coordinator.respond(
            TradeId::new(),
            ProviderId::new(),
            DispatchDecision::Accept,
            None,
        );
        assert!(matches!(result, Err(KernelError::TradeNotFound { .. })));
    }

    #[test]
    fn delivery_frees_the_provider() {
        let (_store, coordinator, trade_id) = dispatchable_trade();
        let provider = ProviderId::new();
        coordinator
            .respond(trade_id, provider, DispatchDecision::Accept, None)
            .unwrap();
        assert!(!coordinator.is_available(provider));

        let delivered = coordinator.mark_delivered(trade_id).unwrap();
        assert_eq!(delivered.state, AssignmentState::Delivered);
        assert!(coordinator.is_available(provider));

        // Already delivered: the conditional update affects nothing.
        assert!(coordinator.mark_delivered(trade_id).is_none());
    }

    #[test]
    fn eta_is_kept_on_the_winning_assignment() {
        let (_store, coordinator, trade_id) = dispatchable_trade();
        let eta = Timestamp::now();
        let outcome = coordinator
            .respond(
                trade_id,
                ProviderId::new(),
                DispatchDecision::Accept,
                Some(eta),
            )
            .unwrap();
        match outcome {
            DispatchOutcome::Assigned(s) => assert_eq!(s.scheduled_pickup, Some(eta)),
            other => panic!("expected assignment, got {other:?}"),
        }
    }
}
