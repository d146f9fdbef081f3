// SPDX-License-Identifier: BUSL-1.1
//! # Identifier Newtypes
//!
//! Distinct identifier types for the entities the kernel coordinates.
//! All identifiers wrap a UUID; the newtypes exist so a [`ProviderId`] can
//! never be handed to an API expecting a [`PartyId`]. Display output carries
//! a short prefix (`trade:`, `party:`, ...) so identifiers in logs and error
//! messages are self-describing.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_newtype {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create an identifier from an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Access the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

id_newtype!(
    /// A unique identifier for one trade tracked end-to-end by the kernel.
    TradeId,
    "trade"
);

id_newtype!(
    /// A unique identifier for a commercial party (buyer or seller).
    PartyId,
    "party"
);

id_newtype!(
    /// A unique identifier for a logistics provider.
    ProviderId,
    "provider"
);

id_newtype!(
    /// A unique identifier for a shipment fulfillment record.
    ShipmentId,
    "shipment"
);

id_newtype!(
    /// A unique identifier for a ledger event.
    EventId,
    "event"
);
