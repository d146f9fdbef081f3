// SPDX-License-Identifier: BUSL-1.1
//! # Commercial Terms
//!
//! Typed value objects for the commercial snapshot a trade carries:
//! quantity, price, currency, and the corridor the goods move through.
//! Terms are captured once at contracting and never mutated afterwards.

use serde::{Deserialize, Serialize};

use crate::error::TermsError;

/// A monetary amount with currency. `value` is a decimal string — never a
/// float — so commercial terms survive serialization without precision loss.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeAmount {
    /// ISO 4217 currency code (e.g. "USD", "AED", "PKR").
    pub currency: String,
    /// Decimal string (e.g. "50000", "1250.75").
    pub value: String,
}

impl TradeAmount {
    /// Create a new validated amount.
    ///
    /// # Errors
    ///
    /// Returns [`TermsError::InvalidAmount`] if the value string is empty or
    /// contains anything other than digits and at most one decimal point.
    pub fn new(
        currency: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, TermsError> {
        let value = value.into();
        if !is_valid_decimal(&value) {
            return Err(TermsError::InvalidAmount(value));
        }
        Ok(Self {
            currency: currency.into(),
            value,
        })
    }
}

impl std::fmt::Display for TradeAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.value, self.currency)
    }
}

/// Validate that a string represents a non-negative decimal number.
fn is_valid_decimal(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    let mut has_dot = false;
    let mut has_digit = false;
    for c in s.chars() {
        if c == '.' {
            if has_dot {
                return false;
            }
            has_dot = true;
        } else if c.is_ascii_digit() {
            has_digit = true;
        } else {
            return false;
        }
    }
    has_digit
}

/// The corridor a trade's goods move through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Corridor {
    /// Origin location code (port, city, or zone identifier).
    pub origin: String,
    /// Destination location code.
    pub destination: String,
}

impl Corridor {
    /// Create a new corridor.
    pub fn new(origin: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
        }
    }
}

impl std::fmt::Display for Corridor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}→{}", self.origin, self.destination)
    }
}

/// The commercial terms snapshot of a trade.
///
/// Immutable once contracted: the kernel stores the snapshot at trade
/// creation and never offers a mutation path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeTerms {
    /// Goods description.
    pub description: String,
    /// Quantity as a decimal string (unit-of-measure agreed off-ledger).
    pub quantity: String,
    /// Unit price.
    pub unit_price: TradeAmount,
    /// Total contract value.
    pub total: TradeAmount,
}

impl TradeTerms {
    /// Create validated terms.
    ///
    /// # Errors
    ///
    /// Returns [`TermsError::InvalidAmount`] for a malformed quantity.
    pub fn new(
        description: impl Into<String>,
        quantity: impl Into<String>,
        unit_price: TradeAmount,
        total: TradeAmount,
    ) -> Result<Self, TermsError> {
        let quantity = quantity.into();
        if !is_valid_decimal(&quantity) {
            return Err(TermsError::InvalidAmount(quantity));
        }
        Ok(Self {
            description: description.into(),
            quantity,
            unit_price,
            total,
        })
    }
}
