use crate::core::bank::BankKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a single stock lot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockId(String);

impl StockId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StockId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Units of one habitat available at one bank.
///
/// Stock lots are read-only caps. The optimizer never mutates them; the
/// greedy fallback tracks remaining capacity in its own copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockLot {
    pub stock_id: StockId,
    pub bank_key: BankKey,
    pub habitat_name: String,
    pub quantity_available: f64,
}

impl StockLot {
    pub fn new(
        stock_id: impl Into<StockId>,
        bank_key: impl Into<BankKey>,
        habitat_name: impl Into<String>,
        quantity_available: f64,
    ) -> Self {
        Self {
            stock_id: stock_id.into(),
            bank_key: bank_key.into(),
            habitat_name: habitat_name.into(),
            quantity_available,
        }
    }

    /// Lots with no (or nonsensical) quantity are never offered.
    pub fn has_stock(&self) -> bool {
        self.quantity_available > 0.0
    }
}
