use crate::core::bank::BankKey;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Geographic proximity of a bank to the demand site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Local,
    Adjacent,
    Far,
}

impl Tier {
    /// Closeness rank used for tie-breaking: lower is closer.
    pub fn rank(self) -> u8 {
        match self {
            Tier::Local => 0,
            Tier::Adjacent => 1,
            Tier::Far => 2,
        }
    }

    /// Spatial risk multiplier converting raw supplied units into
    /// buyer-credited units at this tier.
    pub fn spatial_risk_multiplier(self) -> Decimal {
        match self {
            Tier::Local => Decimal::ONE,
            Tier::Adjacent => Decimal::from(4) / Decimal::from(3),
            Tier::Far => Decimal::from(2),
        }
    }

    /// Share of a paired blend drawn from the primary lot: the inverse of the
    /// spatial risk multiplier, so one blended unit still credits one unit.
    pub fn primary_share(self) -> Decimal {
        match self {
            Tier::Local => Decimal::ONE,
            Tier::Adjacent => Decimal::new(75, 2),
            Tier::Far => Decimal::new(5, 1),
        }
    }

    pub fn is_local(self) -> bool {
        self == Tier::Local
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tier::Local => "local",
            Tier::Adjacent => "adjacent",
            Tier::Far => "far",
        };
        f.write_str(s)
    }
}

/// Contract size band the price book is keyed on ("fractional", "small", ...).
///
/// Chosen outside the engine from the total demand magnitude.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ContractSize(String);

impl ContractSize {
    pub fn new(size: impl Into<String>) -> Self {
        Self(size.into().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContractSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ContractSize {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ContractSize {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<ContractSize> for String {
    fn from(size: ContractSize) -> Self {
        size.0
    }
}

/// One row of the price book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRow {
    pub bank_key: BankKey,
    pub habitat_name: String,
    pub tier: Tier,
    pub contract_size: ContractSize,
    pub unit_price: Decimal,
}

impl PriceRow {
    pub fn new(
        bank_key: impl Into<BankKey>,
        habitat_name: impl Into<String>,
        tier: Tier,
        contract_size: impl Into<ContractSize>,
        unit_price: Decimal,
    ) -> Self {
        Self {
            bank_key: bank_key.into(),
            habitat_name: habitat_name.into(),
            tier,
            contract_size: contract_size.into(),
            unit_price,
        }
    }
}

/// Sparse price book indexed for exact lookups and per-(bank, tier, size)
/// scans.
///
/// # Examples
///
/// ```
/// use habitat_allocation::core::pricing::{PriceRow, PriceTable, Tier, ContractSize};
/// use habitat_allocation::core::bank::BankKey;
/// use rust_decimal_macros::dec;
///
/// let table: PriceTable = vec![
///     PriceRow::new("B1", "Grassland", Tier::Local, "small", dec!(20000)),
/// ].into_iter().collect();
///
/// let price = table.exact(&BankKey::new("B1"), Tier::Local, "Grassland", &ContractSize::new("small"));
/// assert_eq!(price, Some(dec!(20000)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    exact: HashMap<(BankKey, Tier, String, ContractSize), Decimal>,
    by_bank: HashMap<(BankKey, Tier, ContractSize), Vec<(String, Decimal)>>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row. Negative prices are ignored; a repeated key keeps the
    /// first row seen.
    pub fn insert(&mut self, row: PriceRow) {
        if row.unit_price < Decimal::ZERO {
            log::warn!(
                "ignoring negative price {} for {} / {} / {}",
                row.unit_price,
                row.bank_key,
                row.habitat_name,
                row.tier
            );
            return;
        }
        let key = (
            row.bank_key.clone(),
            row.tier,
            row.habitat_name.clone(),
            row.contract_size.clone(),
        );
        if self.exact.contains_key(&key) {
            return;
        }
        self.exact.insert(key, row.unit_price);
        self.by_bank
            .entry((row.bank_key, row.tier, row.contract_size))
            .or_default()
            .push((row.habitat_name, row.unit_price));
    }

    pub fn exact(
        &self,
        bank: &BankKey,
        tier: Tier,
        habitat: &str,
        size: &ContractSize,
    ) -> Option<Decimal> {
        self.exact
            .get(&(bank.clone(), tier, habitat.to_string(), size.clone()))
            .copied()
    }

    /// All priced habitats at one bank / tier / contract size, in insertion order.
    pub fn priced_at(&self, bank: &BankKey, tier: Tier, size: &ContractSize) -> &[(String, Decimal)] {
        self.by_bank
            .get(&(bank.clone(), tier, size.clone()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }
}

impl FromIterator<PriceRow> for PriceTable {
    fn from_iter<T: IntoIterator<Item = PriceRow>>(iter: T) -> Self {
        let mut table = Self::new();
        for row in iter {
            table.insert(row);
        }
        table
    }
}
