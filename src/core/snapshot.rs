use crate::core::bank::{Bank, BankKey};
use crate::core::demand::DemandBasket;
use crate::core::distinctiveness::DistinctivenessLevels;
use crate::core::habitat::{HabitatCatalog, HabitatEntry};
use crate::core::pricing::{ContractSize, PriceRow, PriceTable};
use crate::core::stock::StockLot;
use crate::rules::legality::{TradingRule, TradingRules};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Reference tables as they arrive from the backend, one `Vec` per table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceTables {
    pub banks: Vec<Bank>,
    pub catalog: Vec<HabitatEntry>,
    pub stock: Vec<StockLot>,
    pub pricing: Vec<PriceRow>,
    #[serde(default)]
    pub distinctiveness_levels: Option<DistinctivenessLevels>,
    #[serde(default)]
    pub trading_rules: Vec<TradingRule>,
}

/// Immutable, indexed view of the reference tables for one run.
///
/// Built once per call and only ever borrowed by the engine.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSnapshot {
    banks: HashMap<BankKey, Bank>,
    catalog: HabitatCatalog,
    stock: Vec<StockLot>,
    prices: PriceTable,
    levels: DistinctivenessLevels,
    rules: TradingRules,
}

impl ReferenceSnapshot {
    pub fn new(
        banks: Vec<Bank>,
        catalog: Vec<HabitatEntry>,
        stock: Vec<StockLot>,
        pricing: Vec<PriceRow>,
    ) -> Self {
        Self {
            banks: banks.into_iter().map(|b| (b.bank_key.clone(), b)).collect(),
            catalog: catalog.into_iter().collect(),
            stock,
            prices: pricing.into_iter().collect(),
            levels: DistinctivenessLevels::default(),
            rules: TradingRules::default(),
        }
    }

    pub fn with_levels(mut self, levels: DistinctivenessLevels) -> Self {
        self.levels = levels;
        self
    }

    pub fn with_trading_rules(mut self, rules: TradingRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn bank(&self, key: &BankKey) -> Option<&Bank> {
        self.banks.get(key)
    }

    pub fn catalog(&self) -> &HabitatCatalog {
        &self.catalog
    }

    pub fn stock(&self) -> &[StockLot] {
        &self.stock
    }

    pub fn prices(&self) -> &PriceTable {
        &self.prices
    }

    pub fn levels(&self) -> &DistinctivenessLevels {
        &self.levels
    }

    pub fn trading_rules(&self) -> &TradingRules {
        &self.rules
    }

    /// Bank keys referenced by stock, sorted.
    pub fn stocked_banks(&self) -> BTreeSet<BankKey> {
        self.stock.iter().map(|s| s.bank_key.clone()).collect()
    }
}

impl From<ReferenceTables> for ReferenceSnapshot {
    fn from(tables: ReferenceTables) -> Self {
        let snapshot =
            ReferenceSnapshot::new(tables.banks, tables.catalog, tables.stock, tables.pricing)
                .with_trading_rules(tables.trading_rules.into_iter().collect());
        match tables.distinctiveness_levels {
            Some(levels) => snapshot.with_levels(levels),
            None => snapshot,
        }
    }
}

/// The demand site as resolved by the external geocoding / GIS step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetSite {
    #[serde(default)]
    pub lpa_name: String,
    #[serde(default)]
    pub nca_name: String,
    #[serde(default)]
    pub lpa_neighbors: Vec<String>,
    #[serde(default)]
    pub nca_neighbors: Vec<String>,
}

impl TargetSite {
    pub fn new(lpa_name: impl Into<String>, nca_name: impl Into<String>) -> Self {
        Self {
            lpa_name: lpa_name.into(),
            nca_name: nca_name.into(),
            ..Default::default()
        }
    }

    pub fn with_lpa_neighbors<I, S>(mut self, neighbors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lpa_neighbors = neighbors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_nca_neighbors<I, S>(mut self, neighbors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.nca_neighbors = neighbors.into_iter().map(Into::into).collect();
        self
    }
}

/// One complete allocation job as exchanged in JSON: the basket, where it
/// is needed, the contract size and the reference tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationRequest {
    pub demand: DemandBasket,
    pub target: TargetSite,
    pub contract_size: ContractSize,
    #[serde(flatten)]
    pub tables: ReferenceTables,
}

impl AllocationRequest {
    pub fn into_parts(self) -> (ReferenceSnapshot, TargetSite, DemandBasket, ContractSize) {
        (
            ReferenceSnapshot::from(self.tables),
            self.target,
            self.demand,
            self.contract_size,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::habitat::Ledger;
    use crate::core::pricing::Tier;
    use rust_decimal_macros::dec;

    #[test]
    fn test_snapshot_from_tables_json() {
        let json = r#"{
            "banks": [{ "bank_key": "B1", "lpa_name": "Winchester", "nca_name": "South Downs" }],
            "catalog": [{ "habitat_name": "Grassland", "broad_group": "Grassland",
                          "distinctiveness": "Medium", "ledger_tag": "area" }],
            "stock": [{ "stock_id": "S1", "bank_key": "B1", "habitat_name": "Grassland",
                        "quantity_available": 4.0 }],
            "pricing": [{ "bank_key": "B1", "habitat_name": "Grassland", "tier": "local",
                          "contract_size": "small", "unit_price": "25000" }],
            "trading_rules": [{ "demand_habitat": "Grassland", "allowed_supply": ["Heathland"] }]
        }"#;
        let tables: ReferenceTables = serde_json::from_str(json).unwrap();
        let snapshot = ReferenceSnapshot::from(tables);

        assert!(snapshot.bank(&BankKey::new("B1")).is_some());
        assert_eq!(snapshot.catalog().ledger_of("Grassland"), Some(Ledger::Area));
        assert_eq!(snapshot.stock().len(), 1);
        assert_eq!(
            snapshot.prices().exact(&BankKey::new("B1"), Tier::Local, "Grassland", &"small".into()),
            Some(dec!(25000))
        );
        assert!(snapshot.trading_rules().allowed_for("Grassland").is_some());
    }

    #[test]
    fn test_request_json_is_flat() {
        let json = r#"{
            "demand": [{ "habitat_name": "Net Gain (Low-equivalent)", "units_required": 1.5 }],
            "target": { "lpa_name": "Winchester", "nca_name": "South Downs" },
            "contract_size": "Small",
            "banks": [], "catalog": [], "stock": [], "pricing": []
        }"#;
        let request: AllocationRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.demand.len(), 1);
        assert_eq!(request.contract_size.as_str(), "small");
        let (snapshot, target, basket, _) = request.into_parts();
        assert!(snapshot.stock().is_empty());
        assert_eq!(target.lpa_name, "Winchester");
        assert_eq!(basket.total_units(), 1.5);
    }

    #[test]
    fn test_stocked_banks_sorted_and_unique() {
        let snapshot = ReferenceSnapshot::new(
            vec![],
            vec![],
            vec![
                StockLot::new("S1", "B2", "Grassland", 1.0),
                StockLot::new("S2", "B1", "Grassland", 1.0),
                StockLot::new("S3", "B2", "Heathland", 1.0),
            ],
            vec![],
        );
        let banks: Vec<_> = snapshot.stocked_banks().into_iter().collect();
        assert_eq!(banks, vec![BankKey::new("B1"), BankKey::new("B2")]);
    }
}
