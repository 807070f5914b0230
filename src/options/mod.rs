//! Candidate supply options.
//!
//! An option is one way to discharge one demand line from one bank: either a
//! single stock lot ("single") or a fixed blend of two lots ("paired").
//! Options are the decision variables of the optimizer.

pub mod builder;
pub mod pairing;

use crate::core::bank::BankKey;
use crate::core::habitat::Ledger;
use crate::core::pricing::Tier;
use crate::core::stock::StockId;
use crate::rules::price_resolver::PriceProvenance;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Single,
    Paired,
}

/// One stock lot drawn by an option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockDraw {
    pub stock_id: StockId,
    pub habitat: String,
    /// Raw stock units consumed per demand unit delivered.
    pub coefficient: f64,
    /// Same share as `coefficient`, exact, for pricing and reporting.
    pub share: Decimal,
    /// Unit price of this component before blending.
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationOption {
    /// Index of the demand line in the basket.
    pub line: usize,
    pub ledger: Ledger,
    pub bank_key: BankKey,
    pub tier: Tier,
    pub unit_price: Decimal,
    pub provenance: PriceProvenance,
    /// Habitat whose price row stood in when the price is a proxy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_habitat: Option<String>,
    pub kind: OptionKind,
    pub draws: Vec<StockDraw>,
}

impl AllocationOption {
    /// Supply habitat label: the habitat for singles, "A + B" for pairs.
    pub fn supply_label(&self) -> String {
        self.draws
            .iter()
            .map(|d| d.habitat.as_str())
            .collect::<Vec<_>>()
            .join(" + ")
    }

    pub fn unit_price_f64(&self) -> f64 {
        self.unit_price.to_f64().unwrap_or(f64::INFINITY)
    }

    /// Raw stock consumed from `stock` per delivered unit (0 if not drawn).
    pub fn coefficient_for(&self, stock: &StockId) -> f64 {
        self.draws
            .iter()
            .filter(|d| &d.stock_id == stock)
            .map(|d| d.coefficient)
            .sum()
    }

    /// Largest quantity this option could deliver against `remaining` stock.
    pub fn deliverable(&self, remaining: &BTreeMap<StockId, f64>) -> f64 {
        self.draws
            .iter()
            .filter(|d| d.coefficient > 0.0)
            .map(|d| remaining.get(&d.stock_id).copied().unwrap_or(0.0) / d.coefficient)
            .fold(f64::INFINITY, f64::min)
    }
}

/// A demand line that needs supply, with its resolved ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub line: usize,
    pub habitat: String,
    pub ledger: Ledger,
    pub units: f64,
}

/// Everything the optimizer needs: requirements, options and stock caps.
#[derive(Debug, Clone, Default)]
pub struct OptionSet {
    requirements: Vec<Requirement>,
    options: Vec<AllocationOption>,
    stock_caps: BTreeMap<StockId, f64>,
}

impl OptionSet {
    pub fn new(
        requirements: Vec<Requirement>,
        options: Vec<AllocationOption>,
        stock_caps: BTreeMap<StockId, f64>,
    ) -> Self {
        Self {
            requirements,
            options,
            stock_caps,
        }
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn options(&self) -> &[AllocationOption] {
        &self.options
    }

    pub fn stock_caps(&self) -> &BTreeMap<StockId, f64> {
        &self.stock_caps
    }

    pub fn requirement(&self, line: usize) -> Option<&Requirement> {
        self.requirements.iter().find(|r| r.line == line)
    }

    /// Options for one demand line, with their index into [`Self::options`].
    pub fn options_for_line(&self, line: usize) -> impl Iterator<Item = (usize, &AllocationOption)> {
        self.options
            .iter()
            .enumerate()
            .filter(move |(_, o)| o.line == line)
    }

    /// Banks that appear in at least one option, sorted.
    pub fn banks(&self) -> BTreeSet<BankKey> {
        self.options.iter().map(|o| o.bank_key.clone()).collect()
    }

    /// Aggregate capacity a bank offers across the lots its options draw on.
    pub fn bank_capacity(&self, bank: &BankKey) -> f64 {
        let lots: BTreeSet<&StockId> = self
            .options
            .iter()
            .filter(|o| &o.bank_key == bank)
            .flat_map(|o| o.draws.iter().map(|d| &d.stock_id))
            .collect();
        lots.into_iter()
            .map(|id| self.stock_caps.get(id).copied().unwrap_or(0.0))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }
}
