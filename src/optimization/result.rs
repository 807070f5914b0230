use crate::core::bank::BankKey;
use crate::core::habitat::Ledger;
use crate::core::pricing::{ContractSize, Tier};
use crate::core::stock::StockId;
use crate::optimization::stages::FinalStage;
use crate::options::{AllocationOption, OptionKind, OptionSet};
use crate::rules::price_resolver::PriceProvenance;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

const CHECK_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationType {
    Normal,
    Paired,
}

impl From<OptionKind> for AllocationType {
    fn from(kind: OptionKind) -> Self {
        match kind {
            OptionKind::Single => AllocationType::Normal,
            OptionKind::Paired => AllocationType::Paired,
        }
    }
}

/// One stock lot behind a row. Single rows have exactly one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowComponent {
    pub stock_id: StockId,
    pub habitat: String,
    pub share: Decimal,
    pub unit_price: Decimal,
    /// Raw stock units consumed by this row.
    pub stock_units: f64,
}

/// One allocated (demand line, option) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationRow {
    pub line: usize,
    pub demand_habitat: String,
    pub ledger: Ledger,
    pub bank_key: BankKey,
    /// Supply habitat, or "A + B" for paired rows.
    pub supply_habitat: String,
    pub tier: Tier,
    pub units_supplied: f64,
    pub unit_price: Decimal,
    pub cost: Decimal,
    pub allocation_type: AllocationType,
    pub provenance: PriceProvenance,
    /// Habitat whose price stood in for a missing row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_habitat: Option<String>,
    pub components: Vec<RowComponent>,
}

impl AllocationRow {
    pub fn new(option: &AllocationOption, demand_habitat: &str, units: f64) -> Self {
        let components = option
            .draws
            .iter()
            .map(|d| RowComponent {
                stock_id: d.stock_id.clone(),
                habitat: d.habitat.clone(),
                share: d.share,
                unit_price: d.unit_price,
                stock_units: d.coefficient * units,
            })
            .collect();
        Self {
            line: option.line,
            demand_habitat: demand_habitat.to_string(),
            ledger: option.ledger,
            bank_key: option.bank_key.clone(),
            supply_habitat: option.supply_label(),
            tier: option.tier,
            units_supplied: units,
            unit_price: option.unit_price,
            cost: row_cost(units, option.unit_price),
            allocation_type: option.kind.into(),
            provenance: option.provenance,
            proxy_habitat: option.proxy_habitat.clone(),
            components,
        }
    }

    /// Change the supplied quantity, keeping cost and components in step.
    pub fn set_units(&mut self, units: f64) {
        let scale = if self.units_supplied > 0.0 {
            units / self.units_supplied
        } else {
            0.0
        };
        for component in &mut self.components {
            component.stock_units *= scale;
        }
        self.units_supplied = units;
        self.cost = row_cost(units, self.unit_price);
    }

    /// Component breakdown for paired rows, empty otherwise.
    pub fn paired_parts(&self) -> &[RowComponent] {
        match self.allocation_type {
            AllocationType::Paired => &self.components,
            AllocationType::Normal => &[],
        }
    }
}

/// `units × price`, rounded to pence and always carrying two decimal
/// places. Units are rounded to 6 dp first so solver noise in the last bits
/// never moves the cost.
pub fn row_cost(units: f64, unit_price: Decimal) -> Decimal {
    let units = Decimal::from_f64_retain(units)
        .unwrap_or(Decimal::ZERO)
        .round_dp(6);
    let mut cost = (units * unit_price).round_dp(2);
    cost.rescale(2);
    cost
}

/// Which solver produced the allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SolverKind {
    Lp { backend: String, stage: FinalStage },
    Greedy { reason: String },
    /// Every demand line was zero; nothing to solve.
    Empty,
}

impl std::fmt::Display for SolverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolverKind::Lp { backend, stage } => write!(f, "lp ({}, stage {:?})", backend, stage),
            SolverKind::Greedy { reason } => write!(f, "greedy ({})", reason),
            SolverKind::Empty => write!(f, "none"),
        }
    }
}

/// A complete allocation for one demand basket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationResult {
    rows: Vec<AllocationRow>,
    total_cost: Decimal,
    contract_size: ContractSize,
    solver: SolverKind,
    /// Line padded up to the minimum delivery floor, if any.
    floor_padded_line: Option<usize>,
    run_id: Uuid,
    solved_at: DateTime<Utc>,
}

impl AllocationResult {
    pub fn new(
        rows: Vec<AllocationRow>,
        contract_size: ContractSize,
        solver: SolverKind,
        floor_padded_line: Option<usize>,
    ) -> Self {
        let mut total_cost: Decimal = rows.iter().map(|r| r.cost).sum();
        total_cost.rescale(2);
        Self {
            rows,
            total_cost,
            contract_size,
            solver,
            floor_padded_line,
            run_id: Uuid::new_v4(),
            solved_at: Utc::now(),
        }
    }

    pub fn rows(&self) -> &[AllocationRow] {
        &self.rows
    }

    pub fn total_cost(&self) -> Decimal {
        self.total_cost
    }

    pub fn contract_size(&self) -> &ContractSize {
        &self.contract_size
    }

    pub fn solver(&self) -> &SolverKind {
        &self.solver
    }

    pub fn floor_padded_line(&self) -> Option<usize> {
        self.floor_padded_line
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn solved_at(&self) -> DateTime<Utc> {
        self.solved_at
    }

    pub fn used_greedy(&self) -> bool {
        matches!(self.solver, SolverKind::Greedy { .. })
    }

    /// Distinct supplying banks.
    pub fn banks(&self) -> BTreeSet<BankKey> {
        self.rows.iter().map(|r| r.bank_key.clone()).collect()
    }

    pub fn bank_count(&self) -> usize {
        self.banks().len()
    }

    pub fn total_units(&self) -> f64 {
        self.rows.iter().map(|r| r.units_supplied).sum()
    }

    /// Units supplied against one demand line.
    pub fn units_for_line(&self, line: usize) -> f64 {
        self.rows
            .iter()
            .filter(|r| r.line == line)
            .map(|r| r.units_supplied)
            .sum()
    }

    /// Raw stock units consumed per lot.
    pub fn stock_usage(&self) -> BTreeMap<StockId, f64> {
        let mut usage = BTreeMap::new();
        for component in self.rows.iter().flat_map(|r| &r.components) {
            *usage.entry(component.stock_id.clone()).or_insert(0.0) += component.stock_units;
        }
        usage
    }

    /// Cost per supplying bank.
    pub fn bank_totals(&self) -> BTreeMap<BankKey, Decimal> {
        let mut totals = BTreeMap::new();
        for row in &self.rows {
            *totals.entry(row.bank_key.clone()).or_insert(Decimal::ZERO) += row.cost;
        }
        totals
    }

    /// Cost per ledger.
    pub fn ledger_totals(&self) -> BTreeMap<Ledger, Decimal> {
        let mut totals = BTreeMap::new();
        for row in &self.rows {
            *totals.entry(row.ledger).or_insert(Decimal::ZERO) += row.cost;
        }
        totals
    }

    /// Check the allocation against the option set it was solved from:
    /// every line covered exactly (except a floor-padded line, which may
    /// only exceed its requirement), no lot over its cap, bank cap held.
    pub fn is_valid(&self, set: &OptionSet, max_banks: usize) -> bool {
        if self.bank_count() > max_banks {
            return false;
        }
        let lines_ok = set.requirements().iter().all(|r| {
            let supplied = self.units_for_line(r.line);
            if self.floor_padded_line == Some(r.line) {
                supplied >= r.units - CHECK_TOLERANCE
            } else {
                (supplied - r.units).abs() <= CHECK_TOLERANCE
            }
        });
        let caps_ok = self.stock_usage().iter().all(|(stock, used)| {
            let cap = set.stock_caps().get(stock).copied().unwrap_or(0.0);
            *used <= cap + CHECK_TOLERANCE
        });
        lines_ok && caps_ok
    }
}

impl std::fmt::Display for AllocationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Allocation Result ===")?;
        writeln!(f, "Run:            {}", self.run_id)?;
        writeln!(f, "Solver:         {}", self.solver)?;
        writeln!(f, "Contract size:  {}", self.contract_size)?;
        writeln!(f, "Total cost:     £{}", self.total_cost)?;
        writeln!(f, "Banks used:     {}", self.bank_count())?;
        if let Some(line) = self.floor_padded_line {
            writeln!(f, "Floor padded:   line {}", line)?;
        }

        for row in &self.rows {
            writeln!(f, "\n--- {} ({}) ---", row.demand_habitat, row.ledger)?;
            writeln!(f, "  Bank:    {} [{}]", row.bank_key, row.tier)?;
            writeln!(f, "  Supply:  {} ({:?})", row.supply_habitat, row.allocation_type)?;
            writeln!(f, "  Units:   {:.4}", row.units_supplied)?;
            writeln!(f, "  Price:   £{}", row.unit_price)?;
            if let Some(proxy) = &row.proxy_habitat {
                writeln!(f, "  Proxy:   priced as {}", proxy)?;
            }
            writeln!(f, "  Cost:    £{}", row.cost)?;
            for part in row.paired_parts() {
                writeln!(
                    f,
                    "    {} x{} @ £{} ({:.4} units)",
                    part.habitat, part.share, part.unit_price, part.stock_units
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::StockDraw;
    use rust_decimal_macros::dec;

    fn option(kind: OptionKind, draws: Vec<StockDraw>, price: Decimal) -> AllocationOption {
        AllocationOption {
            line: 0,
            ledger: Ledger::Area,
            bank_key: BankKey::new("B1"),
            tier: Tier::Far,
            unit_price: price,
            provenance: PriceProvenance::Exact,
            proxy_habitat: None,
            kind,
            draws,
        }
    }

    fn draw(id: &str, habitat: &str, share: Decimal, price: Decimal) -> StockDraw {
        StockDraw {
            stock_id: StockId::new(id),
            habitat: habitat.into(),
            coefficient: if share == Decimal::ONE { 1.0 } else { 0.5 },
            share,
            unit_price: price,
        }
    }

    #[test]
    fn test_row_cost_rounds_to_pence() {
        assert_eq!(row_cost(2.0, dec!(20000)), dec!(40000.00));
        assert_eq!(row_cost(0.333333333, dec!(3)), dec!(1.00));
        assert_eq!(row_cost(0.5, dec!(2100)), dec!(1050.00));
    }

    #[test]
    fn test_costs_always_carry_pence() {
        assert_eq!(row_cost(2.0, dec!(20000)).to_string(), "40000.00");
        assert_eq!(row_cost(0.5, dec!(2100)).scale(), 2);
        let empty = AllocationResult::new(Vec::new(), ContractSize::from("small"), SolverKind::Empty, None);
        assert_eq!(empty.total_cost().to_string(), "0.00");
    }

    #[test]
    fn test_paired_row_breakdown() {
        let opt = option(
            OptionKind::Paired,
            vec![
                draw("P", "Lowland meadows", dec!(0.5), dec!(30000)),
                draw("C", "Modified grassland", dec!(0.5), dec!(10000)),
            ],
            dec!(20000),
        );
        let row = AllocationRow::new(&opt, "Lowland meadows", 2.0);
        assert_eq!(row.allocation_type, AllocationType::Paired);
        assert_eq!(row.supply_habitat, "Lowland meadows + Modified grassland");
        assert_eq!(row.cost, dec!(40000));
        assert_eq!(row.paired_parts().len(), 2);
        assert!((row.paired_parts()[0].stock_units - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_row_has_no_paired_parts() {
        let opt = option(
            OptionKind::Single,
            vec![draw("S", "Lowland meadows", Decimal::ONE, dec!(100))],
            dec!(100),
        );
        let mut row = AllocationRow::new(&opt, "Lowland meadows", 1.0);
        assert!(row.paired_parts().is_empty());
        row.set_units(3.0);
        assert_eq!(row.cost, dec!(300));
        assert!((row.components[0].stock_units - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_totals_and_serialization() {
        let opt = option(
            OptionKind::Single,
            vec![draw("S", "Lowland meadows", Decimal::ONE, dec!(100))],
            dec!(100),
        );
        let result = AllocationResult::new(
            vec![AllocationRow::new(&opt, "Lowland meadows", 1.5)],
            ContractSize::from("small"),
            SolverKind::Greedy {
                reason: "forced".into(),
            },
            None,
        );
        assert_eq!(result.total_cost(), dec!(150));
        assert_eq!(result.bank_totals()[&BankKey::new("B1")], dec!(150));
        assert_eq!(result.ledger_totals()[&Ledger::Area], dec!(150));
        assert!(result.used_greedy());

        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"allocation_type\":\"normal\""));
        assert!(json.contains("\"kind\":\"greedy\""));
        assert!(json.contains("\"total_cost\":\"150.00\""));
        assert!(json.contains("\"cost\":\"150.00\""));
        assert!(!json.contains("proxy_habitat"));
    }
}
