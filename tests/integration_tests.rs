use habitat_allocation::core::bank::{Bank, BankKey};
use habitat_allocation::core::demand::{DemandBasket, DemandLine};
use habitat_allocation::core::habitat::{HabitatEntry, Ledger, NET_GAIN_AREA};
use habitat_allocation::core::pricing::{ContractSize, PriceRow, Tier};
use habitat_allocation::core::snapshot::{AllocationRequest, ReferenceSnapshot, TargetSite};
use habitat_allocation::core::stock::{StockId, StockLot};
use habitat_allocation::error::{AllocationError, BackendError};
use habitat_allocation::optimization::allocator::{Allocator, AllocatorConfig};
use habitat_allocation::optimization::lp::{LinearProgram, LpBackend, LpOutcome};
use habitat_allocation::optimization::result::{AllocationType, SolverKind};
use habitat_allocation::options::builder::OptionBuilder;
use rust_decimal_macros::dec;

fn catalog() -> Vec<HabitatEntry> {
    vec![
        HabitatEntry::new("Lowland meadows", "Grassland", "High", Ledger::Area),
        HabitatEntry::new("Other neutral grassland", "Grassland", "Medium", Ledger::Area),
        HabitatEntry::new("Modified grassland", "Grassland", "Low", Ledger::Area),
        HabitatEntry::new("Native hedgerow", "Hedgerow", "Low", Ledger::Hedgerow),
        HabitatEntry::new("Ditches", "Watercourse", "Medium", Ledger::Watercourse),
        HabitatEntry::new("Canals", "Watercourse", "Medium", Ledger::Watercourse),
    ]
}

fn target() -> TargetSite {
    TargetSite::new("Winchester", "South Downs")
        .with_lpa_neighbors(["Test Valley"])
        .with_nca_neighbors(["Hampshire Downs"])
}

fn small() -> ContractSize {
    ContractSize::new("small")
}

fn basket(lines: &[(&str, f64)]) -> DemandBasket {
    lines
        .iter()
        .map(|&(habitat, units)| DemandLine::new(habitat, units))
        .collect()
}

fn allocator() -> Allocator {
    Allocator::new(AllocatorConfig::default())
}

struct FailingBackend;

impl LpBackend for FailingBackend {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn solve(&self, _program: &LinearProgram) -> Result<LpOutcome, BackendError> {
        Err(BackendError::Failed("solver crashed".into()))
    }
}

/// One bank, exact match, local: a single row at list price.
#[test]
fn scenario_single_exact_local_row() {
    let snapshot = ReferenceSnapshot::new(
        vec![Bank::new("B1", "Winchester", "South Downs")],
        catalog(),
        vec![StockLot::new("S1", "B1", "Lowland meadows", 5.0)],
        vec![PriceRow::new("B1", "Lowland meadows", Tier::Local, "small", dec!(20000))],
    );

    let result = allocator()
        .allocate(&snapshot, &target(), &basket(&[("Lowland meadows", 2.0)]), &small())
        .unwrap();

    assert_eq!(result.rows().len(), 1);
    let row = &result.rows()[0];
    assert!((row.units_supplied - 2.0).abs() < 1e-6);
    assert_eq!(row.tier, Tier::Local);
    assert_eq!(row.allocation_type, AllocationType::Normal);
    assert_eq!(row.cost, dec!(40000));
    assert_eq!(result.total_cost(), dec!(40000));
}

fn split_supply_snapshot() -> ReferenceSnapshot {
    ReferenceSnapshot::new(
        vec![
            Bank::new("X", "Winchester", "South Downs"),
            Bank::new("Y", "Cornwall", "Bodmin Moor"),
        ],
        catalog(),
        vec![
            StockLot::new("SX", "X", "Modified grassland", 0.5),
            StockLot::new("SY", "Y", "Modified grassland", f64::INFINITY),
        ],
        vec![
            PriceRow::new("X", "Modified grassland", Tier::Local, "small", dec!(2000)),
            PriceRow::new("Y", "Modified grassland", Tier::Far, "small", dec!(2100)),
        ],
    )
}

/// Splitting one line across two banks beats the single far bank.
#[cfg(feature = "lp")]
#[test]
fn scenario_split_across_two_banks() {
    let snapshot = split_supply_snapshot();
    let result = allocator()
        .allocate(&snapshot, &target(), &basket(&[(NET_GAIN_AREA, 1.0)]), &small())
        .unwrap();

    assert_eq!(result.bank_count(), 2);
    assert_eq!(result.total_cost(), dec!(2050));
    let x = result
        .rows()
        .iter()
        .find(|r| r.bank_key == BankKey::new("X"))
        .unwrap();
    approx::assert_abs_diff_eq!(x.units_supplied, 0.5, epsilon = 1e-6);
    approx::assert_abs_diff_eq!(result.units_for_line(0), 1.0, epsilon = 1e-6);
}

/// Greedy covers each line with one option, so it cannot split.
#[test]
fn split_supply_under_greedy_takes_single_bank() {
    let snapshot = split_supply_snapshot();
    let allocator = Allocator::with_backend(AllocatorConfig::default(), Box::new(FailingBackend));
    let result = allocator
        .allocate(&snapshot, &target(), &basket(&[(NET_GAIN_AREA, 1.0)]), &small())
        .unwrap();

    assert!(result.used_greedy());
    assert_eq!(result.bank_count(), 1);
    assert_eq!(result.total_cost(), dec!(2100));
}

/// Equal cost from one or two banks: one bank, the larger one.
#[cfg(feature = "lp")]
#[test]
fn scenario_equal_cost_prefers_single_larger_bank() {
    let snapshot = ReferenceSnapshot::new(
        vec![
            Bank::new("SMALL", "Winchester", "South Downs"),
            Bank::new("LARGE", "Winchester", "South Downs"),
        ],
        catalog(),
        vec![
            StockLot::new("S1", "SMALL", "Lowland meadows", 2.0),
            StockLot::new("S2", "LARGE", "Lowland meadows", 5.0),
        ],
        vec![
            PriceRow::new("SMALL", "Lowland meadows", Tier::Local, "small", dec!(20000)),
            PriceRow::new("LARGE", "Lowland meadows", Tier::Local, "small", dec!(20000)),
        ],
    );

    let result = allocator()
        .allocate(&snapshot, &target(), &basket(&[("Lowland meadows", 2.0)]), &small())
        .unwrap();

    assert_eq!(result.bank_count(), 1);
    assert!(result.banks().contains(&BankKey::new("LARGE")));
    assert_eq!(result.total_cost(), dec!(40000));
}

/// A slightly dearer single bank within the tolerance replaces two banks.
#[cfg(feature = "lp")]
#[test]
fn bank_count_reduced_within_tolerance() {
    let snapshot = ReferenceSnapshot::new(
        vec![
            Bank::new("A", "Winchester", "South Downs"),
            Bank::new("B", "Winchester", "South Downs"),
        ],
        catalog(),
        vec![
            StockLot::new("SA", "A", "Lowland meadows", 1.0),
            StockLot::new("SB", "B", "Lowland meadows", 5.0),
        ],
        vec![
            PriceRow::new("A", "Lowland meadows", Tier::Local, "small", dec!(20000)),
            PriceRow::new("B", "Lowland meadows", Tier::Local, "small", dec!(20003)),
        ],
    );

    let result = allocator()
        .allocate(&snapshot, &target(), &basket(&[("Lowland meadows", 2.0)]), &small())
        .unwrap();

    assert_eq!(result.bank_count(), 1);
    assert_eq!(result.total_cost(), dec!(40006));
    match result.solver() {
        SolverKind::Lp { stage, .. } => {
            assert_eq!(*stage, habitat_allocation::optimization::stages::FinalStage::C)
        }
        other => panic!("expected LP solve, got {}", other),
    }
}

/// On large totals the £10 bound is tighter than the relative one: a £30
/// saving in banks is not worth it, so both banks stay.
#[cfg(feature = "lp")]
#[test]
fn absolute_tolerance_keeps_two_banks_on_large_costs() {
    let snapshot = ReferenceSnapshot::new(
        vec![
            Bank::new("A", "Winchester", "South Downs"),
            Bank::new("B", "Winchester", "South Downs"),
        ],
        catalog(),
        vec![
            StockLot::new("SA", "A", "Lowland meadows", 1.0),
            StockLot::new("SB", "B", "Lowland meadows", 5.0),
        ],
        vec![
            PriceRow::new("A", "Lowland meadows", Tier::Local, "small", dec!(200000)),
            PriceRow::new("B", "Lowland meadows", Tier::Local, "small", dec!(200015)),
        ],
    );

    let result = allocator()
        .allocate(&snapshot, &target(), &basket(&[("Lowland meadows", 2.0)]), &small())
        .unwrap();

    assert_eq!(result.bank_count(), 2);
    assert_eq!(result.total_cost(), dec!(400015));
    match result.solver() {
        SolverKind::Lp { stage, .. } => {
            assert_eq!(*stage, habitat_allocation::optimization::stages::FinalStage::A)
        }
        other => panic!("expected LP solve, got {}", other),
    }
}

/// Medium watercourse habitats are not interchangeable.
#[test]
fn scenario_ditches_cannot_use_canals() {
    let snapshot = ReferenceSnapshot::new(
        vec![Bank::new("B1", "Winchester", "South Downs")],
        catalog(),
        vec![StockLot::new("S1", "B1", "Canals", 10.0)],
        vec![PriceRow::new("B1", "Canals", Tier::Local, "small", dec!(15000))],
    );

    let err = allocator()
        .allocate(&snapshot, &target(), &basket(&[("Ditches", 1.0)]), &small())
        .unwrap_err();

    assert_eq!(
        err,
        AllocationError::InfeasibleDemandLine {
            habitat: "Ditches".into(),
            ledger: Ledger::Watercourse,
        }
    );
}

/// Far-tier pairing: half primary, half companion, at the blended price.
#[test]
fn scenario_far_pairing_blends_price_and_consumption() {
    let snapshot = ReferenceSnapshot::new(
        vec![Bank::new("FAR", "Cornwall", "Bodmin Moor")],
        catalog(),
        vec![
            StockLot::new("P", "FAR", "Lowland meadows", 2.0),
            StockLot::new("C", "FAR", "Modified grassland", 2.0),
        ],
        vec![
            PriceRow::new("FAR", "Lowland meadows", Tier::Far, "small", dec!(30000)),
            PriceRow::new("FAR", "Modified grassland", Tier::Far, "small", dec!(10000)),
        ],
    );

    let result = allocator()
        .allocate(&snapshot, &target(), &basket(&[("Lowland meadows", 1.0)]), &small())
        .unwrap();

    assert_eq!(result.rows().len(), 1);
    assert_eq!(result.bank_count(), 1);
    let row = &result.rows()[0];
    approx::assert_abs_diff_eq!(row.units_supplied, 1.0, epsilon = 1e-9);
    assert_eq!(row.allocation_type, AllocationType::Paired);
    assert_eq!(row.unit_price, dec!(20000));
    assert_eq!(row.supply_habitat, "Lowland meadows + Modified grassland");
    assert_eq!(result.total_cost(), dec!(20000));

    let usage = result.stock_usage();
    approx::assert_abs_diff_eq!(usage[&StockId::new("P")], 0.5, epsilon = 1e-6);
    approx::assert_abs_diff_eq!(usage[&StockId::new("C")], 0.5, epsilon = 1e-6);
}

fn three_way_snapshot() -> ReferenceSnapshot {
    ReferenceSnapshot::new(
        vec![
            Bank::new("A", "Winchester", "South Downs"),
            Bank::new("B", "Winchester", "South Downs"),
            Bank::new("C", "Winchester", "South Downs"),
        ],
        catalog(),
        vec![
            StockLot::new("SA", "A", "Lowland meadows", 5.0),
            StockLot::new("SB", "B", "Native hedgerow", 5.0),
            StockLot::new("SC", "C", "Ditches", 5.0),
        ],
        vec![
            PriceRow::new("A", "Lowland meadows", Tier::Local, "small", dec!(20000)),
            PriceRow::new("B", "Native hedgerow", Tier::Local, "small", dec!(3000)),
            PriceRow::new("C", "Ditches", Tier::Local, "small", dec!(12000)),
        ],
    )
}

/// Three ledgers, three single-supplier banks: the two-bank cap cannot hold.
#[cfg(feature = "lp")]
#[test]
fn bank_cap_makes_problem_infeasible() {
    let demand = basket(&[("Lowland meadows", 1.0), ("Native hedgerow", 1.0), ("Ditches", 1.0)]);
    let err = allocator()
        .allocate(&three_way_snapshot(), &target(), &demand, &small())
        .unwrap_err();
    assert_eq!(err, AllocationError::SolverInfeasible { max_banks: 2 });
}

#[test]
fn bank_cap_greedy_names_the_line() {
    let demand = basket(&[("Lowland meadows", 1.0), ("Native hedgerow", 1.0), ("Ditches", 1.0)]);
    let err = Allocator::without_backend(AllocatorConfig::default())
        .allocate(&three_way_snapshot(), &target(), &demand, &small())
        .unwrap_err();
    assert_eq!(
        err,
        AllocationError::GreedyInfeasible {
            habitat: "Ditches".into()
        }
    );
}

#[test]
fn raised_bank_cap_covers_all_ledgers() {
    let demand = basket(&[("Lowland meadows", 1.0), ("Native hedgerow", 2.0), ("Ditches", 1.0)]);
    let config = AllocatorConfig {
        max_banks: 3,
        ..AllocatorConfig::default()
    };
    let result = Allocator::new(config)
        .allocate(&three_way_snapshot(), &target(), &demand, &small())
        .unwrap();

    assert_eq!(result.bank_count(), 3);
    let ledgers = result.ledger_totals();
    assert_eq!(ledgers[&Ledger::Area], dec!(20000));
    assert_eq!(ledgers[&Ledger::Hedgerow], dec!(6000));
    assert_eq!(ledgers[&Ledger::Watercourse], dec!(12000));
    assert_eq!(result.total_cost(), dec!(38000));
}

#[test]
fn unknown_demand_habitat_is_rejected() {
    let err = allocator()
        .allocate(
            &split_supply_snapshot(),
            &target(),
            &basket(&[("Atlantis", 1.0)]),
            &small(),
        )
        .unwrap_err();
    assert_eq!(
        err,
        AllocationError::UnknownHabitat {
            habitat: "Atlantis".into()
        }
    );
}

#[test]
fn zero_unit_basket_allocates_nothing() {
    let result = allocator()
        .allocate(
            &split_supply_snapshot(),
            &target(),
            &basket(&[("Modified grassland", 0.0)]),
            &small(),
        )
        .unwrap();
    assert!(result.rows().is_empty());
    assert_eq!(result.total_cost(), dec!(0));
}

#[test]
fn noisy_authority_names_still_local() {
    let snapshot = ReferenceSnapshot::new(
        vec![Bank::new("B1", "City of Winchester Council", "SOUTH DOWNS")],
        catalog(),
        vec![StockLot::new("S1", "B1", "Lowland meadows", 5.0)],
        vec![PriceRow::new("B1", "Lowland meadows", Tier::Local, "small", dec!(20000))],
    );
    let builder = OptionBuilder::new(&snapshot, &target(), small());
    assert_eq!(builder.tier_of(&BankKey::new("B1")), Tier::Local);
}

#[test]
fn allocation_is_deterministic() {
    let snapshot = split_supply_snapshot();
    let demand = basket(&[(NET_GAIN_AREA, 1.0)]);
    let first = allocator().allocate(&snapshot, &target(), &demand, &small()).unwrap();
    let second = allocator().allocate(&snapshot, &target(), &demand, &small()).unwrap();

    assert_eq!(first.total_cost(), second.total_cost());
    assert_eq!(first.banks(), second.banks());
    assert_eq!(first.rows(), second.rows());
    assert_ne!(first.run_id(), second.run_id());
}

#[test]
fn request_json_to_result_json() {
    let json = r#"{
        "demand": [{ "habitat_name": "Lowland meadows", "units_required": 2.0 }],
        "target": { "lpa_name": "Winchester", "nca_name": "South Downs" },
        "contract_size": "small",
        "banks": [{ "bank_key": "B1", "lpa_name": "Winchester", "nca_name": "South Downs" }],
        "catalog": [{ "habitat_name": "Lowland meadows", "broad_group": "Grassland",
                      "distinctiveness": "High", "ledger_tag": "area" }],
        "stock": [{ "stock_id": "S1", "bank_key": "B1", "habitat_name": "Lowland meadows",
                    "quantity_available": 5.0 }],
        "pricing": [{ "bank_key": "B1", "habitat_name": "Lowland meadows", "tier": "local",
                      "contract_size": "small", "unit_price": "20000" }]
    }"#;
    let request: AllocationRequest = serde_json::from_str(json).unwrap();
    let (snapshot, target, demand, size) = request.into_parts();
    let result = allocator().allocate(&snapshot, &target, &demand, &size).unwrap();

    let value: serde_json::Value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["total_cost"], "40000.00");
    assert_eq!(value["rows"][0]["cost"], "40000.00");
    assert_eq!(value["contract_size"], "small");
    assert_eq!(value["rows"][0]["allocation_type"], "normal");
    assert_eq!(value["rows"][0]["tier"], "local");
    assert!(value["run_id"].is_string());
}
