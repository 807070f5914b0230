//! Basic allocation example.
//!
//! A developer needs grassland, hedgerow and a little Net Gain credit near
//! Winchester. Three banks can supply it at different distances; the engine
//! picks the cheapest legal mix from at most two of them.

use habitat_allocation::core::bank::Bank;
use habitat_allocation::core::demand::{DemandBasket, DemandLine};
use habitat_allocation::core::habitat::{HabitatEntry, Ledger};
use habitat_allocation::core::pricing::{ContractSize, PriceRow, Tier};
use habitat_allocation::core::snapshot::{ReferenceSnapshot, TargetSite};
use habitat_allocation::core::stock::StockLot;
use habitat_allocation::optimization::allocator::{Allocator, AllocatorConfig};
use rust_decimal_macros::dec;

fn main() {
    println!("╔══════════════════════════════════════════════╗");
    println!("║  habitat-allocation: Basic Allocation Example ║");
    println!("╚══════════════════════════════════════════════╝\n");

    let snapshot = ReferenceSnapshot::new(
        vec![
            Bank::new("ITCHEN", "Winchester", "South Downs"),
            Bank::new("TEST", "Test Valley", "Hampshire Downs"),
            Bank::new("TAMAR", "Cornwall", "Bodmin Moor"),
        ],
        vec![
            HabitatEntry::new("Other neutral grassland", "Grassland", "Medium", Ledger::Area),
            HabitatEntry::new("Modified grassland", "Grassland", "Low", Ledger::Area),
            HabitatEntry::new("Native hedgerow", "Hedgerow", "Low", Ledger::Hedgerow),
        ],
        vec![
            StockLot::new("IT-1", "ITCHEN", "Other neutral grassland", 1.2),
            StockLot::new("IT-2", "ITCHEN", "Native hedgerow", 4.0),
            StockLot::new("TE-1", "TEST", "Other neutral grassland", 6.0),
            StockLot::new("TA-1", "TAMAR", "Modified grassland", 50.0),
        ],
        vec![
            PriceRow::new("ITCHEN", "Other neutral grassland", Tier::Local, "small", dec!(24000)),
            PriceRow::new("ITCHEN", "Native hedgerow", Tier::Local, "small", dec!(3500)),
            PriceRow::new("TEST", "Other neutral grassland", Tier::Adjacent, "small", dec!(26500)),
            PriceRow::new("TAMAR", "Modified grassland", Tier::Far, "small", dec!(11000)),
        ],
    );

    let target = TargetSite::new("Winchester City Council", "South Downs")
        .with_lpa_neighbors(["Test Valley", "East Hampshire"])
        .with_nca_neighbors(["Hampshire Downs"]);

    let basket: DemandBasket = vec![
        DemandLine::new("Other neutral grassland", 2.0),
        DemandLine::new("Native hedgerow", 0.8),
        DemandLine::net_gain(Ledger::Area, 0.25),
    ]
    .into_iter()
    .collect();

    println!("━━━ Demand ━━━\n");
    for line in basket.lines() {
        println!("  {:<32} {:.2} units", line.habitat_name, line.units_required);
    }
    println!();

    let allocator = Allocator::new(AllocatorConfig::default());
    match allocator.allocate(&snapshot, &target, &basket, &ContractSize::new("small")) {
        Ok(result) => {
            println!("{}", result);
            println!("━━━ Per bank ━━━\n");
            for (bank, total) in result.bank_totals() {
                println!("  {:<8} £{}", bank.to_string(), total);
            }
        }
        Err(e) => println!("Allocation failed: {}", e),
    }
}
