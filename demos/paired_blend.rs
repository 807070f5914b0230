//! Paired blend example.
//!
//! Far from the site each credit is discounted by the spatial risk
//! multiplier. Pairing a scarce high-distinctiveness lot with a cheap
//! companion from the same bank still credits one unit per unit delivered,
//! at a blended price.

use habitat_allocation::core::bank::Bank;
use habitat_allocation::core::demand::{DemandBasket, DemandLine};
use habitat_allocation::core::habitat::{HabitatEntry, Ledger};
use habitat_allocation::core::pricing::{ContractSize, PriceRow, Tier};
use habitat_allocation::core::snapshot::{ReferenceSnapshot, TargetSite};
use habitat_allocation::core::stock::StockLot;
use habitat_allocation::optimization::allocator::{Allocator, AllocatorConfig};
use habitat_allocation::options::builder::OptionBuilder;
use habitat_allocation::options::pairing::blended_price;
use rust_decimal_macros::dec;

fn main() {
    println!("╔════════════════════════════════════════╗");
    println!("║  habitat-allocation: Paired Blend Demo  ║");
    println!("╚════════════════════════════════════════╝\n");

    for tier in [Tier::Adjacent, Tier::Far] {
        println!(
            "{:<9} SRM {}  primary share {}  £30,000 + £10,000 → £{}",
            tier.to_string(),
            tier.spatial_risk_multiplier().round_dp(4),
            tier.primary_share(),
            blended_price(tier, dec!(30000), dec!(10000))
        );
    }
    println!();

    let snapshot = ReferenceSnapshot::new(
        vec![Bank::new("MOOR", "Cornwall", "Bodmin Moor")],
        vec![
            HabitatEntry::new("Lowland meadows", "Grassland", "High", Ledger::Area),
            HabitatEntry::new("Modified grassland", "Grassland", "Low", Ledger::Area),
        ],
        vec![
            StockLot::new("MO-1", "MOOR", "Lowland meadows", 3.0),
            StockLot::new("MO-2", "MOOR", "Modified grassland", 10.0),
        ],
        vec![
            PriceRow::new("MOOR", "Lowland meadows", Tier::Far, "small", dec!(30000)),
            PriceRow::new("MOOR", "Modified grassland", Tier::Far, "small", dec!(10000)),
        ],
    );
    let target = TargetSite::new("Winchester", "South Downs");
    let basket: DemandBasket = vec![DemandLine::new("Lowland meadows", 4.0)].into_iter().collect();
    let size = ContractSize::new("small");

    println!("━━━ Options ━━━\n");
    let set = match OptionBuilder::new(&snapshot, &target, size.clone()).build(&basket) {
        Ok(set) => set,
        Err(e) => {
            println!("Option building failed: {}", e);
            return;
        }
    };
    for option in set.options() {
        println!("  {:?} {:<40} £{}", option.kind, option.supply_label(), option.unit_price);
    }
    println!();

    // 3.0 units of meadow alone cannot cover 4.0; the blend draws only 2.0.
    let allocator = Allocator::new(AllocatorConfig::default());
    match allocator.solve(&set, &size) {
        Ok(result) => println!("{}", result),
        Err(e) => println!("Allocation failed: {}", e),
    }
}
