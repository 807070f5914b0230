//! Paired options: blending a legal primary lot with a cheaper companion lot
//! from the same bank.
//!
//! Away from the local tier each supplied unit is discounted by the spatial
//! risk multiplier (SRM). A blend that draws `1/SRM` of a unit from the
//! primary and the rest from a companion still credits one unit per demand
//! unit, at a blended price.

use crate::core::habitat::Ledger;
use crate::core::pricing::{ContractSize, Tier};
use crate::core::stock::StockLot;
use crate::options::{AllocationOption, OptionKind, StockDraw};
use crate::rules::price_resolver::{PriceProvenance, PriceResolver};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::cmp::Ordering;

/// A legal, priced primary lot for one demand line.
#[derive(Debug, Clone)]
pub struct PairingCandidate<'a> {
    pub lot: &'a StockLot,
    pub tier: Tier,
    pub unit_price: Decimal,
    pub provenance: PriceProvenance,
    pub proxy_habitat: Option<String>,
}

/// Blend one primary with one companion at `tier`.
///
/// # Examples
///
/// ```
/// use habitat_allocation::core::pricing::Tier;
/// use habitat_allocation::options::pairing::blended_price;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(blended_price(Tier::Far, dec!(30000), dec!(10000)), dec!(20000));
/// assert_eq!(blended_price(Tier::Adjacent, dec!(40000), dec!(8000)), dec!(32000));
/// ```
pub fn blended_price(tier: Tier, primary: Decimal, companion: Decimal) -> Decimal {
    let share = tier.primary_share();
    share * primary + (Decimal::ONE - share) * companion
}

/// Paired options for one area demand line.
///
/// For every non-local primary, the companion is the cheapest other-habitat
/// area lot with stock and an exact price at the same bank and tier. Ties go
/// to the larger quantity, then the smaller stock id.
pub fn paired_options(
    line: usize,
    primaries: &[PairingCandidate<'_>],
    companions: &[&StockLot],
    resolver: &PriceResolver<'_>,
    contract_size: &ContractSize,
) -> Vec<AllocationOption> {
    let mut out = Vec::new();
    for primary in primaries.iter().filter(|p| !p.tier.is_local()) {
        let bank = &primary.lot.bank_key;
        let companion = companions
            .iter()
            .filter(|c| {
                &c.bank_key == bank
                    && c.stock_id != primary.lot.stock_id
                    && c.habitat_name != primary.lot.habitat_name
                    && c.has_stock()
            })
            .filter_map(|c| {
                resolver
                    .exact(bank, &c.habitat_name, primary.tier, contract_size)
                    .map(|price| (*c, price))
            })
            .min_by(|(a, pa), (b, pb)| {
                pa.cmp(pb)
                    .then_with(|| {
                        b.quantity_available
                            .partial_cmp(&a.quantity_available)
                            .unwrap_or(Ordering::Equal)
                    })
                    .then_with(|| a.stock_id.cmp(&b.stock_id))
            });

        let Some((companion, companion_price)) = companion else {
            continue;
        };

        let share = primary.tier.primary_share();
        let rest = Decimal::ONE - share;
        let unit_price = blended_price(primary.tier, primary.unit_price, companion_price);
        log::debug!(
            "paired {} + {} at {} ({}): {}",
            primary.lot.habitat_name,
            companion.habitat_name,
            bank,
            primary.tier,
            unit_price
        );

        out.push(AllocationOption {
            line,
            ledger: Ledger::Area,
            bank_key: bank.clone(),
            tier: primary.tier,
            unit_price,
            provenance: primary.provenance,
            proxy_habitat: primary.proxy_habitat.clone(),
            kind: OptionKind::Paired,
            draws: vec![
                StockDraw {
                    stock_id: primary.lot.stock_id.clone(),
                    habitat: primary.lot.habitat_name.clone(),
                    coefficient: share.to_f64().unwrap_or(1.0),
                    share,
                    unit_price: primary.unit_price,
                },
                StockDraw {
                    stock_id: companion.stock_id.clone(),
                    habitat: companion.habitat_name.clone(),
                    coefficient: rest.to_f64().unwrap_or(0.0),
                    share: rest,
                    unit_price: companion_price,
                },
            ],
        });
    }
    out
}
