//! Unit price lookup with proxy fallbacks.
//!
//! The price book is sparse. Low and Medium trades are fungible enough that
//! a representative price from the same bank stands in for a missing row;
//! High and Very High trades are exact-match by legality, so they never get
//! a proxy.

use crate::core::bank::BankKey;
use crate::core::distinctiveness::{Band, DistinctivenessLevels};
use crate::core::habitat::HabitatCatalog;
use crate::core::pricing::{ContractSize, PriceTable, Tier};
use crate::rules::legality::HabitatProfile;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Where a resolved price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PriceProvenance {
    Exact,
    AnyLowProxy,
    GroupProxy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPrice {
    pub unit_price: Decimal,
    pub provenance: PriceProvenance,
    /// The habitat whose row supplied the price.
    pub priced_habitat: String,
}

impl ResolvedPrice {
    /// The stand-in habitat, for proxy prices only.
    pub fn proxy_habitat(&self) -> Option<&str> {
        match self.provenance {
            PriceProvenance::Exact => None,
            _ => Some(&self.priced_habitat),
        }
    }
}

/// Resolves prices against one snapshot's price book.
#[derive(Debug, Clone, Copy)]
pub struct PriceResolver<'a> {
    prices: &'a PriceTable,
    catalog: &'a HabitatCatalog,
    levels: &'a DistinctivenessLevels,
}

impl<'a> PriceResolver<'a> {
    pub fn new(
        prices: &'a PriceTable,
        catalog: &'a HabitatCatalog,
        levels: &'a DistinctivenessLevels,
    ) -> Self {
        Self {
            prices,
            catalog,
            levels,
        }
    }

    /// Exact row only.
    pub fn exact(
        &self,
        bank: &BankKey,
        habitat: &str,
        tier: Tier,
        size: &ContractSize,
    ) -> Option<Decimal> {
        self.prices.exact(bank, tier, habitat, size)
    }

    /// Price `habitat` at `bank` for a trade discharging `demand`.
    ///
    /// 1. exact (bank, tier, habitat, size) row;
    /// 2. Low / Net Gain demand: cheapest priced habitat in the demand's ledger;
    /// 3. Medium demand: cheapest in the demand's broad group at or above its
    ///    level, else cheapest strictly above it;
    /// 4. otherwise `None`.
    ///
    /// Ties between equally cheap proxies go to the lexicographically
    /// smallest habitat name.
    pub fn price_for(
        &self,
        bank: &BankKey,
        habitat: &str,
        tier: Tier,
        size: &ContractSize,
        demand: &HabitatProfile,
    ) -> Option<ResolvedPrice> {
        if let Some(unit_price) = self.exact(bank, habitat, tier, size) {
            return Some(ResolvedPrice {
                unit_price,
                provenance: PriceProvenance::Exact,
                priced_habitat: habitat.to_string(),
            });
        }

        let candidates: Vec<(&str, Decimal, HabitatProfile)> = self
            .prices
            .priced_at(bank, tier, size)
            .iter()
            .filter_map(|(name, price)| {
                let profile = HabitatProfile::resolve(name, self.catalog, self.levels)?;
                (profile.ledger == demand.ledger).then_some((name.as_str(), *price, profile))
            })
            .collect();

        let band = demand.level.band();
        if demand.net_gain || band.is_low_equivalent() {
            return cheapest(candidates.iter(), PriceProvenance::AnyLowProxy);
        }
        if band == Band::Medium {
            let in_group = candidates.iter().filter(|(_, _, p)| {
                !demand.broad_group.is_empty()
                    && p.broad_group.eq_ignore_ascii_case(&demand.broad_group)
                    && p.level.at_least(&demand.level)
            });
            if let Some(found) = cheapest(in_group, PriceProvenance::GroupProxy) {
                return Some(found);
            }
            let higher = candidates
                .iter()
                .filter(|(_, _, p)| p.level.exceeds(&demand.level));
            return cheapest(higher, PriceProvenance::GroupProxy);
        }
        None
    }
}

fn cheapest<'c, 's: 'c, I>(candidates: I, provenance: PriceProvenance) -> Option<ResolvedPrice>
where
    I: Iterator<Item = &'c (&'s str, Decimal, HabitatProfile)>,
{
    candidates
        .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)))
        .map(|(name, price, _)| ResolvedPrice {
            unit_price: *price,
            provenance,
            priced_habitat: name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::habitat::{HabitatEntry, Ledger, NET_GAIN_AREA};
    use crate::core::pricing::PriceRow;
    use rust_decimal_macros::dec;

    struct Fixture {
        prices: PriceTable,
        catalog: HabitatCatalog,
        levels: DistinctivenessLevels,
    }

    impl Fixture {
        fn new() -> Self {
            let catalog: HabitatCatalog = [
                HabitatEntry::new("Modified grassland", "Grassland", "Low", Ledger::Area),
                HabitatEntry::new("Other neutral grassland", "Grassland", "Medium", Ledger::Area),
                HabitatEntry::new("Lowland meadows", "Grassland", "High", Ledger::Area),
                HabitatEntry::new("Mixed scrub", "Heathland and shrub", "Medium", Ledger::Area),
                HabitatEntry::new("Lowland heathland", "Heathland and shrub", "High", Ledger::Area),
                HabitatEntry::new("Native hedgerow", "Hedgerow", "Low", Ledger::Hedgerow),
            ]
            .into_iter()
            .collect();
            let prices: PriceTable = vec![
                PriceRow::new("B1", "Modified grassland", Tier::Local, "small", dec!(18000)),
                PriceRow::new("B1", "Mixed scrub", Tier::Local, "small", dec!(22000)),
                PriceRow::new("B1", "Lowland heathland", Tier::Local, "small", dec!(30000)),
                PriceRow::new("B1", "Lowland meadows", Tier::Local, "small", dec!(35000)),
                PriceRow::new("B1", "Native hedgerow", Tier::Local, "small", dec!(9000)),
            ]
            .into_iter()
            .collect();
            Self {
                prices,
                catalog,
                levels: DistinctivenessLevels::default(),
            }
        }

        fn resolver(&self) -> PriceResolver<'_> {
            PriceResolver::new(&self.prices, &self.catalog, &self.levels)
        }

        fn profile(&self, name: &str) -> HabitatProfile {
            HabitatProfile::resolve(name, &self.catalog, &self.levels).unwrap()
        }
    }

    #[test]
    fn test_exact_row_wins() {
        let f = Fixture::new();
        let demand = f.profile("Lowland meadows");
        let price = f
            .resolver()
            .price_for(&"B1".into(), "Lowland meadows", Tier::Local, &"small".into(), &demand)
            .unwrap();
        assert_eq!(price.unit_price, dec!(35000));
        assert_eq!(price.provenance, PriceProvenance::Exact);
        assert_eq!(price.proxy_habitat(), None);
    }

    #[test]
    fn test_low_proxy_is_cheapest_in_ledger() {
        let f = Fixture::new();
        let demand = f.profile(NET_GAIN_AREA);
        let price = f
            .resolver()
            .price_for(&"B1".into(), "Unpriced habitat", Tier::Local, &"small".into(), &demand)
            .unwrap();
        // the hedgerow row is cheaper but belongs to another ledger
        assert_eq!(price.unit_price, dec!(18000));
        assert_eq!(price.provenance, PriceProvenance::AnyLowProxy);
        assert_eq!(price.priced_habitat, "Modified grassland");
        assert_eq!(price.proxy_habitat(), Some("Modified grassland"));
    }

    #[test]
    fn test_medium_prefers_same_group() {
        let f = Fixture::new();
        let demand = f.profile("Other neutral grassland");
        let price = f
            .resolver()
            .price_for(&"B1".into(), "Other neutral grassland", Tier::Local, &"small".into(), &demand)
            .unwrap();
        // Lowland meadows (Grassland, High) beats the cheaper Mixed scrub (other group)
        assert_eq!(price.unit_price, dec!(35000));
        assert_eq!(price.provenance, PriceProvenance::GroupProxy);
    }

    #[test]
    fn test_medium_falls_back_to_strictly_higher() {
        let f = Fixture::new();
        let mut demand = f.profile("Other neutral grassland");
        demand.broad_group = "Woodland".into();
        let price = f
            .resolver()
            .price_for(&"B1".into(), "Other neutral grassland", Tier::Local, &"small".into(), &demand)
            .unwrap();
        assert_eq!(price.unit_price, dec!(30000));
        assert_eq!(price.priced_habitat, "Lowland heathland");
    }

    #[test]
    fn test_high_has_no_proxy() {
        let f = Fixture::new();
        let demand = f.profile("Lowland heathland");
        let price = f.resolver().price_for(
            &"B1".into(),
            "Lowland heathland",
            Tier::Far,
            &"small".into(),
            &demand,
        );
        assert!(price.is_none());
    }
}
