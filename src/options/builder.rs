use crate::core::bank::BankKey;
use crate::core::demand::DemandBasket;
use crate::core::habitat::Ledger;
use crate::core::pricing::{ContractSize, Tier};
use crate::core::snapshot::{ReferenceSnapshot, TargetSite};
use crate::core::stock::{StockId, StockLot};
use crate::error::AllocationError;
use crate::options::pairing::{self, PairingCandidate};
use crate::options::{AllocationOption, OptionKind, OptionSet, Requirement, StockDraw};
use crate::rules::legality::{HabitatProfile, LegalityEngine};
use crate::rules::price_resolver::PriceResolver;
use crate::rules::tier::TierClassifier;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

/// Enumerates every legal, priced way to supply each demand line.
///
/// One builder serves all three ledgers; [`OptionBuilder::build_ledger`]
/// handles a single ledger and [`OptionBuilder::build`] concatenates them.
pub struct OptionBuilder<'a> {
    snapshot: &'a ReferenceSnapshot,
    contract_size: ContractSize,
    bank_tiers: HashMap<BankKey, Tier>,
}

impl<'a> OptionBuilder<'a> {
    pub fn new(
        snapshot: &'a ReferenceSnapshot,
        target: &TargetSite,
        contract_size: ContractSize,
    ) -> Self {
        let classifier = TierClassifier::new(target);
        let bank_tiers = snapshot
            .stocked_banks()
            .into_iter()
            .map(|key| {
                let tier = match snapshot.bank(&key) {
                    Some(bank) => classifier.classify(&bank.lpa_name, &bank.nca_name),
                    None => {
                        log::debug!("bank {} missing from bank table, treating as far", key);
                        Tier::Far
                    }
                };
                (key, tier)
            })
            .collect();
        Self {
            snapshot,
            contract_size,
            bank_tiers,
        }
    }

    pub fn tier_of(&self, bank: &BankKey) -> Tier {
        self.bank_tiers.get(bank).copied().unwrap_or(Tier::Far)
    }

    /// Validate the basket and resolve each positive line's ledger.
    pub fn requirements(&self, basket: &DemandBasket) -> Result<Vec<Requirement>, AllocationError> {
        let catalog = self.snapshot.catalog();
        let mut requirements = Vec::new();
        for (line, demand) in basket.lines().iter().enumerate() {
            if !demand.is_well_formed() {
                return Err(AllocationError::InvalidDemand {
                    habitat: demand.habitat_name.clone(),
                    units: demand.units_required,
                });
            }
            let ledger = catalog.ledger_of(&demand.habitat_name).ok_or_else(|| {
                AllocationError::UnknownHabitat {
                    habitat: demand.habitat_name.clone(),
                }
            })?;
            if demand.units_required == 0.0 {
                continue;
            }
            requirements.push(Requirement {
                line,
                habitat: demand.habitat_name.clone(),
                ledger,
                units: demand.units_required,
            });
        }
        Ok(requirements)
    }

    /// Build options for every ledger and check each line has at least one.
    pub fn build(&self, basket: &DemandBasket) -> Result<OptionSet, AllocationError> {
        let requirements = self.requirements(basket)?;

        let mut options = Vec::new();
        for ledger in Ledger::ALL {
            options.extend(self.build_ledger(ledger, &requirements));
        }

        let mut infeasible = requirements
            .iter()
            .filter(|r| !options.iter().any(|o| o.line == r.line));
        if let Some(first) = infeasible.next() {
            for other in infeasible {
                log::warn!("demand line '{}' also has no supply options", other.habitat);
            }
            return Err(AllocationError::InfeasibleDemandLine {
                habitat: first.habitat.clone(),
                ledger: first.ledger,
            });
        }

        let stock_caps: BTreeMap<StockId, f64> = self
            .snapshot
            .stock()
            .iter()
            .filter(|lot| options.iter().any(|o| o.draws.iter().any(|d| d.stock_id == lot.stock_id)))
            .map(|lot| (lot.stock_id.clone(), lot.quantity_available))
            .collect();

        log::info!(
            "built {} options for {} demand lines across {} banks",
            options.len(),
            requirements.len(),
            options
                .iter()
                .map(|o| &o.bank_key)
                .collect::<std::collections::BTreeSet<_>>()
                .len()
        );
        Ok(OptionSet::new(requirements, options, stock_caps))
    }

    /// Options for the requirements of one ledger.
    pub fn build_ledger(&self, ledger: Ledger, requirements: &[Requirement]) -> Vec<AllocationOption> {
        let snapshot = self.snapshot;
        let levels = snapshot.levels();
        let catalog = snapshot.catalog();
        let legality = LegalityEngine::new(snapshot.trading_rules());
        let resolver = PriceResolver::new(snapshot.prices(), catalog, levels);

        let ledger_lots: Vec<(&StockLot, HabitatProfile)> = snapshot
            .stock()
            .iter()
            .filter(|lot| lot.has_stock())
            .filter_map(|lot| {
                let profile = HabitatProfile::resolve(&lot.habitat_name, catalog, levels);
                if profile.is_none() {
                    log::debug!("stock {} habitat '{}' not in catalog", lot.stock_id, lot.habitat_name);
                }
                profile.filter(|p| p.ledger == ledger).map(|p| (lot, p))
            })
            .collect();

        let mut options = Vec::new();
        for requirement in requirements.iter().filter(|r| r.ledger == ledger) {
            let Some(demand) = HabitatProfile::resolve(&requirement.habitat, catalog, levels) else {
                continue;
            };

            let mut primaries: Vec<PairingCandidate> = Vec::new();
            for &(lot, ref supply) in &ledger_lots {
                if !legality.can_trade(ledger, &demand, supply) {
                    continue;
                }
                let tier = self.tier_of(&lot.bank_key);
                let Some(price) = resolver.price_for(
                    &lot.bank_key,
                    &lot.habitat_name,
                    tier,
                    &self.contract_size,
                    &demand,
                ) else {
                    log::debug!(
                        "no price for {} at {} ({}), dropping candidate",
                        lot.habitat_name,
                        lot.bank_key,
                        tier
                    );
                    continue;
                };

                options.push(AllocationOption {
                    line: requirement.line,
                    ledger,
                    bank_key: lot.bank_key.clone(),
                    tier,
                    unit_price: price.unit_price,
                    provenance: price.provenance,
                    proxy_habitat: price.proxy_habitat().map(str::to_string),
                    kind: OptionKind::Single,
                    draws: vec![StockDraw {
                        stock_id: lot.stock_id.clone(),
                        habitat: lot.habitat_name.clone(),
                        coefficient: 1.0,
                        share: Decimal::ONE,
                        unit_price: price.unit_price,
                    }],
                });
                primaries.push(PairingCandidate {
                    lot,
                    tier,
                    unit_price: price.unit_price,
                    provenance: price.provenance,
                    proxy_habitat: price.proxy_habitat().map(str::to_string),
                });
            }

            if ledger == Ledger::Area {
                let companions: Vec<&StockLot> = ledger_lots.iter().map(|(lot, _)| *lot).collect();
                options.extend(pairing::paired_options(
                    requirement.line,
                    &primaries,
                    &companions,
                    &resolver,
                    &self.contract_size,
                ));
            }
        }
        options
    }
}
