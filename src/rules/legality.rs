//! Habitat trading rules.
//!
//! Whether a surplus of habitat S may discharge a deficit of habitat D
//! depends on the ledger and on D's distinctiveness band. Rules are pure
//! predicates; catalog lookups happen once in [`HabitatProfile::resolve`].

use crate::core::distinctiveness::{Band, DistinctivenessLevels, Level};
use crate::core::habitat::{HabitatCatalog, Ledger};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The attributes of a habitat the trading rules look at.
#[derive(Debug, Clone, PartialEq)]
pub struct HabitatProfile {
    pub name: String,
    pub broad_group: String,
    pub level: Level,
    pub ledger: Ledger,
    pub net_gain: bool,
}

impl HabitatProfile {
    /// Look a habitat up in the catalog. Net Gain literals resolve to a
    /// Low-equivalent profile with an empty broad group.
    pub fn resolve(
        name: &str,
        catalog: &HabitatCatalog,
        levels: &DistinctivenessLevels,
    ) -> Option<Self> {
        if let Some(ledger) = Ledger::of_net_gain(name) {
            return Some(Self {
                name: name.to_string(),
                broad_group: String::new(),
                level: Level::net_gain(levels),
                ledger,
                net_gain: true,
            });
        }
        let entry = catalog.get(name)?;
        Some(Self {
            name: entry.habitat_name.clone(),
            broad_group: entry.broad_group.clone(),
            level: levels.level(&entry.distinctiveness),
            ledger: entry.ledger(),
            net_gain: false,
        })
    }

    fn same_habitat(&self, other: &HabitatProfile) -> bool {
        self.name == other.name
    }

    fn same_group(&self, other: &HabitatProfile) -> bool {
        !self.broad_group.is_empty() && self.broad_group.eq_ignore_ascii_case(&other.broad_group)
    }
}

/// One explicit override row: the only supply habitats allowed for
/// `demand_habitat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingRule {
    pub demand_habitat: String,
    pub allowed_supply: Vec<String>,
}

/// Per-habitat override table. Takes precedence over the band rules.
#[derive(Debug, Clone, Default)]
pub struct TradingRules {
    overrides: HashMap<String, Vec<String>>,
}

impl TradingRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, rule: TradingRule) {
        self.overrides
            .entry(rule.demand_habitat)
            .or_default()
            .extend(rule.allowed_supply);
    }

    pub fn allowed_for(&self, demand_habitat: &str) -> Option<&[String]> {
        self.overrides.get(demand_habitat).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}

impl FromIterator<TradingRule> for TradingRules {
    fn from_iter<T: IntoIterator<Item = TradingRule>>(iter: T) -> Self {
        let mut rules = Self::new();
        for rule in iter {
            rules.insert(rule);
        }
        rules
    }
}

/// Band rules without overrides.
///
/// Both profiles are assumed to belong to `ledger`; cross-ledger pairs are
/// rejected.
///
/// # Examples
///
/// ```
/// use habitat_allocation::core::distinctiveness::DistinctivenessLevels;
/// use habitat_allocation::core::habitat::{HabitatCatalog, HabitatEntry, Ledger};
/// use habitat_allocation::rules::legality::{can_trade, HabitatProfile};
///
/// let catalog: HabitatCatalog = [
///     HabitatEntry::new("Ditches", "Watercourse", "Medium", Ledger::Watercourse),
///     HabitatEntry::new("Canals", "Watercourse", "Medium", Ledger::Watercourse),
/// ].into_iter().collect();
/// let levels = DistinctivenessLevels::default();
/// let ditches = HabitatProfile::resolve("Ditches", &catalog, &levels).unwrap();
/// let canals = HabitatProfile::resolve("Canals", &catalog, &levels).unwrap();
///
/// assert!(!can_trade(Ledger::Watercourse, &ditches, &canals));
/// assert!(can_trade(Ledger::Watercourse, &ditches, &ditches));
/// ```
pub fn can_trade(ledger: Ledger, demand: &HabitatProfile, supply: &HabitatProfile) -> bool {
    if demand.ledger != ledger || supply.ledger != ledger {
        return false;
    }
    if demand.same_habitat(supply) {
        return true;
    }
    match ledger {
        Ledger::Area => area_rule(demand, supply),
        Ledger::Hedgerow => hedgerow_rule(demand, supply),
        Ledger::Watercourse => watercourse_rule(demand, supply),
    }
}

fn area_rule(demand: &HabitatProfile, supply: &HabitatProfile) -> bool {
    if demand.net_gain {
        return true;
    }
    match demand.level.band() {
        Band::VeryLow | Band::Low => true,
        Band::Medium => {
            supply.level.exceeds(&demand.level)
                || (demand.same_group(supply) && supply.level.at_least(&demand.level))
        }
        Band::High | Band::VeryHigh | Band::Unrecognized => false,
    }
}

fn hedgerow_rule(demand: &HabitatProfile, supply: &HabitatProfile) -> bool {
    if demand.net_gain {
        return true;
    }
    match demand.level.band() {
        Band::VeryHigh | Band::Unrecognized => false,
        Band::High => supply.level.exceeds(&demand.level),
        Band::Medium | Band::Low | Band::VeryLow => supply.level.at_least(&demand.level),
    }
}

// Same distinctiveness is not enough here: a different watercourse habitat
// must rank strictly higher.
fn watercourse_rule(demand: &HabitatProfile, supply: &HabitatProfile) -> bool {
    if demand.net_gain {
        return true;
    }
    match demand.level.band() {
        Band::VeryHigh | Band::Unrecognized => false,
        Band::High | Band::Medium | Band::Low | Band::VeryLow => {
            supply.level.exceeds(&demand.level)
        }
    }
}

/// Legality with the override table applied.
#[derive(Debug, Clone, Copy)]
pub struct LegalityEngine<'a> {
    rules: &'a TradingRules,
}

impl<'a> LegalityEngine<'a> {
    pub fn new(rules: &'a TradingRules) -> Self {
        Self { rules }
    }

    pub fn can_trade(&self, ledger: Ledger, demand: &HabitatProfile, supply: &HabitatProfile) -> bool {
        if demand.ledger != ledger || supply.ledger != ledger {
            return false;
        }
        if demand.same_habitat(supply) {
            return true;
        }
        match self.rules.allowed_for(&demand.name) {
            Some(allowed) => allowed.iter().any(|a| a == &supply.name),
            None => can_trade(ledger, demand, supply),
        }
    }
}
