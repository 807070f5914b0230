//! Deterministic greedy fallback used when no LP solve is possible.
//!
//! Lines are covered in input order, each by a single option. Only the hard
//! bank cap is enforced; bank-count minimisation is the LP path's job.

use crate::core::bank::BankKey;
use crate::core::stock::StockId;
use crate::error::AllocationError;
use crate::options::OptionSet;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

const FIT_TOLERANCE: f64 = 1e-9;

/// Cover every requirement with one option each.
///
/// Returns `(option index, quantity)` pairs in requirement order. The input
/// stock caps are copied; the set itself is never mutated.
pub fn solve_greedy(
    set: &OptionSet,
    max_banks: usize,
) -> Result<Vec<(usize, f64)>, AllocationError> {
    let mut remaining: BTreeMap<StockId, f64> = set.stock_caps().clone();
    let mut banks: BTreeSet<BankKey> = BTreeSet::new();
    let mut picks = Vec::with_capacity(set.requirements().len());

    for requirement in set.requirements() {
        let mut candidates: Vec<(usize, f64)> = set
            .options_for_line(requirement.line)
            .map(|(index, option)| (index, option.deliverable(&remaining)))
            .collect();
        candidates.sort_by(|&(a, cap_a), &(b, cap_b)| {
            let (oa, ob) = (&set.options()[a], &set.options()[b]);
            oa.unit_price
                .cmp(&ob.unit_price)
                .then_with(|| oa.tier.rank().cmp(&ob.tier.rank()))
                .then_with(|| cap_b.partial_cmp(&cap_a).unwrap_or(Ordering::Equal))
                .then_with(|| a.cmp(&b))
        });

        let chosen = candidates.into_iter().find(|&(index, deliverable)| {
            let bank = &set.options()[index].bank_key;
            let within_cap = banks.contains(bank) || banks.len() < max_banks;
            within_cap && deliverable >= requirement.units - FIT_TOLERANCE
        });

        let Some((index, _)) = chosen else {
            log::warn!(
                "greedy: no option fits '{}' ({} units) with banks {:?}",
                requirement.habitat,
                requirement.units,
                banks
            );
            return Err(AllocationError::GreedyInfeasible {
                habitat: requirement.habitat.clone(),
            });
        };

        let option = &set.options()[index];
        for draw in &option.draws {
            if let Some(left) = remaining.get_mut(&draw.stock_id) {
                *left = (*left - draw.coefficient * requirement.units).max(0.0);
            }
        }
        banks.insert(option.bank_key.clone());
        log::debug!(
            "greedy: '{}' <- {} @ {} ({})",
            requirement.habitat,
            option.supply_label(),
            option.bank_key,
            option.unit_price
        );
        picks.push((index, requirement.units));
    }

    Ok(picks)
}
