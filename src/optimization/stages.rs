//! The three-stage lexicographic optimizer.
//!
//! The bank cap is handled combinatorially: every stage solves pure LPs over
//! a fixed set of permitted banks, and the stages differ only in which bank
//! sets they try and whether a cost ceiling applies.
//!
//! - **A** minimises cost over every bank set of the capped size;
//! - **B** looks for the smallest bank set that stays within a small cost
//!   tolerance of A;
//! - **C** re-minimises cost on B's bank set.

use crate::core::bank::BankKey;
use crate::error::BackendError;
use crate::optimization::lp::{LinearProgram, LpBackend, LpOutcome, Relation};
use crate::options::OptionSet;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

/// Quantities below this are treated as zero.
pub const QUANTITY_EPSILON: f64 = 1e-9;

/// Solver noise below this is folded into the line's largest option.
pub const SNAP_EPSILON: f64 = 1e-6;

/// Parameters of one call into [`solve_stage`].
#[derive(Debug, Clone)]
pub struct StageParams<'p> {
    /// Only options from these banks may be used.
    pub banks: &'p BTreeSet<BankKey>,
    /// Upper bound on total cost, if any.
    pub cost_ceiling: Option<f64>,
}

/// Optimal solution of one stage call.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSolution {
    /// (option index, quantity) for every option with a positive quantity.
    pub quantities: Vec<(usize, f64)>,
    pub cost: f64,
    /// Σ tier rank × quantity; lower means closer supply.
    pub tier_score: f64,
    /// Banks actually used.
    pub banks: BTreeSet<BankKey>,
    /// Aggregate capacity of the banks used.
    pub capacity: f64,
}

impl StageSolution {
    /// Lexicographic preference: cost, tier closeness, larger capacity,
    /// then bank keys.
    pub fn compare(&self, other: &StageSolution) -> Ordering {
        let cost_tol = 1e-9 * self.cost.abs().max(other.cost.abs()).max(1.0);
        if (self.cost - other.cost).abs() > cost_tol {
            return self.cost.partial_cmp(&other.cost).unwrap_or(Ordering::Equal);
        }
        if (self.tier_score - other.tier_score).abs() > 1e-9 {
            return self
                .tier_score
                .partial_cmp(&other.tier_score)
                .unwrap_or(Ordering::Equal);
        }
        other
            .capacity
            .partial_cmp(&self.capacity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.banks.cmp(&other.banks))
    }
}

/// Solve the allocation LP restricted to `params.banks`.
///
/// Two sequential solves: minimum cost, then minimum tier score with the
/// cost fixed at its optimum. Returns `Ok(None)` when the restricted problem
/// is infeasible.
pub fn solve_stage(
    set: &OptionSet,
    backend: &dyn LpBackend,
    params: &StageParams<'_>,
) -> Result<Option<StageSolution>, BackendError> {
    let columns: Vec<usize> = set
        .options()
        .iter()
        .enumerate()
        .filter(|(_, o)| params.banks.contains(&o.bank_key))
        .map(|(i, _)| i)
        .collect();

    let covered = set
        .requirements()
        .iter()
        .all(|r| columns.iter().any(|&c| set.options()[c].line == r.line));
    if !covered {
        return Ok(None);
    }

    let prices: Vec<f64> = columns
        .iter()
        .map(|&c| set.options()[c].unit_price_f64())
        .collect();
    let mut program = LinearProgram::new(prices.clone());

    for requirement in set.requirements() {
        let terms = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| set.options()[**c].line == requirement.line)
            .map(|(var, _)| (var, 1.0))
            .collect();
        program.add_constraint(terms, Relation::Eq, requirement.units);
    }

    for (stock, &cap) in set.stock_caps() {
        if !cap.is_finite() {
            continue;
        }
        let terms: Vec<(usize, f64)> = columns
            .iter()
            .enumerate()
            .map(|(var, &c)| (var, set.options()[c].coefficient_for(stock)))
            .filter(|(_, coeff)| *coeff > 0.0)
            .collect();
        if !terms.is_empty() {
            program.add_constraint(terms, Relation::Le, cap.max(0.0));
        }
    }

    if let Some(ceiling) = params.cost_ceiling {
        let terms = prices.iter().copied().enumerate().collect();
        program.add_constraint(terms, Relation::Le, ceiling);
    }

    let (cost, values) = match backend.solve(&program)? {
        LpOutcome::Infeasible => return Ok(None),
        LpOutcome::Optimal { objective, values } => (objective, values),
    };

    // Fix the cost optimum and prefer closer tiers.
    let tiers: Vec<f64> = columns
        .iter()
        .map(|&c| f64::from(set.options()[c].tier.rank()))
        .collect();
    let uniform_tier = tiers.windows(2).all(|w| w[0] == w[1]);
    let values = if uniform_tier {
        values
    } else {
        let mut tie_break = program.with_objective(tiers.clone());
        let slack = 1e-9 * cost.abs().max(1.0);
        tie_break.add_constraint(
            prices.iter().copied().enumerate().collect(),
            Relation::Le,
            cost + slack,
        );
        match backend.solve(&tie_break)? {
            LpOutcome::Optimal { values, .. } => values,
            LpOutcome::Infeasible => {
                log::debug!("tier tie-break infeasible at cost {}, keeping cost solution", cost);
                values
            }
        }
    };
    let values = snap_quantities(set, &columns, values);

    let quantities: Vec<(usize, f64)> = columns
        .iter()
        .zip(&values)
        .filter(|(_, q)| **q > QUANTITY_EPSILON)
        .map(|(&c, &q)| (c, q))
        .collect();
    let banks: BTreeSet<BankKey> = quantities
        .iter()
        .map(|&(c, _)| set.options()[c].bank_key.clone())
        .collect();
    let capacity = banks.iter().map(|b| set.bank_capacity(b)).sum();

    Ok(Some(StageSolution {
        cost: LinearProgram::evaluate(&prices, &values),
        tier_score: LinearProgram::evaluate(&tiers, &values),
        quantities,
        banks,
        capacity,
    }))
}

/// Move every quantity below [`SNAP_EPSILON`] onto the largest quantity of
/// the same line, so no line carries a dust row.
fn snap_quantities(set: &OptionSet, columns: &[usize], mut values: Vec<f64>) -> Vec<f64> {
    for requirement in set.requirements() {
        let vars: Vec<usize> = (0..columns.len())
            .filter(|&v| set.options()[columns[v]].line == requirement.line)
            .collect();
        let Some(&largest) = vars
            .iter()
            .max_by(|&&a, &&b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal))
        else {
            continue;
        };
        for &v in &vars {
            if v != largest && values[v] < SNAP_EPSILON {
                values[largest] += values[v].max(0.0);
                values[v] = 0.0;
            }
        }
    }
    values
}

/// All `k`-element subsets of `banks`, in lexicographic order.
pub fn bank_subsets(banks: &[BankKey], k: usize) -> Vec<BTreeSet<BankKey>> {
    fn recurse(
        banks: &[BankKey],
        k: usize,
        start: usize,
        current: &mut Vec<BankKey>,
        out: &mut Vec<BTreeSet<BankKey>>,
    ) {
        if current.len() == k {
            out.push(current.iter().cloned().collect());
            return;
        }
        for i in start..banks.len() {
            if banks.len() - i < k - current.len() {
                break;
            }
            current.push(banks[i].clone());
            recurse(banks, k, i + 1, current, out);
            current.pop();
        }
    }

    let mut out = Vec::new();
    if k == 0 || k > banks.len() {
        return out;
    }
    recurse(banks, k, 0, &mut Vec::with_capacity(k), &mut out);
    out
}

/// Tolerances and limits for one staged run.
#[derive(Debug, Clone, Copy)]
pub struct StageLimits {
    pub max_banks: usize,
    pub relative_tolerance: f64,
    pub absolute_tolerance: f64,
    /// Wall-clock budget for the whole staged run.
    pub timeout: Option<Duration>,
}

/// Which stage produced the final answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalStage {
    A,
    C,
}

#[derive(Debug, Clone)]
pub struct StagedOutcome {
    pub solution: StageSolution,
    pub stage: FinalStage,
    pub stage_a_cost: f64,
}

/// Runs stages A, B and C over an option set.
pub struct StagedOptimizer<'s> {
    set: &'s OptionSet,
    backend: &'s dyn LpBackend,
    limits: StageLimits,
    started: Instant,
}

impl<'s> StagedOptimizer<'s> {
    pub fn new(set: &'s OptionSet, backend: &'s dyn LpBackend, limits: StageLimits) -> Self {
        Self {
            set,
            backend,
            limits,
            started: Instant::now(),
        }
    }

    fn check_deadline(&self) -> Result<(), BackendError> {
        match self.limits.timeout {
            Some(timeout) if self.started.elapsed() >= timeout => Err(BackendError::Timeout(timeout)),
            _ => Ok(()),
        }
    }

    fn best_over(
        &self,
        subsets: &[BTreeSet<BankKey>],
        cost_ceiling: Option<f64>,
    ) -> Result<Option<StageSolution>, BackendError> {
        let mut best: Option<StageSolution> = None;
        for banks in subsets {
            self.check_deadline()?;
            let params = StageParams {
                banks,
                cost_ceiling,
            };
            if let Some(solution) = solve_stage(self.set, self.backend, &params)? {
                let better = best
                    .as_ref()
                    .map_or(true, |b| solution.compare(b) == Ordering::Less);
                if better {
                    best = Some(solution);
                }
            }
        }
        Ok(best)
    }

    /// Stage A: cheapest allocation using at most `max_banks` banks.
    ///
    /// Smaller subsets are solved too, so that among equal-cost answers the
    /// capacity tie-break sees single-bank solutions a degenerate vertex of
    /// a larger subset would hide.
    pub fn stage_a(&self) -> Result<Option<StageSolution>, BackendError> {
        let banks: Vec<BankKey> = self.set.banks().into_iter().collect();
        let k = self.limits.max_banks.min(banks.len());
        let subsets: Vec<BTreeSet<BankKey>> =
            (1..=k).flat_map(|size| bank_subsets(&banks, size)).collect();
        let solution = self.best_over(&subsets, None)?;
        if let Some(s) = &solution {
            log::info!("stage A: cost {:.2} using {} bank(s)", s.cost, s.banks.len());
        }
        Ok(solution)
    }

    /// Cost ceiling for stage B given stage A's optimum.
    pub fn cost_ceiling(&self, stage_a_cost: f64) -> f64 {
        let relative = stage_a_cost * (1.0 + self.limits.relative_tolerance);
        let absolute = stage_a_cost + self.limits.absolute_tolerance;
        relative.min(absolute)
    }

    /// Stage B: the fewest banks that stay within the ceiling, if fewer
    /// than `used`.
    pub fn stage_b(
        &self,
        used: usize,
        ceiling: f64,
    ) -> Result<Option<StageSolution>, BackendError> {
        let banks: Vec<BankKey> = self.set.banks().into_iter().collect();
        for k in 1..used {
            if let Some(solution) = self.best_over(&bank_subsets(&banks, k), Some(ceiling))? {
                log::info!("stage B: {} bank(s) within ceiling {:.2}", solution.banks.len(), ceiling);
                return Ok(Some(solution));
            }
        }
        Ok(None)
    }

    /// Stage C: cheapest allocation on a fixed bank set.
    pub fn stage_c(&self, banks: &BTreeSet<BankKey>) -> Result<Option<StageSolution>, BackendError> {
        self.check_deadline()?;
        let solution = solve_stage(
            self.set,
            self.backend,
            &StageParams {
                banks,
                cost_ceiling: None,
            },
        )?;
        if let Some(s) = &solution {
            log::info!("stage C: cost {:.2} on {:?}", s.cost, s.banks);
        }
        Ok(solution)
    }

    /// Stages B and C together.
    fn reduce(&self, used: usize, ceiling: f64) -> Result<Option<StageSolution>, BackendError> {
        match self.stage_b(used, ceiling)? {
            Some(b) => self.stage_c(&b.banks),
            None => Ok(None),
        }
    }

    /// Run all stages. `Ok(None)` means no allocation exists under the cap.
    ///
    /// A timeout during stage A is an error; once stage A has an optimum, a
    /// timeout in B or C returns it.
    pub fn run(&self) -> Result<Option<StagedOutcome>, BackendError> {
        let Some(stage_a) = self.stage_a()? else {
            return Ok(None);
        };
        let stage_a_cost = stage_a.cost;
        let ceiling = self.cost_ceiling(stage_a_cost);

        let reduced = match self.reduce(stage_a.banks.len(), ceiling) {
            Ok(reduced) => reduced,
            Err(BackendError::Timeout(limit)) => {
                log::warn!("time limit {:?} reached after stage A, keeping its optimum", limit);
                None
            }
            Err(e) => return Err(e),
        };

        Ok(Some(match reduced {
            Some(c) if c.banks.len() < stage_a.banks.len() => StagedOutcome {
                solution: c,
                stage: FinalStage::C,
                stage_a_cost,
            },
            _ => StagedOutcome {
                solution: stage_a,
                stage: FinalStage::A,
                stage_a_cost,
            },
        }))
    }
}

/// Per-bank quantity totals of a solution, for logging and reporting.
pub fn bank_quantities(set: &OptionSet, solution: &StageSolution) -> BTreeMap<BankKey, f64> {
    let mut totals = BTreeMap::new();
    for &(c, q) in &solution.quantities {
        *totals.entry(set.options()[c].bank_key.clone()).or_insert(0.0) += q;
    }
    totals
}
