//! Entry point: demand basket + snapshot in, allocation out.

use crate::core::demand::DemandBasket;
use crate::core::pricing::ContractSize;
use crate::core::snapshot::{ReferenceSnapshot, TargetSite};
use crate::core::stock::StockId;
use crate::error::{AllocationError, BackendError};
use crate::optimization::greedy::solve_greedy;
use crate::optimization::lp::{default_backend, LpBackend};
use crate::optimization::result::{AllocationResult, AllocationRow, SolverKind};
use crate::optimization::stages::{bank_quantities, StageLimits, StagedOptimizer};
use crate::options::builder::OptionBuilder;
use crate::options::OptionSet;
use std::collections::BTreeMap;
use std::time::Duration;

/// Tunables for one [`Allocator`].
#[derive(Debug, Clone, PartialEq)]
pub struct AllocatorConfig {
    /// Hard cap on distinct supplying banks.
    pub max_banks: usize,
    /// Stage B may spend up to this fraction above stage A's cost...
    pub relative_tolerance: f64,
    /// ...or this many pounds, whichever is tighter.
    pub absolute_tolerance: f64,
    /// Total delivered units are padded up to this floor.
    pub min_delivery: f64,
    pub solve_timeout: Option<Duration>,
    /// Skip the LP and use the greedy heuristic directly.
    pub force_greedy: bool,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            max_banks: 2,
            relative_tolerance: 1e-4,
            absolute_tolerance: 10.0,
            min_delivery: 0.01,
            solve_timeout: Some(Duration::from_secs(30)),
            force_greedy: false,
        }
    }
}

/// Allocates demand baskets against reference snapshots.
///
/// Whether an LP backend exists is decided once, here, rather than per
/// solve: a missing backend sends every run down the greedy path.
pub struct Allocator {
    config: AllocatorConfig,
    backend: Option<Box<dyn LpBackend>>,
}

impl Allocator {
    pub fn new(config: AllocatorConfig) -> Self {
        let backend = default_backend();
        match &backend {
            Some(b) => log::debug!("using LP backend '{}'", b.name()),
            None => log::warn!("no LP backend compiled in; allocations will use greedy"),
        }
        Self { config, backend }
    }

    pub fn with_backend(config: AllocatorConfig, backend: Box<dyn LpBackend>) -> Self {
        Self {
            config,
            backend: Some(backend),
        }
    }

    pub fn without_backend(config: AllocatorConfig) -> Self {
        Self {
            config,
            backend: None,
        }
    }

    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    pub fn backend_name(&self) -> Option<&'static str> {
        self.backend.as_ref().map(|b| b.name())
    }

    /// Build options for `basket` and solve them.
    pub fn allocate(
        &self,
        snapshot: &ReferenceSnapshot,
        target: &TargetSite,
        basket: &DemandBasket,
        contract_size: &ContractSize,
    ) -> Result<AllocationResult, AllocationError> {
        let builder = OptionBuilder::new(snapshot, target, contract_size.clone());
        let set = builder.build(basket)?;
        self.solve(&set, contract_size)
    }

    /// Solve a prebuilt option set.
    pub fn solve(
        &self,
        set: &OptionSet,
        contract_size: &ContractSize,
    ) -> Result<AllocationResult, AllocationError> {
        if set.requirements().is_empty() {
            log::info!("nothing to allocate");
            return Ok(AllocationResult::new(
                Vec::new(),
                contract_size.clone(),
                SolverKind::Empty,
                None,
            ));
        }

        let attempt = if self.config.force_greedy {
            Err("greedy requested".to_string())
        } else {
            self.solve_lp(set).map_err(|e| e.to_string())
        };
        let (picks, solver) = match attempt {
            Ok(Some(solved)) => solved,
            Ok(None) => {
                return Err(AllocationError::SolverInfeasible {
                    max_banks: self.config.max_banks,
                })
            }
            Err(reason) => {
                log::warn!("falling back to greedy: {}", reason);
                let picks = solve_greedy(set, self.config.max_banks)?;
                (picks, SolverKind::Greedy { reason })
            }
        };

        let mut rows = build_rows(set, &picks);
        let padded = pad_to_floor(set, &mut rows, self.config.min_delivery);
        let result = AllocationResult::new(rows, contract_size.clone(), solver, padded);
        log::info!(
            "allocated {} rows from {} bank(s), total £{}",
            result.rows().len(),
            result.bank_count(),
            result.total_cost()
        );
        Ok(result)
    }

    /// Staged LP solve. `Err` means the LP path is unusable and greedy
    /// should take over; `Ok(None)` means the problem itself is infeasible.
    #[allow(clippy::type_complexity)]
    fn solve_lp(
        &self,
        set: &OptionSet,
    ) -> Result<Option<(Vec<(usize, f64)>, SolverKind)>, BackendError> {
        let backend = self.backend.as_deref().ok_or(BackendError::Unavailable)?;
        let limits = StageLimits {
            max_banks: self.config.max_banks,
            relative_tolerance: self.config.relative_tolerance,
            absolute_tolerance: self.config.absolute_tolerance,
            timeout: self.config.solve_timeout,
        };
        let Some(outcome) = StagedOptimizer::new(set, backend, limits).run()? else {
            log::warn!("no allocation within the {}-bank cap", self.config.max_banks);
            return Ok(None);
        };
        log::debug!(
            "stage {:?} chosen (stage A cost {:.2}): {:?}",
            outcome.stage,
            outcome.stage_a_cost,
            bank_quantities(set, &outcome.solution)
        );
        Ok(Some((
            outcome.solution.quantities,
            SolverKind::Lp {
                backend: backend.name().to_string(),
                stage: outcome.stage,
            },
        )))
    }
}

impl Default for Allocator {
    fn default() -> Self {
        Self::new(AllocatorConfig::default())
    }
}

/// Rows in (line, option index) order, one per picked option.
fn build_rows(set: &OptionSet, picks: &[(usize, f64)]) -> Vec<AllocationRow> {
    let mut merged: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for &(index, units) in picks {
        *merged.entry((set.options()[index].line, index)).or_insert(0.0) += units;
    }
    merged
        .into_iter()
        .map(|((line, index), units)| {
            let habitat = set
                .requirement(line)
                .map(|r| r.habitat.as_str())
                .unwrap_or_default();
            AllocationRow::new(&set.options()[index], habitat, units)
        })
        .collect()
}

/// If the total delivered is below `floor`, top up the cheapest row by the
/// shortfall, provided its lots still have room. Returns the padded line.
fn pad_to_floor(set: &OptionSet, rows: &mut [AllocationRow], floor: f64) -> Option<usize> {
    let total: f64 = rows.iter().map(|r| r.units_supplied).sum();
    if rows.is_empty() || total >= floor {
        return None;
    }
    let shortfall = floor - total;

    let mut used: BTreeMap<&StockId, f64> = BTreeMap::new();
    for component in rows.iter().flat_map(|r| &r.components) {
        *used.entry(&component.stock_id).or_insert(0.0) += component.stock_units;
    }

    let cheapest = rows
        .iter()
        .enumerate()
        .min_by(|(i, a), (j, b)| a.unit_price.cmp(&b.unit_price).then(i.cmp(j)))
        .map(|(i, _)| i)?;

    let row = &rows[cheapest];
    let fits = row.components.iter().all(|c| {
        let per_unit = c.stock_units / row.units_supplied.max(f64::MIN_POSITIVE);
        let cap = set.stock_caps().get(&c.stock_id).copied().unwrap_or(0.0);
        let in_use = used.get(&c.stock_id).copied().unwrap_or(0.0);
        in_use + per_unit * shortfall <= cap + 1e-9
    });
    if !fits {
        log::warn!(
            "total delivery {:.4} below floor {} but '{}' has no spare stock",
            total,
            floor,
            row.supply_habitat
        );
        return None;
    }

    let line = row.line;
    let units = row.units_supplied + shortfall;
    log::info!("padding line {} by {:.4} units to reach the delivery floor", line, shortfall);
    rows[cheapest].set_units(units);
    Some(line)
}
