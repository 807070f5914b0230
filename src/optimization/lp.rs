//! Linear-program representation and the pluggable solver backend.
//!
//! The optimizer only ever builds small, dense-ish minimisation LPs with
//! non-negative variables. Backends translate [`LinearProgram`] into their
//! own model; the capability check ([`default_backend`]) happens once when
//! an [`Allocator`](crate::optimization::allocator::Allocator) is built.

use crate::error::BackendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Le,
    Eq,
    Ge,
}

/// `Σ coeff·x[var] (relation) rhs`
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub terms: Vec<(usize, f64)>,
    pub relation: Relation,
    pub rhs: f64,
}

/// Minimise `objective · x` subject to `constraints`, `x ≥ 0`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearProgram {
    pub objective: Vec<f64>,
    pub constraints: Vec<Constraint>,
}

impl LinearProgram {
    pub fn new(objective: Vec<f64>) -> Self {
        Self {
            objective,
            constraints: Vec::new(),
        }
    }

    pub fn var_count(&self) -> usize {
        self.objective.len()
    }

    /// Add a constraint. Zero coefficients are dropped; an empty row is
    /// kept so infeasible equalities (`0 = 3`) still surface.
    pub fn add_constraint(&mut self, terms: Vec<(usize, f64)>, relation: Relation, rhs: f64) {
        let terms = terms.into_iter().filter(|(_, c)| *c != 0.0).collect();
        self.constraints.push(Constraint {
            terms,
            relation,
            rhs,
        });
    }

    /// Same program, different objective.
    pub fn with_objective(&self, objective: Vec<f64>) -> Self {
        Self {
            objective,
            constraints: self.constraints.clone(),
        }
    }

    /// Value of `objective · values`.
    pub fn evaluate(objective: &[f64], values: &[f64]) -> f64 {
        objective.iter().zip(values).map(|(c, x)| c * x).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LpOutcome {
    Optimal { objective: f64, values: Vec<f64> },
    Infeasible,
}

/// A linear-programming solver.
pub trait LpBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn solve(&self, program: &LinearProgram) -> Result<LpOutcome, BackendError>;
}

/// The backend compiled into this build, if any.
pub fn default_backend() -> Option<Box<dyn LpBackend>> {
    #[cfg(feature = "lp")]
    {
        Some(Box::new(MinilpBackend))
    }
    #[cfg(not(feature = "lp"))]
    {
        None
    }
}

/// Pure-Rust dual simplex via the `minilp` crate.
#[cfg(feature = "lp")]
#[derive(Debug, Clone, Copy, Default)]
pub struct MinilpBackend;

#[cfg(feature = "lp")]
impl LpBackend for MinilpBackend {
    fn name(&self) -> &'static str {
        "minilp"
    }

    fn solve(&self, program: &LinearProgram) -> Result<LpOutcome, BackendError> {
        use minilp::{ComparisonOp, LinearExpr, OptimizationDirection, Problem};

        let mut problem = Problem::new(OptimizationDirection::Minimize);
        let vars: Vec<minilp::Variable> = program
            .objective
            .iter()
            .map(|&c| problem.add_var(c, (0.0, f64::INFINITY)))
            .collect();

        for constraint in &program.constraints {
            if constraint.terms.is_empty() {
                let satisfied = match constraint.relation {
                    Relation::Le => 0.0 <= constraint.rhs + 1e-9,
                    Relation::Eq => constraint.rhs.abs() <= 1e-9,
                    Relation::Ge => 0.0 >= constraint.rhs - 1e-9,
                };
                if satisfied {
                    continue;
                }
                return Ok(LpOutcome::Infeasible);
            }
            let mut expr = LinearExpr::empty();
            for &(var, coeff) in &constraint.terms {
                expr.add(vars[var], coeff);
            }
            let op = match constraint.relation {
                Relation::Le => ComparisonOp::Le,
                Relation::Eq => ComparisonOp::Eq,
                Relation::Ge => ComparisonOp::Ge,
            };
            problem.add_constraint(expr, op, constraint.rhs);
        }

        match problem.solve() {
            Ok(solution) => Ok(LpOutcome::Optimal {
                objective: solution.objective(),
                values: vars.iter().map(|&v| solution[v]).collect(),
            }),
            Err(minilp::Error::Infeasible) => Ok(LpOutcome::Infeasible),
            Err(e) => Err(BackendError::Failed(e.to_string())),
        }
    }
}
