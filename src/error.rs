use crate::core::habitat::Ledger;
use thiserror::Error;

/// Fatal outcomes of one allocation run.
///
/// Every variant aborts the whole basket: callers get either a complete
/// allocation or one of these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AllocationError {
    #[error("demand habitat '{habitat}' is neither in the habitat catalog nor a Net Gain line")]
    UnknownHabitat { habitat: String },

    #[error("demand line '{habitat}' has invalid units {units}")]
    InvalidDemand { habitat: String, units: f64 },

    #[error("no legal, priced supply option for {ledger} demand line '{habitat}'")]
    InfeasibleDemandLine { habitat: String, ledger: Ledger },

    #[error("no allocation satisfies stock capacity and the {max_banks}-bank cap")]
    SolverInfeasible { max_banks: usize },

    #[error("greedy fallback could not cover demand line '{habitat}'")]
    GreedyInfeasible { habitat: String },
}

/// Failures of the LP backend. Recovered by the greedy fallback and never
/// returned to callers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    #[error("no LP backend is available in this build")]
    Unavailable,

    #[error("LP solve exceeded the {0:?} time limit")]
    Timeout(std::time::Duration),

    #[error("LP backend failed: {0}")]
    Failed(String),
}
