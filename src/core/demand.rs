use crate::core::habitat::Ledger;
use serde::{Deserialize, Serialize};

/// One line of the buyer's basket: `units_required` credits of `habitat_name`.
///
/// `habitat_name` is either a habitat catalog key or one of the three
/// reserved Net Gain literals (see [`Ledger::net_gain_literal`]).
///
/// # Examples
///
/// ```
/// use habitat_allocation::core::demand::DemandLine;
/// use habitat_allocation::core::habitat::Ledger;
///
/// let line = DemandLine::net_gain(Ledger::Hedgerow, 0.35);
/// assert_eq!(Ledger::of_net_gain(&line.habitat_name), Some(Ledger::Hedgerow));
/// assert_eq!(line.habitat_name, "Net Gain (Hedgerows)");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandLine {
    pub habitat_name: String,
    pub units_required: f64,
}

impl DemandLine {
    pub fn new(habitat_name: impl Into<String>, units_required: f64) -> Self {
        Self {
            habitat_name: habitat_name.into(),
            units_required,
        }
    }

    /// A synthetic Net Gain uplift line for `ledger`.
    pub fn net_gain(ledger: Ledger, units_required: f64) -> Self {
        Self::new(ledger.net_gain_literal(), units_required)
    }

    /// Finite and non-negative.
    pub fn is_well_formed(&self) -> bool {
        self.units_required.is_finite() && self.units_required >= 0.0
    }
}

/// The buyer's basket of demand lines, in input order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DemandBasket {
    lines: Vec<DemandLine>,
}

impl DemandBasket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, line: DemandLine) {
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[DemandLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of units across all lines.
    pub fn total_units(&self) -> f64 {
        self.lines.iter().map(|l| l.units_required).sum()
    }
}

impl FromIterator<DemandLine> for DemandBasket {
    fn from_iter<T: IntoIterator<Item = DemandLine>>(iter: T) -> Self {
        Self {
            lines: iter.into_iter().collect(),
        }
    }
}
