use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Named distinctiveness band a legality rule is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Band {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
    /// A name the level table does not know. Never tradeable by comparison.
    Unrecognized,
}

impl Band {
    /// Parse a band from a catalog name, tolerating case and spacing
    /// ("Very High", "very high", "V.High").
    pub fn from_name(name: &str) -> Self {
        let key: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "verylow" | "vlow" => Band::VeryLow,
            "low" => Band::Low,
            "medium" => Band::Medium,
            "high" => Band::High,
            "veryhigh" | "vhigh" => Band::VeryHigh,
            _ => Band::Unrecognized,
        }
    }

    /// Low-equivalent bands trade against (almost) anything in their ledger.
    pub fn is_low_equivalent(self) -> bool {
        matches!(self, Band::VeryLow | Band::Low)
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Band::VeryLow => "Very Low",
            Band::Low => "Low",
            Band::Medium => "Medium",
            Band::High => "High",
            Band::VeryHigh => "Very High",
            Band::Unrecognized => "Unrecognized",
        };
        f.write_str(s)
    }
}

/// A resolved distinctiveness: its band plus its ordinal rank.
///
/// `rank` is `None` for names missing from the level table. A missing rank
/// fails every comparison, so unknown habitats are conservatively untradeable
/// except by exact name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Level {
    band: Band,
    rank: Option<i32>,
}

impl Level {
    pub fn new(band: Band, rank: Option<i32>) -> Self {
        Self { band, rank }
    }

    /// The fixed level used for synthetic Net Gain demand lines.
    pub fn net_gain(levels: &DistinctivenessLevels) -> Self {
        levels.level("Low")
    }

    pub fn band(&self) -> Band {
        self.band
    }

    pub fn rank(&self) -> Option<i32> {
        self.rank
    }

    /// True if `self` ranks at or above `other`.
    pub fn at_least(&self, other: &Level) -> bool {
        match (self.rank, other.rank) {
            (Some(a), Some(b)) => a >= b,
            _ => false,
        }
    }

    /// True if `self` ranks strictly above `other`.
    pub fn exceeds(&self, other: &Level) -> bool {
        match (self.rank, other.rank) {
            (Some(a), Some(b)) => a > b,
            _ => false,
        }
    }
}

/// Ordinal table mapping distinctiveness names to ranks.
///
/// # Examples
///
/// ```
/// use habitat_allocation::core::distinctiveness::DistinctivenessLevels;
///
/// let levels = DistinctivenessLevels::default();
/// let high = levels.level("High");
/// let medium = levels.level("medium");
/// assert!(high.exceeds(&medium));
/// assert!(!levels.level("Bogus").at_least(&medium));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "HashMap<String, i32>", into = "HashMap<String, i32>")]
pub struct DistinctivenessLevels {
    ranks: HashMap<String, i32>,
}

impl Default for DistinctivenessLevels {
    fn default() -> Self {
        Self::from_pairs([
            ("Very Low", 0),
            ("Low", 2),
            ("Medium", 4),
            ("High", 6),
            ("Very High", 8),
        ])
    }
}

impl DistinctivenessLevels {
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, i32)>,
        S: AsRef<str>,
    {
        Self {
            ranks: pairs
                .into_iter()
                .map(|(name, rank)| (Self::key(name.as_ref()), rank))
                .collect(),
        }
    }

    fn key(name: &str) -> String {
        name.trim().to_ascii_lowercase()
    }

    /// Resolve a name to a level. Unknown names keep their band (if the band
    /// parses) but carry no rank.
    pub fn level(&self, name: &str) -> Level {
        Level::new(Band::from_name(name), self.ranks.get(&Self::key(name)).copied())
    }
}

impl From<HashMap<String, i32>> for DistinctivenessLevels {
    fn from(ranks: HashMap<String, i32>) -> Self {
        Self::from_pairs(ranks)
    }
}

impl From<DistinctivenessLevels> for HashMap<String, i32> {
    fn from(levels: DistinctivenessLevels) -> Self {
        levels.ranks
    }
}
