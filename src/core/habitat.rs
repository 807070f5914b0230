use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Reserved demand habitat for the area Net Gain uplift.
pub const NET_GAIN_AREA: &str = "Net Gain (Low-equivalent)";
/// Reserved demand habitat for the hedgerow Net Gain uplift.
pub const NET_GAIN_HEDGEROWS: &str = "Net Gain (Hedgerows)";
/// Reserved demand habitat for the watercourse Net Gain uplift.
pub const NET_GAIN_WATERCOURSES: &str = "Net Gain (Watercourses)";

/// One of the three mutually-exclusive credit ledgers.
///
/// Credits never cross ledgers: an area deficit is never met by hedgerow
/// stock and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ledger {
    Area,
    Hedgerow,
    Watercourse,
}

impl Ledger {
    pub const ALL: [Ledger; 3] = [Ledger::Area, Ledger::Hedgerow, Ledger::Watercourse];

    /// Classify a catalog ledger tag ("Area", "Hedgerow", "Watercourse",
    /// "Watercourses" ...). Anything not hedgerow or watercourse is area.
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.to_ascii_lowercase();
        if tag.contains("hedge") {
            Ledger::Hedgerow
        } else if tag.contains("water") {
            Ledger::Watercourse
        } else {
            Ledger::Area
        }
    }

    /// The reserved Net Gain literal that belongs to this ledger.
    pub fn net_gain_literal(self) -> &'static str {
        match self {
            Ledger::Area => NET_GAIN_AREA,
            Ledger::Hedgerow => NET_GAIN_HEDGEROWS,
            Ledger::Watercourse => NET_GAIN_WATERCOURSES,
        }
    }

    /// If `habitat` is one of the Net Gain literals, its ledger.
    pub fn of_net_gain(habitat: &str) -> Option<Ledger> {
        Ledger::ALL
            .into_iter()
            .find(|l| l.net_gain_literal().eq_ignore_ascii_case(habitat.trim()))
    }
}

impl fmt::Display for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Ledger::Area => "area",
            Ledger::Hedgerow => "hedgerow",
            Ledger::Watercourse => "watercourse",
        };
        f.write_str(s)
    }
}

/// A habitat catalog row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitatEntry {
    pub habitat_name: String,
    #[serde(default)]
    pub broad_group: String,
    pub distinctiveness: String,
    /// Raw ledger tag as it appears in the catalog.
    pub ledger_tag: String,
}

impl HabitatEntry {
    pub fn new(
        habitat_name: impl Into<String>,
        broad_group: impl Into<String>,
        distinctiveness: impl Into<String>,
        ledger: Ledger,
    ) -> Self {
        Self {
            habitat_name: habitat_name.into(),
            broad_group: broad_group.into(),
            distinctiveness: distinctiveness.into(),
            ledger_tag: ledger.to_string(),
        }
    }

    pub fn ledger(&self) -> Ledger {
        Ledger::from_tag(&self.ledger_tag)
    }
}

/// Habitat catalog indexed by exact habitat name.
#[derive(Debug, Clone, Default)]
pub struct HabitatCatalog {
    entries: HashMap<String, HabitatEntry>,
}

impl HabitatCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: HabitatEntry) {
        self.entries.insert(entry.habitat_name.clone(), entry);
    }

    pub fn get(&self, habitat: &str) -> Option<&HabitatEntry> {
        self.entries.get(habitat)
    }

    /// Ledger of a catalog habitat or a Net Gain literal.
    pub fn ledger_of(&self, habitat: &str) -> Option<Ledger> {
        Ledger::of_net_gain(habitat).or_else(|| self.get(habitat).map(HabitatEntry::ledger))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<HabitatEntry> for HabitatCatalog {
    fn from_iter<T: IntoIterator<Item = HabitatEntry>>(iter: T) -> Self {
        let mut catalog = Self::new();
        for entry in iter {
            catalog.insert(entry);
        }
        catalog
    }
}
