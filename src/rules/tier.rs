//! Geographic tier classification.
//!
//! A bank is `local` to the demand site if it shares the site's local
//! planning authority (LPA) or national character area (NCA), `adjacent` if
//! it sits in a neighbouring LPA or NCA, and `far` otherwise. Authority names
//! are normalised first because the backends spell them inconsistently
//! ("City of Winchester Council" vs "Winchester").

use crate::core::pricing::Tier;
use crate::core::snapshot::TargetSite;
use std::collections::HashSet;

const NOISE_WORDS: [&str; 5] = ["borough", "district", "county", "unitary", "council"];

/// Normalise an authority name for comparison.
///
/// # Examples
///
/// ```
/// use habitat_allocation::rules::tier::normalize_area_name;
///
/// assert_eq!(normalize_area_name("City of Bristol Council"), "bristol");
/// assert_eq!(normalize_area_name("Brighton & Hove"), "brightonandhove");
/// ```
pub fn normalize_area_name(name: &str) -> String {
    let lowered = name.to_lowercase().replace('&', " and ");
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let mut out = String::with_capacity(lowered.len());
    let mut i = 0;
    while i < words.len() {
        if words[i] == "city" && words.get(i + 1) == Some(&"of") {
            i += 2;
            continue;
        }
        if !NOISE_WORDS.contains(&words[i]) {
            out.push_str(words[i]);
        }
        i += 1;
    }
    out
}

/// Classify one bank against the target.
///
/// Pure and total: empty or missing names never match, so they degrade to
/// [`Tier::Far`].
pub fn tier_for_bank(
    bank_lpa: &str,
    bank_nca: &str,
    target_lpa: &str,
    target_nca: &str,
    lpa_neighbors: &[String],
    nca_neighbors: &[String],
) -> Tier {
    TierClassifier::from_parts(target_lpa, target_nca, lpa_neighbors, nca_neighbors)
        .classify(bank_lpa, bank_nca)
}

/// Target descriptor with every name normalised once, so classifying many
/// banks is a handful of set lookups.
#[derive(Debug, Clone)]
pub struct TierClassifier {
    lpa: String,
    nca: String,
    lpa_neighbors: HashSet<String>,
    nca_neighbors: HashSet<String>,
}

impl TierClassifier {
    pub fn new(target: &TargetSite) -> Self {
        Self::from_parts(
            &target.lpa_name,
            &target.nca_name,
            &target.lpa_neighbors,
            &target.nca_neighbors,
        )
    }

    fn from_parts(
        target_lpa: &str,
        target_nca: &str,
        lpa_neighbors: &[String],
        nca_neighbors: &[String],
    ) -> Self {
        let normalize_set = |names: &[String]| -> HashSet<String> {
            names
                .iter()
                .map(|n| normalize_area_name(n))
                .filter(|n| !n.is_empty())
                .collect()
        };
        Self {
            lpa: normalize_area_name(target_lpa),
            nca: normalize_area_name(target_nca),
            lpa_neighbors: normalize_set(lpa_neighbors),
            nca_neighbors: normalize_set(nca_neighbors),
        }
    }

    pub fn classify(&self, bank_lpa: &str, bank_nca: &str) -> Tier {
        let lpa = normalize_area_name(bank_lpa);
        let nca = normalize_area_name(bank_nca);

        let same = |a: &str, b: &str| !a.is_empty() && a == b;
        if same(&lpa, &self.lpa) || same(&nca, &self.nca) {
            return Tier::Local;
        }
        let neighbour = |n: &str, set: &HashSet<String>| !n.is_empty() && set.contains(n);
        if neighbour(&lpa, &self.lpa_neighbors) || neighbour(&nca, &self.nca_neighbors) {
            return Tier::Adjacent;
        }
        Tier::Far
    }
}
