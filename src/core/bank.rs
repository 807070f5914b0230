use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a habitat bank (a credit supplier).
///
/// # Examples
///
/// ```
/// use habitat_allocation::core::bank::BankKey;
///
/// let a = BankKey::new("WC1P2");
/// let b = BankKey::new("WC1P5");
/// assert_ne!(a, b);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BankKey(String);

impl BankKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BankKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BankKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A supplying bank and the administrative areas it sits in.
///
/// The local planning authority (LPA) and national character area (NCA)
/// names are what the tier classifier compares against the demand site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bank {
    pub bank_key: BankKey,
    #[serde(default)]
    pub lpa_name: String,
    #[serde(default)]
    pub nca_name: String,
    /// Free-text location (postcode or address), informational only.
    #[serde(default)]
    pub location: Option<String>,
}

impl Bank {
    pub fn new(
        bank_key: impl Into<BankKey>,
        lpa_name: impl Into<String>,
        nca_name: impl Into<String>,
    ) -> Self {
        Self {
            bank_key: bank_key.into(),
            lpa_name: lpa_name.into(),
            nca_name: nca_name.into(),
            location: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}
