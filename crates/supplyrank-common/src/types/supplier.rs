//! Supplier identity and directory records
//!
//! Directory records arrive in several shapes: some carry a company name,
//! some only a contact name, some nest the contact under a user account.
//! [`SupplierRecord`] keeps every field optional and resolves the display
//! name and city through fixed fallback chains.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supplier identifier
///
/// Ordered so that ranking ties resolve by ascending id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupplierId(pub u64);

impl fmt::Display for SupplierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SupplierId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// User account nested inside some directory records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupplierUser {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

/// Supplier directory record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierRecord {
    pub id: SupplierId,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub user: Option<SupplierUser>,
}

impl SupplierRecord {
    /// Create a record with only an id
    pub fn new(id: SupplierId) -> Self {
        Self {
            id,
            company_name: None,
            name: None,
            city: None,
            user: None,
        }
    }

    /// Set the company name
    pub fn with_company_name(mut self, name: impl Into<String>) -> Self {
        self.company_name = Some(name.into());
        self
    }

    /// Set the city
    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    /// Display name: company_name, then name, then user.name, then a
    /// placeholder derived from the id. Blank values count as missing.
    pub fn display_name(&self) -> String {
        first_present([
            self.company_name.as_deref(),
            self.name.as_deref(),
            self.user.as_ref().and_then(|u| u.name.as_deref()),
        ])
        .map(str::to_string)
        .unwrap_or_else(|| format!("Unknown Supplier {}", self.id))
    }

    /// City: city, then user.city
    pub fn city(&self) -> Option<&str> {
        first_present([
            self.city.as_deref(),
            self.user.as_ref().and_then(|u| u.city.as_deref()),
        ])
    }

    /// Whether the supplier operates in `city`
    ///
    /// Suppliers with no known city match every filter.
    pub fn serves_city(&self, city: &str) -> bool {
        match self.city() {
            Some(own) => own.trim().eq_ignore_ascii_case(city.trim()),
            None => true,
        }
    }
}

fn first_present<'a, const N: usize>(chain: [Option<&'a str>; N]) -> Option<&'a str> {
    chain
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
}
