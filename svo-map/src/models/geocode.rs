//! Geocoding value types

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// WGS84 coordinate pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Both components finite and inside WGS84 bounds
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Total order used to group identical positions
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        self.latitude
            .total_cmp(&other.latitude)
            .then_with(|| self.longitude.total_cmp(&other.longitude))
    }
}

/// Normalized neighborhood + city + region string, the geocode cache join key
///
/// Built through `services::address_normalizer`; the inner text is already
/// lowercased with whitespace collapsed, so equal keys mean the same address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AddressKey(String);

impl AddressKey {
    pub(crate) fn from_normalized(text: String) -> Self {
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AddressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cached outcome of resolving one `AddressKey`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeocodeEntry {
    Resolved(Coordinates),
    /// Lookup was attempted and produced no usable position
    Unresolved,
}

impl GeocodeEntry {
    pub fn is_resolved(&self) -> bool {
        matches!(self, GeocodeEntry::Resolved(_))
    }
}

/// A geocodable location: cache key plus the free-text query sent to the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationQuery {
    pub key: AddressKey,
    /// Whitespace-cleaned, case-preserving `"{neighborhood}, {city}, {region}"`
    pub query: String,
}
