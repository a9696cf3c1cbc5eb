//! Address normalization: neighborhood + city + region into a stable cache key
//!
//! The key is built from comma-separated segments; each segment is trimmed,
//! has internal whitespace runs collapsed to one space and is lowercased.
//! Empty segments are dropped. Applying the same rules to an already
//! normalized key returns it unchanged, which lets keys read back from the
//! cache file join with freshly computed ones.

use crate::error::{MapError, MapResult};
use crate::models::{AddressKey, LocationQuery};

/// Build the cache key and provider query for one address
///
/// # Errors
/// `MapError::InvalidAddress` when the neighborhood or city is blank.
pub fn normalize(neighborhood: &str, city: &str, region_suffix: &str) -> MapResult<LocationQuery> {
    let neighborhood = collapse_whitespace(neighborhood);
    let city = collapse_whitespace(city);

    if neighborhood.is_empty() {
        return Err(MapError::InvalidAddress(format!(
            "missing neighborhood (city '{}')",
            city
        )));
    }
    if city.is_empty() {
        return Err(MapError::InvalidAddress(format!(
            "missing city (neighborhood '{}')",
            neighborhood
        )));
    }

    let region = collapse_whitespace(region_suffix);
    let query = if region.is_empty() {
        format!("{}, {}", neighborhood, city)
    } else {
        format!("{}, {}, {}", neighborhood, city, region)
    };

    Ok(LocationQuery {
        key: AddressKey::from_normalized(normalize_key_text(&query)),
        query,
    })
}

/// Re-normalize a key read from storage; `None` when nothing is left
pub fn key_from_stored(text: &str) -> Option<AddressKey> {
    let normalized = normalize_key_text(text);
    if normalized.is_empty() {
        None
    } else {
        Some(AddressKey::from_normalized(normalized))
    }
}

fn normalize_key_text(text: &str) -> String {
    text.split(',')
        .map(|segment| collapse_whitespace(segment).to_lowercase())
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
