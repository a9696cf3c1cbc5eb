//! Persisted geocode cache
//!
//! Maps `AddressKey` to a resolved coordinate pair or an explicit unresolved
//! marker. Lookups are in-memory; persistence is a JSON document written with
//! temp file + rename, so a crash can lose recent records but never leaves a
//! truncated file behind.
//!
//! File format (unknown fields are ignored on load):
//! ```json
//! {
//!   "version": 1,
//!   "entries": {
//!     "centro, campinas, são paulo, brazil": { "status": "resolved", "lat": -22.9, "lon": -47.06 },
//!     "vila nova, campinas, são paulo, brazil": { "status": "unresolved" }
//!   }
//! }
//! ```
//! Flat legacy files (`{"<address>": [lat, lon] | [null, null]}`) are also
//! accepted and rewritten in the current format on the next flush.
//!
//! Access is confined to one sequential pipeline; concurrent callers would
//! need a lock around lookup + record + flush.

use crate::error::{MapError, MapResult};
use crate::models::{AddressKey, Coordinates, GeocodeEntry};
use crate::services::address_normalizer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use svo_common::fs_utils;
use tracing::{debug, info, warn};

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum EntryStatus {
    Resolved,
    Unresolved,
}

#[derive(Debug, Serialize, Deserialize)]
struct TaggedEntry {
    status: EntryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lon: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PersistedEntry {
    Tagged(TaggedEntry),
    LegacyPair(Option<f64>, Option<f64>),
}

impl PersistedEntry {
    fn into_entry(self) -> Option<GeocodeEntry> {
        match self {
            PersistedEntry::Tagged(TaggedEntry {
                status: EntryStatus::Unresolved,
                ..
            }) => Some(GeocodeEntry::Unresolved),
            PersistedEntry::Tagged(TaggedEntry {
                status: EntryStatus::Resolved,
                lat: Some(lat),
                lon: Some(lon),
            })
            | PersistedEntry::LegacyPair(Some(lat), Some(lon)) => {
                let coordinates = Coordinates::new(lat, lon);
                coordinates
                    .is_valid()
                    .then_some(GeocodeEntry::Resolved(coordinates))
            }
            PersistedEntry::LegacyPair(None, None) => Some(GeocodeEntry::Unresolved),
            _ => None,
        }
    }
}

impl From<&GeocodeEntry> for TaggedEntry {
    fn from(entry: &GeocodeEntry) -> Self {
        match entry {
            GeocodeEntry::Resolved(c) => TaggedEntry {
                status: EntryStatus::Resolved,
                lat: Some(c.latitude),
                lon: Some(c.longitude),
            },
            GeocodeEntry::Unresolved => TaggedEntry {
                status: EntryStatus::Unresolved,
                lat: None,
                lon: None,
            },
        }
    }
}

#[derive(Serialize)]
struct CacheDocument<'a> {
    version: u32,
    entries: BTreeMap<&'a str, TaggedEntry>,
}

/// In-memory geocode cache bound to its backing file
#[derive(Debug)]
pub struct GeocodeCache {
    path: PathBuf,
    entries: HashMap<AddressKey, GeocodeEntry>,
    dirty: bool,
    load_warning: Option<String>,
}

impl GeocodeCache {
    /// Empty cache that will flush to `path`
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: HashMap::new(),
            dirty: false,
            load_warning: None,
        }
    }

    /// Load persisted state from `path`
    ///
    /// Never fails: a missing file gives an empty cache, an unreadable or
    /// malformed file gives an empty cache plus a warning (see
    /// `load_warning`). Individually malformed entries are skipped.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let mut cache = Self::empty(path);

        let content = match std::fs::read_to_string(&cache.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %cache.path.display(), "No geocode cache file, starting empty");
                return cache;
            }
            Err(e) => {
                cache.warn_load(format!("geocode cache unreadable: {}", e));
                return cache;
            }
        };

        if content.trim().is_empty() {
            return cache;
        }

        let document: Value = match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(e) => {
                cache.warn_load(format!("geocode cache is not valid JSON: {}", e));
                return cache;
            }
        };

        let Value::Object(mut root) = document else {
            cache.warn_load("geocode cache root is not a JSON object".to_string());
            return cache;
        };

        let raw_entries = match root.remove("entries") {
            Some(Value::Object(entries)) => entries,
            Some(_) => {
                cache.warn_load("geocode cache 'entries' is not a JSON object".to_string());
                return cache;
            }
            // Legacy flat layout: every top-level member is an entry
            None => root,
        };

        let mut skipped = 0usize;
        for (raw_key, raw_value) in raw_entries {
            let entry = serde_json::from_value::<PersistedEntry>(raw_value)
                .ok()
                .and_then(PersistedEntry::into_entry);

            match (address_normalizer::key_from_stored(&raw_key), entry) {
                (Some(key), Some(entry)) => {
                    cache.apply(key, entry);
                }
                _ => skipped += 1,
            }
        }

        if skipped > 0 {
            cache.warn_load(format!("skipped {} malformed geocode cache entries", skipped));
        }

        info!(
            path = %cache.path.display(),
            entries = cache.entries.len(),
            "Loaded geocode cache"
        );
        cache
    }

    /// Cached entry for `key`; `None` means never attempted
    pub fn lookup(&self, key: &AddressKey) -> Option<GeocodeEntry> {
        self.entries.get(key).copied()
    }

    /// Record a resolution attempt
    ///
    /// A resolved entry replaces anything. An unresolved entry only lands on
    /// an absent or unresolved key, never over a resolved one. Returns
    /// whether the cache changed.
    pub fn record(&mut self, key: AddressKey, entry: GeocodeEntry) -> bool {
        let changed = self.apply(key, entry);
        self.dirty |= changed;
        changed
    }

    fn apply(&mut self, key: AddressKey, entry: GeocodeEntry) -> bool {
        let replace = match self.entries.get(&key) {
            Some(GeocodeEntry::Resolved(_)) if !entry.is_resolved() => false,
            Some(existing) => *existing != entry,
            None => true,
        };

        if replace {
            self.entries.insert(key, entry);
        }
        replace
    }

    /// Persist to the backing file if anything changed since the last flush
    ///
    /// # Errors
    /// `MapError::Cache` if the file cannot be written; the previous file
    /// content is left intact and the cache stays dirty.
    pub fn flush(&mut self) -> MapResult<()> {
        if !self.dirty {
            return Ok(());
        }

        let document = CacheDocument {
            version: FORMAT_VERSION,
            entries: self
                .entries
                .iter()
                .map(|(key, entry)| (key.as_str(), TaggedEntry::from(entry)))
                .collect(),
        };

        let bytes = serde_json::to_vec_pretty(&document)
            .map_err(|e| MapError::Cache(format!("serialize failed: {}", e)))?;

        fs_utils::write_atomic(&self.path, &bytes).map_err(|e| {
            MapError::Cache(format!("write {} failed: {}", self.path.display(), e))
        })?;

        self.dirty = false;
        debug!(
            path = %self.path.display(),
            entries = self.entries.len(),
            "Flushed geocode cache"
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Changes not yet flushed
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recoverable problem found while loading, if any
    pub fn load_warning(&self) -> Option<&str> {
        self.load_warning.as_deref()
    }

    fn warn_load(&mut self, message: String) {
        warn!(path = %self.path.display(), "{}; continuing", message);
        self.load_warning = Some(message);
    }
}
