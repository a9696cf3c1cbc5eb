//! Cache-then-resolver location lookup shared by both map variants
//!
//! Each unique address of a record set is looked up once: a cache hit
//! answers directly, a miss goes to the rate-limited resolver and the outcome
//! (resolved or unresolved) is recorded in the cache. Records whose address
//! ends up unresolved are left out of the located set.

use crate::error::MapResult;
use crate::models::{AddressKey, Coordinates, GeocodeEntry, LocatedRecord, ServiceRecord};
use crate::services::address_normalizer;
use crate::services::geocode_cache::GeocodeCache;
use crate::services::nominatim_client::GeocodeProvider;
use crate::services::rate_limited_resolver::RateLimitedResolver;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Counters for one `locate` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocateStats {
    /// Distinct addresses in the input
    pub unique_addresses: usize,
    pub cache_hits: usize,
    /// Addresses sent to the resolver
    pub lookups: usize,
    /// Distinct addresses with no usable position
    pub unresolved: usize,
    /// Records left out because their address is unresolved
    pub excluded_records: usize,
}

/// Located records plus counters
#[derive(Debug, Clone, Default)]
pub struct LocateOutcome {
    pub located: Vec<LocatedRecord>,
    pub stats: LocateStats,
}

/// Unified geocode cache + resolver
pub struct Geocoder<P> {
    cache: GeocodeCache,
    resolver: RateLimitedResolver<P>,
    region_suffix: String,
    retry_unresolved: bool,
}

impl<P: GeocodeProvider> Geocoder<P> {
    pub fn new(
        cache: GeocodeCache,
        resolver: RateLimitedResolver<P>,
        region_suffix: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            resolver,
            region_suffix: region_suffix.into(),
            retry_unresolved: false,
        }
    }

    /// Re-attempt addresses cached as unresolved
    pub fn with_retry_unresolved(mut self, retry: bool) -> Self {
        self.retry_unresolved = retry;
        self
    }

    /// Resolve every record's address, returning the located ones in input order
    ///
    /// Records without neighborhood or city are skipped; provider failures
    /// are cached as unresolved and never returned as errors.
    pub async fn locate(&mut self, records: &[ServiceRecord]) -> LocateOutcome {
        let mut stats = LocateStats::default();
        let mut positions: HashMap<AddressKey, Option<Coordinates>> = HashMap::new();
        let mut record_keys = Vec::with_capacity(records.len());

        for record in records {
            let Some((neighborhood, city)) = record.location() else {
                record_keys.push(None);
                continue;
            };

            let location = match address_normalizer::normalize(neighborhood, city, &self.region_suffix)
            {
                Ok(location) => location,
                Err(e) => {
                    warn!(order_id = %record.order_id, error = %e, "Skipping record");
                    record_keys.push(None);
                    continue;
                }
            };

            if !positions.contains_key(&location.key) {
                stats.unique_addresses += 1;
                let position = self.resolve_one(&location.key, &location.query, &mut stats).await;
                if position.is_none() {
                    stats.unresolved += 1;
                }
                positions.insert(location.key.clone(), position);
            }

            record_keys.push(Some(location.key));
        }

        let mut located = Vec::with_capacity(records.len());
        for (record, key) in records.iter().zip(record_keys) {
            match key.and_then(|k| positions.get(&k).copied().flatten()) {
                Some(coordinates) => located.push(LocatedRecord {
                    record: record.clone(),
                    coordinates,
                }),
                None => stats.excluded_records += 1,
            }
        }

        info!(
            records = records.len(),
            located = located.len(),
            unique_addresses = stats.unique_addresses,
            cache_hits = stats.cache_hits,
            lookups = stats.lookups,
            unresolved = stats.unresolved,
            "Located records"
        );

        LocateOutcome { located, stats }
    }

    /// Whether `locate` would send any of these records to the resolver
    pub fn needs_lookup(&self, records: &[ServiceRecord]) -> bool {
        records
            .iter()
            .filter_map(ServiceRecord::location)
            .filter_map(|(neighborhood, city)| {
                address_normalizer::normalize(neighborhood, city, &self.region_suffix).ok()
            })
            .any(|location| self.is_miss(&location.key))
    }

    fn is_miss(&self, key: &AddressKey) -> bool {
        match self.cache.lookup(key) {
            Some(GeocodeEntry::Resolved(_)) => false,
            Some(GeocodeEntry::Unresolved) => self.retry_unresolved,
            None => true,
        }
    }

    async fn resolve_one(
        &mut self,
        key: &AddressKey,
        query: &str,
        stats: &mut LocateStats,
    ) -> Option<Coordinates> {
        match self.cache.lookup(key) {
            Some(GeocodeEntry::Resolved(coordinates)) => {
                stats.cache_hits += 1;
                return Some(coordinates);
            }
            Some(GeocodeEntry::Unresolved) if !self.retry_unresolved => {
                stats.cache_hits += 1;
                debug!(key = %key, "Cached as unresolved");
                return None;
            }
            _ => {}
        }

        stats.lookups += 1;
        let position = self.resolver.resolve(query).await;
        let entry = position.map_or(GeocodeEntry::Unresolved, GeocodeEntry::Resolved);
        self.cache.record(key.clone(), entry);
        position
    }

    /// Persist cache changes made since the last flush
    pub fn flush(&mut self) -> MapResult<()> {
        self.cache.flush()
    }

    pub fn cache(&self) -> &GeocodeCache {
        &self.cache
    }

    pub fn resolver(&self) -> &RateLimitedResolver<P> {
        &self.resolver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::nominatim_client::GeocodeError;
    use crate::services::rate_limited_resolver::PacingConfig;
    use async_trait::async_trait;
    use tempfile::TempDir;

    /// Resolves any query containing a known neighborhood; fails on the rest
    struct MapProvider {
        known: Vec<(&'static str, Coordinates)>,
    }

    #[async_trait]
    impl GeocodeProvider for MapProvider {
        async fn geocode(&self, query: &str) -> Result<Option<Coordinates>, GeocodeError> {
            for (name, coordinates) in &self.known {
                if query.starts_with(name) {
                    return Ok(Some(*coordinates));
                }
            }
            Err(GeocodeError::Api(400, "unknown".to_string()))
        }
    }

    const CENTRO: Coordinates = Coordinates {
        latitude: -22.905,
        longitude: -47.06,
    };

    fn geocoder(dir: &TempDir) -> Geocoder<MapProvider> {
        let provider = MapProvider {
            known: vec![("Centro", CENTRO)],
        };
        Geocoder::new(
            GeocodeCache::load(dir.path().join("cache.json")),
            RateLimitedResolver::new(provider, PacingConfig::unpaced()),
            "São Paulo, Brazil",
        )
    }

    fn record(id: &str, neighborhood: &str) -> ServiceRecord {
        ServiceRecord {
            order_id: id.to_string(),
            scheduled_for: None,
            neighborhood: Some(neighborhood.to_string()),
            city: Some("Campinas".to_string()),
            status: None,
        }
    }

    #[tokio::test]
    async fn test_each_unique_address_is_resolved_once() {
        let dir = TempDir::new().unwrap();
        let mut geocoder = geocoder(&dir);
        let records = vec![record("1", "Centro"), record("2", " centro "), record("3", "Centro")];

        let outcome = geocoder.locate(&records).await;

        assert_eq!(outcome.located.len(), 3);
        assert_eq!(outcome.stats.unique_addresses, 1);
        assert_eq!(geocoder.resolver().provider_calls(), 1);
    }

    #[tokio::test]
    async fn test_unresolved_records_are_excluded() {
        let dir = TempDir::new().unwrap();
        let mut geocoder = geocoder(&dir);
        let records = vec![record("1", "Centro"), record("2", "Nowhere")];

        let outcome = geocoder.locate(&records).await;

        assert_eq!(outcome.located.len(), 1);
        assert_eq!(outcome.located[0].record.order_id, "1");
        assert_eq!(outcome.stats.unresolved, 1);
        assert_eq!(outcome.stats.excluded_records, 1);
    }

    #[tokio::test]
    async fn test_second_run_makes_no_provider_calls() {
        let dir = TempDir::new().unwrap();
        let records = vec![record("1", "Centro"), record("2", "Nowhere")];

        let mut first = geocoder(&dir);
        first.locate(&records).await;
        first.flush().unwrap();
        assert_eq!(first.resolver().provider_calls(), 2);

        let mut second = geocoder(&dir);
        let outcome = second.locate(&records).await;

        assert_eq!(second.resolver().provider_calls(), 0);
        assert_eq!(outcome.stats.cache_hits, 2);
        assert_eq!(outcome.located.len(), 1);
    }

    #[tokio::test]
    async fn test_needs_lookup_follows_cache_state() {
        let dir = TempDir::new().unwrap();
        let mut geocoder = geocoder(&dir);
        let known = vec![record("1", "Centro")];
        let unknown = vec![record("2", "Nowhere")];

        assert!(geocoder.needs_lookup(&known));
        geocoder.locate(&known).await;
        geocoder.locate(&unknown).await;

        assert!(!geocoder.needs_lookup(&known));
        assert!(!geocoder.needs_lookup(&unknown));
        assert!(!geocoder.needs_lookup(&[]));

        let geocoder = geocoder.with_retry_unresolved(true);
        assert!(geocoder.needs_lookup(&unknown));
    }

    #[tokio::test]
    async fn test_retry_unresolved_requeries_failed_keys() {
        let dir = TempDir::new().unwrap();
        let records = vec![record("1", "Nowhere")];

        let mut first = geocoder(&dir);
        first.locate(&records).await;
        first.flush().unwrap();

        let mut second = geocoder(&dir).with_retry_unresolved(true);
        second.locate(&records).await;

        assert_eq!(second.resolver().provider_calls(), 1);
    }
}
