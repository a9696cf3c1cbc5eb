//! Pipeline services
//!
//! Leaves first: address normalization, the persisted geocode cache, the
//! provider client and its rate-limited wrapper, the unified geocoder over
//! both, then table reading, record filtering, aggregation and writing.

pub mod address_normalizer;
pub mod aggregator;
pub mod artifact_writer;
pub mod geocode_cache;
pub mod geocoder;
pub mod nominatim_client;
pub mod rate_limited_resolver;
pub mod record_filter;
pub mod table_reader;

pub use artifact_writer::{ArtifactWriter, LeafletRenderer, MapRenderer, SnapshotLayer, TimelineLayer};
pub use geocode_cache::GeocodeCache;
pub use geocoder::{Geocoder, LocateOutcome, LocateStats};
pub use nominatim_client::{GeocodeError, GeocodeProvider, NominatimClient};
pub use rate_limited_resolver::{PacingConfig, RateLimitedResolver};
pub use record_filter::{filter_records, FilterMode, FilterOutcome};
