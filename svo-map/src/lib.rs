//! svo-map library interface
//!
//! Service-order heatmap pipeline: reads order spreadsheets, resolves
//! neighborhood/city pairs to coordinates through a persisted cache and a
//! paced geocoding provider, aggregates per location and per day, and writes
//! Leaflet map documents.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod workflow;

pub use crate::error::{MapError, MapResult};

use crate::config::PipelineSettings;
use crate::services::{
    ArtifactWriter, GeocodeCache, Geocoder, LeafletRenderer, NominatimClient, PacingConfig,
    RateLimitedResolver,
};
use crate::workflow::BatchOrchestrator;

/// Orchestrator wired to Nominatim and the Leaflet renderer
pub type DefaultOrchestrator = BatchOrchestrator<NominatimClient, LeafletRenderer>;

/// Build the production orchestrator from resolved settings
///
/// Loads the geocode cache (never fatal) and builds the HTTP client.
pub fn build_orchestrator(settings: &PipelineSettings) -> MapResult<DefaultOrchestrator> {
    let client = NominatimClient::new(&settings.geocoding)
        .map_err(|e| MapError::Common(svo_common::Error::Internal(e.to_string())))?;

    let resolver = RateLimitedResolver::new(client, PacingConfig::from(&settings.geocoding));
    let geocoder = Geocoder::new(
        GeocodeCache::load(&settings.cache_path),
        resolver,
        settings.geocoding.region_suffix.clone(),
    )
    .with_retry_unresolved(settings.geocoding.retry_unresolved);

    let writer = ArtifactWriter::new(LeafletRenderer::new()?, &settings.maps_dir);

    Ok(BatchOrchestrator::new(geocoder, writer, settings.batch.clone()))
}
