//! Shared fixtures for svo-map integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use svo_map::config::BatchSettings;
use svo_map::models::Coordinates;
use svo_map::services::{
    ArtifactWriter, GeocodeCache, GeocodeError, GeocodeProvider, Geocoder, LeafletRenderer,
    PacingConfig, RateLimitedResolver,
};
use svo_map::workflow::{BatchItem, BatchOrchestrator, BatchRequest};

pub const HEADER: &str = "SVO,Agendado para,Bairro Consumidor,Cidade Consumidor,Status da OS";

/// In-memory geocoder keyed by lowercase neighborhood
///
/// Queries for a city listed in `failing_cities` fail with a network error;
/// unknown neighborhoods are "not found".
#[derive(Default)]
pub struct FakeProvider {
    known: HashMap<String, Coordinates>,
    failing_cities: Vec<String>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
            .with("Centro", -22.9056, -47.0608)
            .with("Cambuí", -22.8936, -47.0497)
            .with("Taquaral", -22.8720, -47.0580)
    }

    pub fn with(mut self, neighborhood: &str, lat: f64, lon: f64) -> Self {
        self.known
            .insert(neighborhood.to_lowercase(), Coordinates::new(lat, lon));
        self
    }

    pub fn failing_city(mut self, city: &str) -> Self {
        self.failing_cities.push(city.to_lowercase());
        self
    }
}

#[async_trait]
impl GeocodeProvider for FakeProvider {
    async fn geocode(&self, query: &str) -> Result<Option<Coordinates>, GeocodeError> {
        let mut parts = query.split(',').map(|p| p.trim().to_lowercase());
        let neighborhood = parts.next().unwrap_or_default();
        let city = parts.next().unwrap_or_default();

        if self.failing_cities.contains(&city) {
            return Err(GeocodeError::Network("connection reset".to_string()));
        }
        Ok(self.known.get(&neighborhood).copied())
    }
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn generated_at() -> NaiveDateTime {
    day(2025, 3, 7).and_hms_opt(9, 30, 0).unwrap()
}

/// Write a CSV input with the standard headers
///
/// Each row: `(order id, scheduled for, neighborhood, city)`.
pub fn write_csv(dir: &Path, name: &str, rows: &[(&str, &str, &str, &str)]) -> PathBuf {
    let mut content = String::from(HEADER);
    content.push('\n');
    for (id, scheduled, neighborhood, city) in rows {
        content.push_str(&format!("{},{},{},{},Aberta\n", id, scheduled, neighborhood, city));
    }

    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

pub fn settings() -> BatchSettings {
    BatchSettings {
        city_delay: Duration::ZERO,
        ..BatchSettings::default()
    }
}

/// Orchestrator over `FakeProvider`, unpaced, writing under `root`
pub fn orchestrator(root: &Path, provider: FakeProvider) -> BatchOrchestrator<FakeProvider, LeafletRenderer> {
    paced_orchestrator(root, provider, Duration::ZERO)
}

/// Same as `orchestrator`, waiting `city_delay` between city contexts
pub fn paced_orchestrator(
    root: &Path,
    provider: FakeProvider,
    city_delay: Duration,
) -> BatchOrchestrator<FakeProvider, LeafletRenderer> {
    let geocoder = Geocoder::new(
        GeocodeCache::load(root.join("location_cache.json")),
        RateLimitedResolver::new(provider, PacingConfig::unpaced()),
        "São Paulo, Brazil",
    );
    let writer = ArtifactWriter::new(LeafletRenderer::new().unwrap(), root.join("maps"));
    let settings = BatchSettings {
        city_delay,
        ..settings()
    };
    BatchOrchestrator::new(geocoder, writer, settings)
}

pub fn request(items: Vec<BatchItem>, date: Option<NaiveDate>) -> BatchRequest {
    BatchRequest {
        items,
        date_context: date.map_or(svo_map::models::DateContext::Unscheduled, svo_map::models::DateContext::Day),
        today: generated_at().date(),
        generated_at: generated_at(),
        rolling: true,
    }
}
