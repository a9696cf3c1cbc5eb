//! Batch orchestration over (input file, city context) items
//!
//! # Stages
//! - **Load**: read every input once; a failing file is reported and left out
//! - **Snapshot**: per file, filter to the requested date context, locate,
//!   aggregate per position and write the single-day map
//! - **Index**: combined `mmaps.html` over the snapshot maps, if any
//! - **Rolling**: per file, filter to the upcoming window, locate, build the
//!   day-indexed timeline and write the animated map
//!
//! # Error Handling
//! - Per-item isolation: one file or city failing never stops its siblings
//! - Stages with nothing to render are recorded as skipped, not failed
//! - Only a batch in which no input loads at all returns an error
//!
//! The geocode cache is flushed after every locate step, so a crash loses at
//! most the current item's lookups.
//!
//! # Pacing
//! Before a stage sends addresses to the resolver, the orchestrator waits
//! `city_delay` if the previous stage that reached the resolver belonged to a
//! different city context. Stages answered entirely from the cache, and
//! consecutive stages of one city, do not wait.

use crate::config::BatchSettings;
use crate::error::{MapError, MapResult};
use crate::models::artifact::rolling_label;
use crate::models::{
    BatchResult, DateContext, ItemFailure, MapArtifact, ServiceRecord, SkippedStage, Stage,
};
use crate::services::aggregator;
use crate::services::artifact_writer::{
    ArtifactWriter, MapRenderer, OrderMarker, SnapshotLayer, TimelineLayer,
};
use crate::services::geocoder::Geocoder;
use crate::services::nominatim_client::GeocodeProvider;
use crate::services::record_filter::{filter_records, FilterMode};
use crate::services::table_reader;
use chrono::{NaiveDate, NaiveDateTime};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One input file, optionally with an explicit city context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub source: PathBuf,
    /// `None`: use the first city found in the file
    pub city: Option<String>,
}

impl BatchItem {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            city: None,
        }
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }
}

/// Pair input files with city names given on the command line
///
/// Item `i` takes city `i` (if given) and file `i`, reusing the last file
/// when there are more cities than files.
pub fn pair_items(inputs: &[PathBuf], cities: &[String]) -> Vec<BatchItem> {
    let Some(last) = inputs.len().checked_sub(1) else {
        return Vec::new();
    };

    (0..inputs.len().max(cities.len()))
        .map(|i| BatchItem {
            source: inputs[i.min(last)].clone(),
            city: cities.get(i).cloned(),
        })
        .collect()
}

/// What to produce for a batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequest {
    pub items: Vec<BatchItem>,
    /// Date context of the snapshot stage
    pub date_context: DateContext,
    /// First day of the rolling window
    pub today: NaiveDate,
    /// Stamped into rolling map file names
    pub generated_at: NaiveDateTime,
    /// Run the rolling stage
    pub rolling: bool,
}

impl BatchRequest {
    pub fn new(items: Vec<BatchItem>, date_context: DateContext) -> Self {
        let generated_at = svo_common::time::now();
        Self {
            items,
            date_context,
            today: generated_at.date(),
            generated_at,
            rolling: true,
        }
    }
}

/// An input that loaded, with its resolved city context
struct LoadedInput {
    source: PathBuf,
    city: String,
    records: Vec<ServiceRecord>,
}

/// Drives geocoding, aggregation and writing across a batch
pub struct BatchOrchestrator<P, R> {
    geocoder: Geocoder<P>,
    writer: ArtifactWriter<R>,
    settings: BatchSettings,
    /// City context of the last stage that reached the resolver
    last_lookup_city: Option<String>,
    city_pauses: usize,
}

impl<P: GeocodeProvider, R: MapRenderer> BatchOrchestrator<P, R> {
    pub fn new(geocoder: Geocoder<P>, writer: ArtifactWriter<R>, settings: BatchSettings) -> Self {
        Self {
            geocoder,
            writer,
            settings,
            last_lookup_city: None,
            city_pauses: 0,
        }
    }

    pub fn geocoder(&self) -> &Geocoder<P> {
        &self.geocoder
    }

    /// Pauses taken between city contexts so far
    pub fn city_pauses(&self) -> usize {
        self.city_pauses
    }

    /// Run every stage of the batch
    ///
    /// # Errors
    /// `MapError::NoUsableInput` when no input could be loaded. Everything
    /// else is reported inside the `BatchResult`.
    pub async fn run(&mut self, request: &BatchRequest) -> MapResult<BatchResult> {
        info!(
            items = request.items.len(),
            date_context = %request.date_context.display_label(),
            rolling = request.rolling,
            "Starting batch"
        );

        let mut result = BatchResult::default();
        let inputs = self.load_inputs(&request.items, &mut result);

        if inputs.is_empty() {
            let detail = result
                .failures
                .iter()
                .map(|f| format!("{}: {}", f.source.display(), f.error_message))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(MapError::NoUsableInput(if detail.is_empty() {
                "no input files given".to_string()
            } else {
                detail
            }));
        }

        // Snapshot stage, then index
        let mut snapshot_maps = Vec::new();
        for input in &inputs {
            match self.snapshot_stage(input, request.date_context).await {
                Ok(Some(artifact)) => snapshot_maps.push(artifact),
                Ok(None) => result.skipped.push(SkippedStage {
                    source: input.source.clone(),
                    stage: Stage::Snapshot,
                    reason: format!(
                        "no located orders for {}",
                        request.date_context.display_label()
                    ),
                }),
                Err(e) => record_failure(&mut result, &input.source, Stage::Snapshot, &e),
            }
        }

        result.artifacts.extend(snapshot_maps.iter().cloned());

        if self.settings.write_index && !snapshot_maps.is_empty() {
            match self.writer.write_index(&snapshot_maps) {
                Ok(artifact) => result.artifacts.push(artifact),
                Err(e) => {
                    let dir = self.writer.maps_dir().to_path_buf();
                    record_failure(&mut result, &dir, Stage::Index, &e);
                }
            }
        }

        // Rolling stage
        if request.rolling {
            for input in &inputs {
                match self.rolling_stage(input, request).await {
                    Ok(Some(artifact)) => result.artifacts.push(artifact),
                    Ok(None) => result.skipped.push(SkippedStage {
                        source: input.source.clone(),
                        stage: Stage::Rolling,
                        reason: format!(
                            "no located orders in the next {} days",
                            self.settings.rolling_window_days
                        ),
                    }),
                    Err(e) => record_failure(&mut result, &input.source, Stage::Rolling, &e),
                }
            }
        }

        info!(
            artifacts = result.artifacts.len(),
            failures = result.failures.len(),
            skipped = result.skipped.len(),
            "Batch complete"
        );
        Ok(result)
    }

    fn load_inputs(&self, items: &[BatchItem], result: &mut BatchResult) -> Vec<LoadedInput> {
        let mut inputs = Vec::with_capacity(items.len());

        for item in items {
            let loaded = table_reader::load_records(&item.source, &self.settings.columns)
                .and_then(|records| {
                    let city = item
                        .city
                        .as_deref()
                        .map(str::trim)
                        .filter(|c| !c.is_empty())
                        .map(String::from)
                        .or_else(|| table_reader::first_city(&records))
                        .ok_or_else(|| MapError::NoCityContext(item.source.clone()))?;
                    Ok(LoadedInput {
                        source: item.source.clone(),
                        city,
                        records,
                    })
                });

            match loaded {
                Ok(input) => {
                    debug!(
                        source = %input.source.display(),
                        city = %input.city,
                        records = input.records.len(),
                        "Loaded input"
                    );
                    inputs.push(input);
                }
                Err(e) => record_failure(result, &item.source, Stage::Load, &e),
            }
        }

        inputs
    }

    async fn snapshot_stage(
        &mut self,
        input: &LoadedInput,
        date_context: DateContext,
    ) -> MapResult<Option<MapArtifact>> {
        let filtered = filter_records(&input.records, FilterMode::from(date_context));
        if filtered.is_empty() {
            info!(city = %input.city, "No orders for date context, skipping snapshot");
            return Ok(None);
        }

        self.pace_city(&input.city, &filtered.records).await;
        let located = self.geocoder.locate(&filtered.records).await.located;
        self.flush_cache();

        let Some(center) = aggregator::map_center(&located) else {
            return Ok(None);
        };

        let layer = SnapshotLayer {
            title: SnapshotLayer::title_for(&input.city, &date_context),
            center,
            zoom: self.settings.zoom,
            locations: aggregator::aggregate_snapshot(&located),
        };

        self.writer
            .write_snapshot(&input.city, &date_context, &layer)
            .map(Some)
    }

    async fn rolling_stage(
        &mut self,
        input: &LoadedInput,
        request: &BatchRequest,
    ) -> MapResult<Option<MapArtifact>> {
        let mode = FilterMode::RollingWindow {
            today: request.today,
            days: self.settings.rolling_window_days,
        };
        let filtered = filter_records(&input.records, mode);
        if filtered.is_empty() {
            return Ok(None);
        }

        self.pace_city(&input.city, &filtered.records).await;
        let located = self.geocoder.locate(&filtered.records).await.located;
        self.flush_cache();

        let Some(center) = aggregator::map_center(&located) else {
            return Ok(None);
        };

        // File name carries the raw city of the first surviving row
        let file_city =
            table_reader::first_city(&filtered.records).unwrap_or_else(|| input.city.clone());
        let window_end = mode.window_end().unwrap_or(request.today);

        let layer = TimelineLayer {
            title: TimelineLayer::title_for(&input.city, request.today, window_end),
            center,
            zoom: self.settings.zoom,
            timeline: aggregator::build_timeline(&aggregator::bucket_by_day_location(&located)),
            orders: located.iter().map(OrderMarker::from).collect(),
            summary: aggregator::neighborhood_summary(&located),
        };

        self.writer
            .write_timeline(
                &file_city,
                rolling_label(&input.city, self.settings.rolling_window_days),
                request.generated_at,
                &layer,
            )
            .map(Some)
    }

    /// Wait between city contexts, on top of the resolver's per-call pacing
    async fn pace_city(&mut self, city: &str, records: &[ServiceRecord]) {
        if !self.geocoder.needs_lookup(records) {
            return;
        }

        let switching = self
            .last_lookup_city
            .as_deref()
            .is_some_and(|previous| previous != city);
        if switching && !self.settings.city_delay.is_zero() {
            debug!(
                city = %city,
                delay_ms = self.settings.city_delay.as_millis() as u64,
                "Pausing between cities"
            );
            tokio::time::sleep(self.settings.city_delay).await;
            self.city_pauses += 1;
        }
        self.last_lookup_city = Some(city.to_string());
    }

    fn flush_cache(&mut self) {
        if let Err(e) = self.geocoder.flush() {
            warn!(error = %e, "Geocode cache not persisted; lookups will be repeated next run");
        }
    }
}

fn record_failure(result: &mut BatchResult, source: &Path, stage: Stage, error: &MapError) {
    warn!(
        source = %source.display(),
        stage = ?stage,
        code = error.code(),
        error = %error,
        "Batch item failed"
    );
    result.failures.push(ItemFailure {
        source: source.to_path_buf(),
        stage,
        error_code: error.code().to_string(),
        error_message: error.to_string(),
    });
}
