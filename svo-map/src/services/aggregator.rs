//! Temporal-spatial aggregation of located records
//!
//! Two strategies over the same located input:
//! - single snapshot: counts per resolved position
//! - time-indexed: counts per (day, position), then one frame per distinct
//!   day in ascending order (sparse: empty days get no frame)
//!
//! Only located records reach this module, so unresolved addresses never
//! show up as a bucket.

use crate::models::{
    Coordinates, DayLocationBucket, HeatPoint, HeatmapFrame, HeatmapTimeline, LocatedRecord,
    LocationCount, NeighborhoodCount,
};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use svo_common::time;

/// Exact-position grouping key (bit patterns, so equal floats group together)
type PositionKey = (u64, u64);

fn position_key(coordinates: &Coordinates) -> PositionKey {
    (coordinates.latitude.to_bits(), coordinates.longitude.to_bits())
}

/// Count located records per position
///
/// Output is ordered by latitude, then longitude.
pub fn aggregate_snapshot(located: &[LocatedRecord]) -> Vec<LocationCount> {
    let mut groups: HashMap<PositionKey, (Coordinates, usize, BTreeSet<String>)> = HashMap::new();

    for item in located {
        let group = groups
            .entry(position_key(&item.coordinates))
            .or_insert_with(|| (item.coordinates, 0, BTreeSet::new()));
        group.1 += 1;
        if let Some((neighborhood, _)) = item.record.location() {
            group.2.insert(neighborhood.to_string());
        }
    }

    let mut counts: Vec<LocationCount> = groups
        .into_values()
        .map(|(coordinates, count, neighborhoods)| LocationCount {
            coordinates,
            count,
            neighborhoods: neighborhoods.into_iter().collect(),
        })
        .collect();

    counts.sort_by(|a, b| a.coordinates.total_cmp(&b.coordinates));
    counts
}

/// Count located, scheduled records per (day, position)
///
/// Unscheduled records carry no day and are skipped. Output is ordered by
/// day, then position.
pub fn bucket_by_day_location(located: &[LocatedRecord]) -> Vec<DayLocationBucket> {
    let mut counts: HashMap<(NaiveDate, PositionKey), DayLocationBucket> = HashMap::new();

    for item in located {
        let Some(day) = item.record.scheduled_day() else {
            continue;
        };
        counts
            .entry((day, position_key(&item.coordinates)))
            .or_insert(DayLocationBucket {
                day,
                coordinates: item.coordinates,
                count: 0,
            })
            .count += 1;
    }

    let mut buckets: Vec<DayLocationBucket> = counts.into_values().collect();
    buckets.sort_by(|a, b| {
        a.day
            .cmp(&b.day)
            .then_with(|| a.coordinates.total_cmp(&b.coordinates))
    });
    buckets
}

/// Assemble day buckets into ordered frames with `DD/MM/YYYY` labels
pub fn build_timeline(buckets: &[DayLocationBucket]) -> HeatmapTimeline {
    let mut by_day: BTreeMap<NaiveDate, Vec<HeatPoint>> = BTreeMap::new();

    for bucket in buckets {
        by_day.entry(bucket.day).or_default().push(HeatPoint {
            coordinates: bucket.coordinates,
            count: bucket.count,
        });
    }

    HeatmapTimeline {
        frames: by_day
            .into_iter()
            .map(|(day, mut points)| {
                points.sort_by(|a, b| a.coordinates.total_cmp(&b.coordinates));
                HeatmapFrame {
                    day,
                    label: time::day_label(day),
                    points,
                }
            })
            .collect(),
    }
}

/// Located records per neighborhood, sorted by neighborhood name
pub fn neighborhood_summary(located: &[LocatedRecord]) -> Vec<NeighborhoodCount> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();

    for item in located {
        if let Some((neighborhood, _)) = item.record.location() {
            *counts.entry(neighborhood.to_string()).or_insert(0) += 1;
        }
    }

    counts
        .into_iter()
        .map(|(neighborhood, count)| NeighborhoodCount {
            neighborhood,
            count,
        })
        .collect()
}

/// Mean position of the located records; `None` when there are none
pub fn map_center(located: &[LocatedRecord]) -> Option<Coordinates> {
    if located.is_empty() {
        return None;
    }

    let n = located.len() as f64;
    let (lat_sum, lon_sum) = located.iter().fold((0.0, 0.0), |(lat, lon), item| {
        (lat + item.coordinates.latitude, lon + item.coordinates.longitude)
    });

    Some(Coordinates::new(lat_sum / n, lon_sum / n))
}
