//! Aggregated heat layer data handed to the renderer

use super::Coordinates;
use chrono::NaiveDate;
use serde::ser::{Serialize, SerializeTuple, Serializer};

/// One weighted heat point
///
/// Serializes as `[latitude, longitude, count]`, the triple shape heat
/// layers consume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatPoint {
    pub coordinates: Coordinates,
    pub count: usize,
}

impl Serialize for HeatPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut triple = serializer.serialize_tuple(3)?;
        triple.serialize_element(&self.coordinates.latitude)?;
        triple.serialize_element(&self.coordinates.longitude)?;
        triple.serialize_element(&self.count)?;
        triple.end()
    }
}

/// Single-snapshot count for one resolved location
#[derive(Debug, Clone, PartialEq)]
pub struct LocationCount {
    pub coordinates: Coordinates,
    pub count: usize,
    /// Neighborhood names that resolved to this position, sorted
    pub neighborhoods: Vec<String>,
}

impl LocationCount {
    pub fn heat_point(&self) -> HeatPoint {
        HeatPoint {
            coordinates: self.coordinates,
            count: self.count,
        }
    }

    /// Marker tooltip, e.g. `Centro: 3 O.S.`
    pub fn tooltip(&self) -> String {
        format!("{}: {} O.S.", self.neighborhoods.join(" / "), self.count)
    }
}

/// `(day, latitude, longitude) -> count`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayLocationBucket {
    pub day: NaiveDate,
    pub coordinates: Coordinates,
    pub count: usize,
}

/// One day of the animated heat layer
#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapFrame {
    pub day: NaiveDate,
    /// `DD/MM/YYYY`
    pub label: String,
    pub points: Vec<HeatPoint>,
}

/// Day-ordered frame sequence (sparse: days without records have no frame)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeatmapTimeline {
    pub frames: Vec<HeatmapFrame>,
}

impl HeatmapTimeline {
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Ordered day labels, index-aligned with `frame_data`
    pub fn labels(&self) -> Vec<&str> {
        self.frames.iter().map(|f| f.label.as_str()).collect()
    }

    /// Ordered per-day point lists
    pub fn frame_data(&self) -> Vec<&[HeatPoint]> {
        self.frames.iter().map(|f| f.points.as_slice()).collect()
    }
}

/// Located orders per neighborhood over a period
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct NeighborhoodCount {
    pub neighborhood: String,
    pub count: usize,
}
