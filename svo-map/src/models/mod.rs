//! Data models for the service-order heatmap pipeline
//!
//! Records come in from spreadsheets, get joined against geocode results and
//! leave as day/location counts ready for rendering.

pub mod artifact;
pub mod batch_result;
pub mod geocode;
pub mod heatmap;
pub mod service_record;

pub use artifact::{DateContext, MapArtifact};
pub use batch_result::{BatchResult, ItemFailure, SkippedStage, Stage};
pub use geocode::{AddressKey, Coordinates, GeocodeEntry, LocationQuery};
pub use heatmap::{
    DayLocationBucket, HeatPoint, HeatmapFrame, HeatmapTimeline, LocationCount, NeighborhoodCount,
};
pub use service_record::{LocatedRecord, ServiceRecord};
