//! Scheduled service order as read from an input table

use super::Coordinates;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

/// One scheduled work order
///
/// Immutable once read. Location fields are optional here because source
/// tables are sparse; filtering drops rows without them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceRecord {
    /// Order identifier (e.g. `SVO-000123`)
    pub order_id: String,
    /// Scheduled wall-clock time; `None` means unscheduled
    pub scheduled_for: Option<NaiveDateTime>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    pub status: Option<String>,
}

impl ServiceRecord {
    /// Calendar day of the scheduled timestamp
    pub fn scheduled_day(&self) -> Option<NaiveDate> {
        self.scheduled_for.map(|at| at.date())
    }

    /// Neighborhood and city, both present and non-blank
    pub fn location(&self) -> Option<(&str, &str)> {
        let neighborhood = non_blank(self.neighborhood.as_deref())?;
        let city = non_blank(self.city.as_deref())?;
        Some((neighborhood, city))
    }
}

/// A record joined with the position its address resolved to
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedRecord {
    pub record: ServiceRecord,
    pub coordinates: Coordinates,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
