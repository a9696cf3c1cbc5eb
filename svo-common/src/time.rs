//! Calendar and timestamp utilities
//!
//! All scheduling comparisons are timezone-naive: spreadsheets carry local
//! wall-clock times, so everything here works on `NaiveDate`/`NaiveDateTime`.

use crate::{Error, Result};
use chrono::{Days, Local, NaiveDate, NaiveDateTime};

/// Current local wall-clock time
pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

/// Parse a `YYYY-MM-DD` date
///
/// # Errors
/// Returns `Error::InvalidInput` naming the rejected text.
pub fn parse_iso_date(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").map_err(|_| {
        Error::InvalidInput(format!(
            "invalid date '{}', expected format YYYY-MM-DD",
            text
        ))
    })
}

/// `date + days`, saturating at the calendar maximum
pub fn add_days(date: NaiveDate, days: u32) -> NaiveDate {
    date.checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MAX)
}

/// Day label shown to users (`DD/MM/YYYY`)
pub fn day_label(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Compact day stamp used in file names (`YYYYMMDD`)
pub fn compact_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Compact generation stamp used in file names (`YYYYMMDDHHMM`)
pub fn compact_timestamp(at: NaiveDateTime) -> String {
    at.format("%Y%m%d%H%M").to_string()
}
