//! Generated map documents and their file names
//!
//! File names are a compatibility contract with whatever lists and serves the
//! maps directory:
//! - single day: `{city}_{YYYYMMDD}.html` or `{city}_sem_data.html`
//!   (spaces in the city become `_`)
//! - rolling window: `{city}_geral{YYYYMMDDHHMM}.html`
//!
//! Re-running on the same inputs overwrites the same file.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::path::PathBuf;
use svo_common::time;

/// Date context of a single-snapshot map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateContext {
    /// Orders scheduled on this calendar day
    Day(NaiveDate),
    /// Orders without a scheduled timestamp
    Unscheduled,
}

impl DateContext {
    /// `YYYYMMDD` or `sem_data`
    pub fn file_suffix(&self) -> String {
        match self {
            DateContext::Day(day) => time::compact_date(*day),
            DateContext::Unscheduled => "sem_data".to_string(),
        }
    }

    /// `DD/MM/YYYY` or `Sem Data`, used in map titles
    pub fn display_label(&self) -> String {
        match self {
            DateContext::Day(day) => time::day_label(*day),
            DateContext::Unscheduled => "Sem Data".to_string(),
        }
    }
}

/// A written map document plus the label it is listed under
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MapArtifact {
    pub label: String,
    pub path: PathBuf,
}

/// File name of a single-snapshot map
pub fn single_day_file_name(city: &str, context: &DateContext) -> String {
    format!(
        "{}_{}.html",
        file_safe(city).replace(' ', "_"),
        context.file_suffix()
    )
}

/// File name of a rolling-window map
pub fn rolling_file_name(city: &str, generated_at: NaiveDateTime) -> String {
    format!(
        "{}_geral{}.html",
        file_safe(city),
        time::compact_timestamp(generated_at)
    )
}

/// Label of a rolling-window map in the batch result
pub fn rolling_label(city: &str, window_days: u32) -> String {
    format!("{} (Futuros {} dias)", city, window_days)
}

fn file_safe(city: &str) -> String {
    city.trim().replace(['/', '\\'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_day_names() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(
            single_day_file_name("Campinas", &DateContext::Day(day)),
            "Campinas_20250307.html"
        );
        assert_eq!(
            single_day_file_name("São José dos Campos", &DateContext::Unscheduled),
            "São_José_dos_Campos_sem_data.html"
        );
    }

    #[test]
    fn test_rolling_name_keeps_city_verbatim() {
        let at = NaiveDate::from_ymd_opt(2025, 3, 7)
            .unwrap()
            .and_hms_opt(9, 41, 12)
            .unwrap();
        assert_eq!(
            rolling_file_name("Santa Bárbara d'Oeste", at),
            "Santa Bárbara d'Oeste_geral202503070941.html"
        );
    }

    #[test]
    fn test_path_separators_never_leave_the_maps_dir() {
        assert_eq!(
            single_day_file_name("a/b", &DateContext::Unscheduled),
            "a_b_sem_data.html"
        );
    }

    #[test]
    fn test_context_labels() {
        let day = NaiveDate::from_ymd_opt(2025, 12, 1).unwrap();
        assert_eq!(DateContext::Day(day).display_label(), "01/12/2025");
        assert_eq!(DateContext::Unscheduled.display_label(), "Sem Data");
        assert_eq!(rolling_label("Campinas", 10), "Campinas (Futuros 10 dias)");
    }
}
