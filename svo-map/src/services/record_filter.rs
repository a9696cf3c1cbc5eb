//! Row selection for one run
//!
//! Three modes:
//! - `ExactDay`: scheduled on the given calendar day
//! - `RollingWindow`: scheduled in `[today, today + days]`, both ends inclusive
//! - `Unscheduled`: no scheduled timestamp
//!
//! Rows without a neighborhood or city are dropped in every mode; rows
//! without a timestamp are dropped by the two date modes. Dropping is not an
//! error, only counted. An empty outcome means "nothing to render".

use crate::models::{DateContext, ServiceRecord};
use chrono::NaiveDate;
use svo_common::time;
use tracing::debug;

/// Which rows a run is about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    ExactDay(NaiveDate),
    RollingWindow { today: NaiveDate, days: u32 },
    Unscheduled,
}

impl From<DateContext> for FilterMode {
    fn from(context: DateContext) -> Self {
        match context {
            DateContext::Day(day) => FilterMode::ExactDay(day),
            DateContext::Unscheduled => FilterMode::Unscheduled,
        }
    }
}

impl FilterMode {
    /// Last day of the rolling window (`None` for other modes)
    pub fn window_end(&self) -> Option<NaiveDate> {
        match self {
            FilterMode::RollingWindow { today, days } => Some(time::add_days(*today, *days)),
            _ => None,
        }
    }

    fn matches_schedule(&self, record: &ServiceRecord) -> bool {
        match (self, record.scheduled_day()) {
            (FilterMode::ExactDay(day), Some(scheduled)) => scheduled == *day,
            (FilterMode::RollingWindow { today, days }, Some(scheduled)) => {
                scheduled >= *today && scheduled <= time::add_days(*today, *days)
            }
            (FilterMode::Unscheduled, None) => true,
            _ => false,
        }
    }
}

/// Surviving rows plus how many were dropped
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOutcome {
    pub records: Vec<ServiceRecord>,
    /// Rows in the selected period missing neighborhood or city
    pub dropped_incomplete: usize,
    /// Rows outside the selected period
    pub out_of_range: usize,
}

impl FilterOutcome {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// Select the rows relevant to `mode`
pub fn filter_records(records: &[ServiceRecord], mode: FilterMode) -> FilterOutcome {
    let mut outcome = FilterOutcome::default();

    for record in records {
        if !mode.matches_schedule(record) {
            outcome.out_of_range += 1;
            continue;
        }
        if record.location().is_none() {
            outcome.dropped_incomplete += 1;
            continue;
        }
        outcome.records.push(record.clone());
    }

    debug!(
        mode = ?mode,
        kept = outcome.records.len(),
        dropped_incomplete = outcome.dropped_incomplete,
        out_of_range = outcome.out_of_range,
        "Filtered records"
    );

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(date: NaiveDate, h: u32, min: u32) -> NaiveDateTime {
        date.and_hms_opt(h, min, 0).unwrap()
    }

    fn record(id: &str, scheduled_for: Option<NaiveDateTime>) -> ServiceRecord {
        ServiceRecord {
            order_id: id.to_string(),
            scheduled_for,
            neighborhood: Some("Centro".to_string()),
            city: Some("Campinas".to_string()),
            status: None,
        }
    }

    fn ids(outcome: &FilterOutcome) -> Vec<&str> {
        outcome.records.iter().map(|r| r.order_id.as_str()).collect()
    }

    #[test]
    fn test_exact_day_ignores_time_of_day() {
        let target = day(2025, 3, 7);
        let records = vec![
            record("early", Some(at(target, 0, 0))),
            record("late", Some(at(target, 23, 59))),
            record("next", Some(at(day(2025, 3, 8), 0, 0))),
            record("none", None),
        ];

        let outcome = filter_records(&records, FilterMode::ExactDay(target));

        assert_eq!(ids(&outcome), vec!["early", "late"]);
        assert_eq!(outcome.out_of_range, 2);
    }

    #[test]
    fn test_rolling_window_is_inclusive_on_both_ends() {
        let today = day(2025, 3, 1);
        let records = vec![
            record("yesterday", Some(at(day(2025, 2, 28), 23, 59))),
            record("today", Some(at(today, 0, 0))),
            record("plus10", Some(at(day(2025, 3, 11), 18, 30))),
            record("plus11", Some(at(day(2025, 3, 12), 0, 0))),
            record("none", None),
        ];

        let mode = FilterMode::RollingWindow { today, days: 10 };
        let outcome = filter_records(&records, mode);

        assert_eq!(ids(&outcome), vec!["today", "plus10"]);
        assert_eq!(mode.window_end(), Some(day(2025, 3, 11)));
    }

    #[test]
    fn test_unscheduled_keeps_only_null_timestamps() {
        let records = vec![
            record("a", None),
            record("b", Some(at(day(2025, 3, 1), 9, 0))),
            record("c", None),
        ];

        let outcome = filter_records(&records, FilterMode::Unscheduled);
        assert_eq!(ids(&outcome), vec!["a", "c"]);
    }

    #[test]
    fn test_incomplete_rows_are_dropped_and_counted() {
        let mut no_city = record("no_city", None);
        no_city.city = None;
        let mut blank_neighborhood = record("blank", None);
        blank_neighborhood.neighborhood = Some("   ".to_string());

        let records = vec![record("ok", None), no_city, blank_neighborhood];
        let outcome = filter_records(&records, FilterMode::Unscheduled);

        assert_eq!(ids(&outcome), vec!["ok"]);
        assert_eq!(outcome.dropped_incomplete, 2);
    }

    #[test]
    fn test_empty_result_is_not_an_error() {
        let outcome = filter_records(&[], FilterMode::ExactDay(day(2025, 1, 1)));
        assert!(outcome.is_empty());
        assert_eq!(outcome.len(), 0);
    }

    #[test]
    fn test_date_context_conversion() {
        let d = day(2025, 1, 1);
        assert_eq!(FilterMode::from(DateContext::Day(d)), FilterMode::ExactDay(d));
        assert_eq!(FilterMode::from(DateContext::Unscheduled), FilterMode::Unscheduled);
    }
}
