// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Removal of the attribution is not allowed, as covered under the AGPL license

//! Service calendar resolution: which service ids operate on a given date.

use crate::models::{Calendar, CalendarDate};
use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::BTreeSet;
use std::collections::HashSet;

pub const EXCEPTION_ADDED: i16 = 1;
pub const EXCEPTION_REMOVED: i16 = 2;

/// The calendar row's flag for the given weekday.
pub fn runs_on_weekday(calendar: &Calendar, day_of_week: Weekday) -> bool {
    match day_of_week {
        Weekday::Mon => calendar.monday,
        Weekday::Tue => calendar.tuesday,
        Weekday::Wed => calendar.wednesday,
        Weekday::Thu => calendar.thursday,
        Weekday::Fri => calendar.friday,
        Weekday::Sat => calendar.saturday,
        Weekday::Sun => calendar.sunday,
    }
}

/// Resolves the set of service ids active on `date`.
///
/// A service is active through its calendar row (start <= date <= end, the
/// weekday flag set, and no type-2 exception for that exact date) or through
/// a type-1 exception for the date. The two paths are independent: an added
/// exception activates a service even when no calendar row covers the date
/// at all. The result is the union of both.
pub fn active_service_ids(
    date: NaiveDate,
    calendar_rows: &[Calendar],
    exceptions: &[CalendarDate],
) -> BTreeSet<String> {
    let day_of_week = date.weekday();

    let removed_today: HashSet<&str> = exceptions
        .iter()
        .filter(|exception| {
            exception.gtfs_date == date && exception.exception_type == EXCEPTION_REMOVED
        })
        .map(|exception| exception.service_id.as_str())
        .collect();

    let mut active: BTreeSet<String> = calendar_rows
        .iter()
        .filter(|calendar| calendar.gtfs_start_date <= date && date <= calendar.gtfs_end_date)
        .filter(|calendar| runs_on_weekday(calendar, day_of_week))
        .filter(|calendar| !removed_today.contains(calendar.service_id.as_str()))
        .map(|calendar| calendar.service_id.clone())
        .collect();

    for exception in exceptions {
        if exception.gtfs_date == date && exception.exception_type == EXCEPTION_ADDED {
            active.insert(exception.service_id.clone());
        }
    }

    active
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weekday_service(service_id: &str) -> Calendar {
        Calendar {
            service_id: service_id.to_string(),
            monday: true,
            tuesday: true,
            wednesday: true,
            thursday: true,
            friday: true,
            saturday: false,
            sunday: false,
            gtfs_start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            gtfs_end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        }
    }

    fn exception(service_id: &str, date: NaiveDate, exception_type: i16) -> CalendarDate {
        CalendarDate {
            service_id: service_id.to_string(),
            gtfs_date: date,
            exception_type,
        }
    }

    #[test]
    fn test_weekday_flag_activates_service() {
        // 2024-06-05 is a Wednesday
        let date = NaiveDate::from_ymd_opt(2024, 6, 5).unwrap();
        let active = active_service_ids(date, &[weekday_service("WKDY")], &[]);
        assert!(active.contains("WKDY"));

        // 2024-06-08 is a Saturday
        let saturday = NaiveDate::from_ymd_opt(2024, 6, 8).unwrap();
        let active = active_service_ids(saturday, &[weekday_service("WKDY")], &[]);
        assert!(active.is_empty());
    }

    #[test]
    fn test_date_range_bounds_are_inclusive() {
        let mut calendar = weekday_service("WKDY");
        // Both bounds fall on weekdays
        calendar.gtfs_start_date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        calendar.gtfs_end_date = NaiveDate::from_ymd_opt(2024, 6, 7).unwrap();

        let rows = [calendar];
        let start = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 6, 7).unwrap();
        let after = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();

        assert!(active_service_ids(start, &rows, &[]).contains("WKDY"));
        assert!(active_service_ids(end, &rows, &[]).contains("WKDY"));
        assert!(active_service_ids(after, &rows, &[]).is_empty());
    }

    #[test]
    fn test_removed_exception_excludes_service() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 5).unwrap();
        let exceptions = [exception("WKDY", date, EXCEPTION_REMOVED)];
        let active = active_service_ids(date, &[weekday_service("WKDY")], &exceptions);
        assert!(active.is_empty());

        // The removal only applies to that exact date
        let next_day = NaiveDate::from_ymd_opt(2024, 6, 6).unwrap();
        let active = active_service_ids(next_day, &[weekday_service("WKDY")], &exceptions);
        assert!(active.contains("WKDY"));
    }

    #[test]
    fn test_added_exception_without_calendar_row() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 8).unwrap();
        let exceptions = [exception("GAMEDAY", date, EXCEPTION_ADDED)];
        let active = active_service_ids(date, &[], &exceptions);
        assert_eq!(active.into_iter().collect::<Vec<_>>(), vec!["GAMEDAY"]);
    }

    #[test]
    fn test_added_exception_outside_calendar_range() {
        // Service's calendar ended in 2024, but a one-off addition brings it
        // back for a single 2025 date.
        let date = NaiveDate::from_ymd_opt(2025, 3, 12).unwrap();
        let exceptions = [exception("WKDY", date, EXCEPTION_ADDED)];
        let active = active_service_ids(date, &[weekday_service("WKDY")], &exceptions);
        assert!(active.contains("WKDY"));
    }

    #[test]
    fn test_union_of_both_activation_paths() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 5).unwrap();
        let exceptions = [exception("EXTRA", date, EXCEPTION_ADDED)];
        let active = active_service_ids(date, &[weekday_service("WKDY")], &exceptions);
        assert_eq!(active.len(), 2);
        assert!(active.contains("WKDY"));
        assert!(active.contains("EXTRA"));
    }

    #[test]
    fn test_duplicate_added_exception_yields_one_entry() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 5).unwrap();
        let exceptions = [
            exception("WKDY", date, EXCEPTION_ADDED),
            exception("WKDY", date, EXCEPTION_ADDED),
        ];
        let active = active_service_ids(date, &[weekday_service("WKDY")], &exceptions);
        assert_eq!(active.len(), 1);
    }
}
