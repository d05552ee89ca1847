// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Removal of the attribution is not allowed, as covered under the AGPL license

//! Declarative schemas for the archive members and positional row mapping.
//!
//! Each member's column order is declared once here and checked against the
//! feed's header before any row is read, so a feed with a reordered or
//! truncated header fails loudly instead of misindexing fields.

use crate::error::{IngestError, RowError};
use crate::models::{Agency, Calendar, CalendarDate, Route, ShapePoint, Stop, StopTime, Trip};
use chrono::NaiveDate;
use csv::StringRecord;
use serde::{Deserialize, Serialize};

/// How malformed numeric/date fields are handled during ingest.
///
/// Neither mode ever defaults a bad coordinate to 0.0 — that would silently
/// relocate the stop or shape point to the equator/prime meridian.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinatePolicy {
    /// A malformed row aborts the whole load.
    #[default]
    Strict,
    /// A malformed row is skipped, counted and logged; the load continues.
    Lenient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedTable {
    Agencies,
    Routes,
    Trips,
    Calendar,
    CalendarDates,
    Shapes,
    StopTimes,
    Stops,
}

/// One recognized archive member: its base file name and column order.
pub struct FeedFile {
    pub name: &'static str,
    pub table: FeedTable,
    pub columns: &'static [&'static str],
}

pub const FEED_FILES: &[FeedFile] = &[
    FeedFile {
        name: "agency.txt",
        table: FeedTable::Agencies,
        columns: &[
            "agency_name",
            "agency_url",
            "agency_timezone",
            "agency_lang",
            "agency_phone",
        ],
    },
    FeedFile {
        name: "routes.txt",
        table: FeedTable::Routes,
        columns: &[
            "route_id",
            "route_short_name",
            "route_long_name",
            "route_desc",
            "route_type",
            "route_url",
        ],
    },
    FeedFile {
        name: "trips.txt",
        table: FeedTable::Trips,
        columns: &[
            "route_id",
            "service_id",
            "trip_id",
            "trip_headsign",
            "direction_id",
            "block_id",
            "shape_id",
        ],
    },
    FeedFile {
        name: "calendar.txt",
        table: FeedTable::Calendar,
        columns: &[
            "service_id",
            "monday",
            "tuesday",
            "wednesday",
            "thursday",
            "friday",
            "saturday",
            "sunday",
            "start_date",
            "end_date",
        ],
    },
    FeedFile {
        name: "calendar_dates.txt",
        table: FeedTable::CalendarDates,
        columns: &["service_id", "date", "exception_type"],
    },
    FeedFile {
        name: "shapes.txt",
        table: FeedTable::Shapes,
        columns: &[
            "shape_id",
            "shape_pt_lat",
            "shape_pt_lon",
            "shape_pt_sequence",
        ],
    },
    FeedFile {
        name: "stop_times.txt",
        table: FeedTable::StopTimes,
        columns: &[
            "trip_id",
            "arrival_time",
            "departure_time",
            "stop_id",
            "stop_sequence",
            "pickup_type",
            "drop_off_type",
        ],
    },
    FeedFile {
        name: "stops.txt",
        table: FeedTable::Stops,
        columns: &[
            "stop_id",
            "stop_code",
            "stop_name",
            "stop_desc",
            "stop_lat",
            "stop_lon",
            "zone_id",
            "stop_url",
            "location_type",
        ],
    },
];

/// Looks up a member by its base file name.
pub fn recognize(base_name: &str) -> Option<&'static FeedFile> {
    FEED_FILES.iter().find(|feed_file| feed_file.name == base_name)
}

/// The header must carry exactly the declared number of columns.
pub fn validate_header(feed_file: &FeedFile, header: &StringRecord) -> Result<(), IngestError> {
    if header.len() != feed_file.columns.len() {
        return Err(IngestError::ColumnCountMismatch {
            file: feed_file.name.to_string(),
            expected: feed_file.columns.len(),
            found: header.len(),
        });
    }
    Ok(())
}

fn field<'a>(
    record: &'a StringRecord,
    index: usize,
    column: &'static str,
) -> Result<&'a str, RowError> {
    record
        .get(index)
        .map(str::trim)
        .ok_or(RowError::MissingColumn { column })
}

fn required_text(
    record: &StringRecord,
    index: usize,
    column: &'static str,
) -> Result<String, RowError> {
    Ok(field(record, index, column)?.to_string())
}

fn optional_text(
    record: &StringRecord,
    index: usize,
    column: &'static str,
) -> Result<Option<String>, RowError> {
    let raw = field(record, index, column)?;
    match raw.is_empty() {
        true => Ok(None),
        false => Ok(Some(raw.to_string())),
    }
}

fn parse_f64(record: &StringRecord, index: usize, column: &'static str) -> Result<f64, RowError> {
    let raw = field(record, index, column)?;
    raw.parse::<f64>().map_err(|_| RowError::InvalidNumber {
        column,
        value: raw.to_string(),
    })
}

fn parse_i32(record: &StringRecord, index: usize, column: &'static str) -> Result<i32, RowError> {
    let raw = field(record, index, column)?;
    raw.parse::<i32>().map_err(|_| RowError::InvalidNumber {
        column,
        value: raw.to_string(),
    })
}

fn parse_i16(record: &StringRecord, index: usize, column: &'static str) -> Result<i16, RowError> {
    let raw = field(record, index, column)?;
    raw.parse::<i16>().map_err(|_| RowError::InvalidNumber {
        column,
        value: raw.to_string(),
    })
}

fn parse_optional_i16(
    record: &StringRecord,
    index: usize,
    column: &'static str,
) -> Result<Option<i16>, RowError> {
    let raw = field(record, index, column)?;
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<i16>()
        .map(Some)
        .map_err(|_| RowError::InvalidNumber {
            column,
            value: raw.to_string(),
        })
}

fn parse_date(
    record: &StringRecord,
    index: usize,
    column: &'static str,
) -> Result<NaiveDate, RowError> {
    let raw = field(record, index, column)?;
    NaiveDate::parse_from_str(raw, "%Y%m%d").map_err(|_| RowError::InvalidDate {
        column,
        value: raw.to_string(),
    })
}

/// Weekday flags are `1` for in-service; anything else means not running.
fn flag(record: &StringRecord, index: usize, column: &'static str) -> Result<bool, RowError> {
    Ok(field(record, index, column)? == "1")
}

pub fn agency_from_record(record: &StringRecord) -> Result<Agency, RowError> {
    Ok(Agency {
        agency_name: required_text(record, 0, "agency_name")?,
        agency_url: required_text(record, 1, "agency_url")?,
        agency_timezone: required_text(record, 2, "agency_timezone")?,
        agency_lang: optional_text(record, 3, "agency_lang")?,
        agency_phone: optional_text(record, 4, "agency_phone")?,
    })
}

pub fn route_from_record(record: &StringRecord) -> Result<Route, RowError> {
    Ok(Route {
        route_id: required_text(record, 0, "route_id")?,
        short_name: optional_text(record, 1, "route_short_name")?,
        long_name: optional_text(record, 2, "route_long_name")?,
        gtfs_desc: optional_text(record, 3, "route_desc")?,
        route_type: parse_i16(record, 4, "route_type")?,
        url: optional_text(record, 5, "route_url")?,
    })
}

pub fn trip_from_record(record: &StringRecord) -> Result<Trip, RowError> {
    Ok(Trip {
        route_id: required_text(record, 0, "route_id")?,
        service_id: required_text(record, 1, "service_id")?,
        trip_id: required_text(record, 2, "trip_id")?,
        trip_headsign: optional_text(record, 3, "trip_headsign")?,
        direction_id: parse_optional_i16(record, 4, "direction_id")?,
        block_id: optional_text(record, 5, "block_id")?,
        shape_id: optional_text(record, 6, "shape_id")?,
    })
}

pub fn calendar_from_record(record: &StringRecord) -> Result<Calendar, RowError> {
    Ok(Calendar {
        service_id: required_text(record, 0, "service_id")?,
        monday: flag(record, 1, "monday")?,
        tuesday: flag(record, 2, "tuesday")?,
        wednesday: flag(record, 3, "wednesday")?,
        thursday: flag(record, 4, "thursday")?,
        friday: flag(record, 5, "friday")?,
        saturday: flag(record, 6, "saturday")?,
        sunday: flag(record, 7, "sunday")?,
        gtfs_start_date: parse_date(record, 8, "start_date")?,
        gtfs_end_date: parse_date(record, 9, "end_date")?,
    })
}

pub fn calendar_date_from_record(record: &StringRecord) -> Result<CalendarDate, RowError> {
    Ok(CalendarDate {
        service_id: required_text(record, 0, "service_id")?,
        gtfs_date: parse_date(record, 1, "date")?,
        exception_type: parse_i16(record, 2, "exception_type")?,
    })
}

pub fn shape_point_from_record(record: &StringRecord) -> Result<ShapePoint, RowError> {
    Ok(ShapePoint {
        shape_id: required_text(record, 0, "shape_id")?,
        shape_pt_lat: parse_f64(record, 1, "shape_pt_lat")?,
        shape_pt_lon: parse_f64(record, 2, "shape_pt_lon")?,
        shape_pt_sequence: parse_i32(record, 3, "shape_pt_sequence")?,
    })
}

pub fn stop_time_from_record(record: &StringRecord) -> Result<StopTime, RowError> {
    Ok(StopTime {
        trip_id: required_text(record, 0, "trip_id")?,
        arrival_time: required_text(record, 1, "arrival_time")?,
        departure_time: required_text(record, 2, "departure_time")?,
        stop_id: required_text(record, 3, "stop_id")?,
        stop_sequence: parse_i32(record, 4, "stop_sequence")?,
        pickup_type: parse_optional_i16(record, 5, "pickup_type")?,
        drop_off_type: parse_optional_i16(record, 6, "drop_off_type")?,
    })
}

pub fn stop_from_record(record: &StringRecord) -> Result<Stop, RowError> {
    Ok(Stop {
        stop_id: required_text(record, 0, "stop_id")?,
        stop_code: optional_text(record, 1, "stop_code")?,
        stop_name: required_text(record, 2, "stop_name")?,
        stop_desc: optional_text(record, 3, "stop_desc")?,
        stop_lat: parse_f64(record, 4, "stop_lat")?,
        stop_lon: parse_f64(record, 5, "stop_lon")?,
        zone_id: optional_text(record, 6, "zone_id")?,
        stop_url: optional_text(record, 7, "stop_url")?,
        location_type: parse_optional_i16(record, 8, "location_type")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognize_by_base_name() {
        assert!(recognize("stops.txt").is_some());
        assert!(recognize("shapes.txt").is_some());
        assert!(recognize("fare_rules.txt").is_none());
    }

    #[test]
    fn test_header_column_count_mismatch_is_loud() {
        let feed_file = recognize("calendar_dates.txt").unwrap();
        let short_header = StringRecord::from(vec!["service_id", "date"]);

        let result = validate_header(feed_file, &short_header);
        match result {
            Err(IngestError::ColumnCountMismatch {
                file,
                expected,
                found,
            }) => {
                assert_eq!(file, "calendar_dates.txt");
                assert_eq!(expected, 3);
                assert_eq!(found, 2);
            }
            other => panic!("expected ColumnCountMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_stop_row_maps_positionally() {
        let record = StringRecord::from(vec![
            "5571",
            "5571",
            "8 St SW Station",
            "",
            "51.045919",
            "-114.080521",
            "1",
            "",
            "0",
        ]);

        let stop = stop_from_record(&record).unwrap();
        assert_eq!(stop.stop_id, "5571");
        assert_eq!(stop.stop_name, "8 St SW Station");
        assert_eq!(stop.stop_desc, None);
        assert!((stop.stop_lat - 51.045919).abs() < 1e-12);
        assert!((stop.stop_lon + 114.080521).abs() < 1e-12);
        assert_eq!(stop.location_type, Some(0));
        assert_eq!(stop.stop_url, None);
    }

    #[test]
    fn test_malformed_latitude_is_a_row_error_not_zero() {
        let record = StringRecord::from(vec![
            "5571",
            "",
            "8 St SW Station",
            "",
            "fifty-one",
            "-114.080521",
            "",
            "",
            "",
        ]);

        let result = stop_from_record(&record);
        match result {
            Err(RowError::InvalidNumber { column, value }) => {
                assert_eq!(column, "stop_lat");
                assert_eq!(value, "fifty-one");
            }
            other => panic!("expected InvalidNumber, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_coordinate_is_still_valid() {
        let record = StringRecord::from(vec![
            "NULL_ISLAND",
            "",
            "Null Island Pier",
            "",
            "0.0",
            "0.0",
            "",
            "",
            "",
        ]);

        let stop = stop_from_record(&record).unwrap();
        assert_eq!(stop.stop_lat, 0.0);
        assert_eq!(stop.stop_lon, 0.0);
    }

    #[test]
    fn test_calendar_row_parses_flags_and_dates() {
        let record = StringRecord::from(vec![
            "WKDY", "1", "1", "1", "1", "1", "0", "0", "20240101", "20241231",
        ]);

        let calendar = calendar_from_record(&record).unwrap();
        assert!(calendar.monday);
        assert!(!calendar.saturday);
        assert_eq!(
            calendar.gtfs_start_date,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
        assert_eq!(
            calendar.gtfs_end_date,
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
        );
    }

    #[test]
    fn test_calendar_date_rejects_bad_date() {
        let record = StringRecord::from(vec!["WKDY", "2024-06-05", "2"]);
        let result = calendar_date_from_record(&record);
        assert!(matches!(result, Err(RowError::InvalidDate { .. })));
    }

    #[test]
    fn test_trip_row_optional_fields() {
        let record = StringRecord::from(vec!["201", "WKDY", "201-trip-1", "Downtown", "", "", ""]);

        let trip = trip_from_record(&record).unwrap();
        assert_eq!(trip.trip_id, "201-trip-1");
        assert_eq!(trip.direction_id, None);
        assert_eq!(trip.block_id, None);
        assert_eq!(trip.shape_id, None);

        let record = StringRecord::from(vec![
            "201",
            "WKDY",
            "201-trip-2",
            "Somerset",
            "1",
            "blk-9",
            "shp-201",
        ]);
        let trip = trip_from_record(&record).unwrap();
        assert_eq!(trip.direction_id, Some(1));
        assert_eq!(trip.shape_id.as_deref(), Some("shp-201"));
    }

    #[test]
    fn test_shape_point_sequence_must_be_numeric() {
        let record = StringRecord::from(vec!["shp-201", "51.03", "-114.09", "first"]);
        let result = shape_point_from_record(&record);
        assert!(matches!(result, Err(RowError::InvalidNumber { .. })));
    }

    #[test]
    fn test_fields_are_trimmed() {
        let record = StringRecord::from(vec!["shp-201", " 51.03 ", " -114.09", "4"]);
        let shape_point = shape_point_from_record(&record).unwrap();
        assert_eq!(shape_point.shape_pt_lat, 51.03);
        assert_eq!(shape_point.shape_pt_sequence, 4);
    }
}
