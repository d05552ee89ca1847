// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Removal of the attribution is not allowed, as covered under the AGPL license

//! The feed loader: wholesale replacement of the store from a zipped feed.
//!
//! A reload truncates all eight tables, drops the derived indexes, streams
//! every recognized archive member through the positional row mapper in
//! batched transactions, and finally recreates the indexes. There is no
//! snapshot isolation: a failed load leaves whatever batches already
//! committed, which the [`IngestError`] return surfaces to the caller.

pub mod feed_files;
mod tables;

pub use feed_files::{CoordinatePolicy, FEED_FILES, FeedFile, FeedTable, recognize};

use crate::error::{IngestError, RowError};
use crate::postgres_tools::AlderPostgresPool;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use log::{debug, info, warn};
use serde::Serialize;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

/// Rows per committed transaction. Bounds both the loader's row buffer and
/// the amount of work lost to a rollback.
pub const DEFAULT_BATCH_ROWS: usize = 15_000;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub coordinate_policy: CoordinatePolicy,
    /// Rows per committed transaction, typically 15 000 to 100 000.
    pub batch_rows: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        IngestOptions {
            coordinate_policy: CoordinatePolicy::default(),
            batch_rows: DEFAULT_BATCH_ROWS,
        }
    }
}

/// Per-table inserted row counts for one completed load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub agencies: usize,
    pub routes: usize,
    pub trips: usize,
    pub calendars: usize,
    pub calendar_dates: usize,
    pub shape_points: usize,
    pub stop_times: usize,
    pub stops: usize,
    /// Rows dropped under [`CoordinatePolicy::Lenient`].
    pub rejected_rows: usize,
    /// Archive members that matched no declared feed file.
    pub skipped_members: Vec<String>,
}

const TRUNCATE_ALL_TABLES: &str = "TRUNCATE TABLE gtfs.agencies, gtfs.routes, gtfs.trips, \
     gtfs.calendar, gtfs.calendar_dates, gtfs.shapes, gtfs.stoptimes, gtfs.stops";

const DERIVED_INDEXES: &[(&str, &str)] = &[
    (
        "stoptimes_stop_id_idx",
        "CREATE INDEX IF NOT EXISTS stoptimes_stop_id_idx ON gtfs.stoptimes (stop_id)",
    ),
    (
        "stoptimes_trip_id_idx",
        "CREATE INDEX IF NOT EXISTS stoptimes_trip_id_idx ON gtfs.stoptimes (trip_id)",
    ),
    (
        "trips_service_id_idx",
        "CREATE INDEX IF NOT EXISTS trips_service_id_idx ON gtfs.trips (service_id)",
    ),
    (
        "trips_trip_id_idx",
        "CREATE INDEX IF NOT EXISTS trips_trip_id_idx ON gtfs.trips (trip_id)",
    ),
    (
        "trips_route_id_idx",
        "CREATE INDEX IF NOT EXISTS trips_route_id_idx ON gtfs.trips (route_id)",
    ),
];

/// Replaces the entire store contents with the archive at `archive_path`.
///
/// Callers wanting the single-flight guarantee go through
/// [`crate::ScheduleStore::reload`]; this function itself does not lock.
pub async fn load_feed(
    pool: Arc<AlderPostgresPool>,
    archive_path: &Path,
    options: &IngestOptions,
) -> Result<IngestReport, IngestError> {
    let archive_file = std::fs::File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(archive_file)?;

    let conn_pool = pool.as_ref();
    let mut conn_guard = conn_pool
        .get()
        .await
        .map_err(|pool_error| IngestError::Pool(pool_error.to_string()))?;
    let conn = &mut *conn_guard;

    info!(
        "reloading schedule store from {} ({} policy, {} rows per batch)",
        archive_path.display(),
        match options.coordinate_policy {
            CoordinatePolicy::Strict => "strict",
            CoordinatePolicy::Lenient => "lenient",
        },
        options.batch_rows
    );

    truncate_all_tables(conn).await?;
    drop_derived_indexes(conn).await?;

    let mut report = IngestReport::default();

    for member_index in 0..archive.len() {
        let mut member = archive.by_index(member_index)?;
        if member.is_dir() {
            continue;
        }

        // Feeds sometimes nest their tables inside a directory
        let base_name = member
            .name()
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();

        let Some(feed_file) = feed_files::recognize(&base_name) else {
            debug!("skipping unrecognized feed member {}", member.name());
            report.skipped_members.push(base_name);
            continue;
        };

        info!("processing {}", feed_file.name);
        load_member(conn, feed_file, &mut member, options, &mut report).await?;
    }

    create_derived_indexes(conn).await?;

    info!(
        "reload finished: {} stops, {} trips, {} stop times, {} shape points, {} rejected rows",
        report.stops, report.trips, report.stop_times, report.shape_points, report.rejected_rows
    );

    Ok(report)
}

async fn load_member<R: Read>(
    conn: &mut AsyncPgConnection,
    feed_file: &FeedFile,
    reader: R,
    options: &IngestOptions,
    report: &mut IngestReport,
) -> Result<(), IngestError> {
    match feed_file.table {
        FeedTable::Agencies => load_agencies(conn, feed_file, reader, options, report).await,
        FeedTable::Routes => load_routes(conn, feed_file, reader, options, report).await,
        FeedTable::Trips => load_trips(conn, feed_file, reader, options, report).await,
        FeedTable::Calendar => load_calendar(conn, feed_file, reader, options, report).await,
        FeedTable::CalendarDates => {
            load_calendar_dates(conn, feed_file, reader, options, report).await
        }
        FeedTable::Shapes => load_shape_points(conn, feed_file, reader, options, report).await,
        FeedTable::StopTimes => load_stop_times(conn, feed_file, reader, options, report).await,
        FeedTable::Stops => load_stops(conn, feed_file, reader, options, report).await,
    }
}

fn csv_error(feed_file: &FeedFile, source: csv::Error) -> IngestError {
    IngestError::Csv {
        file: feed_file.name.to_string(),
        source,
    }
}

/// Strict mode turns a bad row into a load-fatal error; lenient mode logs,
/// counts and drops it. Either way the row is never inserted with
/// made-up values.
fn reject_row(
    feed_file: &FeedFile,
    line: u64,
    row_error: RowError,
    options: &IngestOptions,
    report: &mut IngestReport,
) -> Result<(), IngestError> {
    match options.coordinate_policy {
        CoordinatePolicy::Strict => Err(IngestError::Row {
            file: feed_file.name.to_string(),
            line,
            source: row_error,
        }),
        CoordinatePolicy::Lenient => {
            warn!("{} line {}: {} (row skipped)", feed_file.name, line, row_error);
            report.rejected_rows += 1;
            Ok(())
        }
    }
}

macro_rules! member_loader {
    ($fn_name:ident, $row_type:ty, $from_record:path, $insert:path, $counter:ident) => {
        async fn $fn_name<R: Read>(
            conn: &mut AsyncPgConnection,
            feed_file: &FeedFile,
            reader: R,
            options: &IngestOptions,
            report: &mut IngestReport,
        ) -> Result<(), IngestError> {
            let mut csv_reader = csv::Reader::from_reader(reader);

            let header = csv_reader
                .headers()
                .map_err(|source| csv_error(feed_file, source))?;
            feed_files::validate_header(feed_file, header)?;

            let mut batch: Vec<$row_type> = Vec::new();

            for (row_index, record) in csv_reader.records().enumerate() {
                let record = record.map_err(|source| csv_error(feed_file, source))?;
                // Data starts on line 2; line 1 is the header
                let line = row_index as u64 + 2;

                match $from_record(&record) {
                    Ok(row) => batch.push(row),
                    Err(row_error) => reject_row(feed_file, line, row_error, options, report)?,
                }

                if batch.len() >= options.batch_rows {
                    report.$counter += $insert(conn, &batch).await?;
                    batch.clear();
                }
            }

            report.$counter += $insert(conn, &batch).await?;
            Ok(())
        }
    };
}

member_loader!(
    load_agencies,
    crate::models::Agency,
    feed_files::agency_from_record,
    tables::insert_agencies,
    agencies
);
member_loader!(
    load_routes,
    crate::models::Route,
    feed_files::route_from_record,
    tables::insert_routes,
    routes
);
member_loader!(
    load_trips,
    crate::models::Trip,
    feed_files::trip_from_record,
    tables::insert_trips,
    trips
);
member_loader!(
    load_calendar,
    crate::models::Calendar,
    feed_files::calendar_from_record,
    tables::insert_calendar,
    calendars
);
member_loader!(
    load_calendar_dates,
    crate::models::CalendarDate,
    feed_files::calendar_date_from_record,
    tables::insert_calendar_dates,
    calendar_dates
);
member_loader!(
    load_shape_points,
    crate::models::ShapePoint,
    feed_files::shape_point_from_record,
    tables::insert_shape_points,
    shape_points
);
member_loader!(
    load_stop_times,
    crate::models::StopTime,
    feed_files::stop_time_from_record,
    tables::insert_stop_times,
    stop_times
);
member_loader!(
    load_stops,
    crate::models::Stop,
    feed_files::stop_from_record,
    tables::insert_stops,
    stops
);

async fn truncate_all_tables(conn: &mut AsyncPgConnection) -> Result<(), diesel::result::Error> {
    diesel::sql_query(TRUNCATE_ALL_TABLES).execute(conn).await?;
    Ok(())
}

async fn drop_derived_indexes(conn: &mut AsyncPgConnection) -> Result<(), diesel::result::Error> {
    for (index_name, _) in DERIVED_INDEXES {
        diesel::sql_query(format!("DROP INDEX IF EXISTS gtfs.{index_name}"))
            .execute(conn)
            .await?;
    }
    Ok(())
}

async fn create_derived_indexes(conn: &mut AsyncPgConnection) -> Result<(), diesel::result::Error> {
    for (_, create_statement) in DERIVED_INDEXES {
        diesel::sql_query(*create_statement).execute(conn).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shapes_file() -> &'static FeedFile {
        feed_files::recognize("shapes.txt").unwrap()
    }

    #[test]
    fn test_default_options() {
        let options = IngestOptions::default();
        assert_eq!(options.batch_rows, DEFAULT_BATCH_ROWS);
        assert_eq!(options.coordinate_policy, CoordinatePolicy::Strict);
    }

    #[test]
    fn test_reject_row_strict_aborts_with_context() {
        let options = IngestOptions::default();
        let mut report = IngestReport::default();
        let row_error = RowError::InvalidNumber {
            column: "shape_pt_lat",
            value: "n/a".to_string(),
        };

        let result = reject_row(shapes_file(), 17, row_error, &options, &mut report);
        match result {
            Err(IngestError::Row { file, line, .. }) => {
                assert_eq!(file, "shapes.txt");
                assert_eq!(line, 17);
            }
            other => panic!("expected IngestError::Row, got {other:?}"),
        }
        assert_eq!(report.rejected_rows, 0);
    }

    #[test]
    fn test_reject_row_lenient_counts_and_continues() {
        let _ = env_logger::builder().is_test(true).try_init();

        let options = IngestOptions {
            coordinate_policy: CoordinatePolicy::Lenient,
            ..IngestOptions::default()
        };
        let mut report = IngestReport::default();

        for line in [5, 9] {
            let row_error = RowError::InvalidNumber {
                column: "shape_pt_lon",
                value: "-".to_string(),
            };
            reject_row(shapes_file(), line, row_error, &options, &mut report).unwrap();
        }

        assert_eq!(report.rejected_rows, 2);
    }
}
