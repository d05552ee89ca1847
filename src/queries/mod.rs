// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Removal of the attribution is not allowed, as covered under the AGPL license

//! The read-side façade over the schedule store.
//!
//! All lookups are read-only and safe to run with unrestricted parallelism;
//! the handle carries nothing mutable beyond the pool. Empty answers are
//! normal results (`None` / empty `Vec`), never errors — only store access
//! failures surface as [`QueryError`].

use crate::calendar;
use crate::error::{IngestError, QueryError};
use crate::ingest::{self, IngestOptions, IngestReport};
use crate::models::{Agency, Calendar, CalendarDate, Route, ShapePoint, Stop, StopTime, Trip};
use crate::postgres_tools::AlderPostgresPool;
use crate::schema::gtfs;
use crate::shape_export::{self, ShapePath};
use crate::spatial::{self, DistanceUnit};
use chrono::NaiveDate;
use diesel::prelude::*;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use geo::Point;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct ScheduleStore {
    pool: Arc<AlderPostgresPool>,
    /// Held for the duration of a reload so two reloads can never interleave
    /// their truncate/insert/index work.
    reload_lock: Mutex<()>,
}

impl ScheduleStore {
    pub fn new(pool: Arc<AlderPostgresPool>) -> Self {
        ScheduleStore {
            pool,
            reload_lock: Mutex::new(()),
        }
    }

    pub fn pool(&self) -> Arc<AlderPostgresPool> {
        Arc::clone(&self.pool)
    }

    async fn conn(
        &self,
    ) -> Result<
        bb8::PooledConnection<'_, AsyncDieselConnectionManager<AsyncPgConnection>>,
        QueryError,
    > {
        self.pool
            .get()
            .await
            .map_err(|pool_error| QueryError::Pool(pool_error.to_string()))
    }

    /// Replaces the store contents from the zip archive at `archive_path`.
    ///
    /// At most one reload runs at a time; a second request while one is in
    /// flight is rejected with [`IngestError::ReloadInProgress`]. Queries
    /// keep running during a reload and may observe a transiently empty or
    /// partially filled store.
    pub async fn reload(
        &self,
        archive_path: &Path,
        options: &IngestOptions,
    ) -> Result<IngestReport, IngestError> {
        let Ok(_guard) = self.reload_lock.try_lock() else {
            return Err(IngestError::ReloadInProgress);
        };

        ingest::load_feed(Arc::clone(&self.pool), archive_path, options).await
    }

    /// The feed's agency row.
    pub async fn agency(&self) -> Result<Option<Agency>, QueryError> {
        let mut conn_guard = self.conn().await?;
        let conn = &mut *conn_guard;

        let agency_row = gtfs::agencies::table
            .select(Agency::as_select())
            .first(conn)
            .await
            .optional()?;

        Ok(agency_row)
    }

    /// Stop lookup by rider-facing stop code.
    pub async fn find_stop(&self, stop_code: &str) -> Result<Option<Stop>, QueryError> {
        let mut conn_guard = self.conn().await?;
        let conn = &mut *conn_guard;

        let stop_row = gtfs::stops::table
            .filter(gtfs::stops::stop_code.eq(stop_code))
            .select(Stop::as_select())
            .first(conn)
            .await
            .optional()?;

        Ok(stop_row)
    }

    /// Routes with at least one trip calling at the stop on `date`,
    /// ordered by short name.
    pub async fn routes_at_stop(
        &self,
        stop_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<Route>, QueryError> {
        let mut conn_guard = self.conn().await?;
        let conn = &mut *conn_guard;

        let service_ids = load_active_service_ids(conn, date).await?;

        let trip_ids_at_stop: Vec<String> = gtfs::stoptimes::table
            .filter(gtfs::stoptimes::stop_id.eq(stop_id))
            .select(gtfs::stoptimes::trip_id)
            .distinct()
            .load(conn)
            .await?;

        let route_ids: Vec<String> = gtfs::trips::table
            .filter(gtfs::trips::trip_id.eq_any(&trip_ids_at_stop))
            .filter(gtfs::trips::service_id.eq_any(&service_ids))
            .select(gtfs::trips::route_id)
            .distinct()
            .load(conn)
            .await?;

        let route_rows = gtfs::routes::table
            .filter(gtfs::routes::route_id.eq_any(&route_ids))
            .order(gtfs::routes::short_name.asc())
            .select(Route::as_select())
            .load(conn)
            .await?;

        Ok(route_rows)
    }

    pub async fn all_calendars(&self) -> Result<Vec<Calendar>, QueryError> {
        let mut conn_guard = self.conn().await?;
        let conn = &mut *conn_guard;

        let calendar_rows = gtfs::calendar::table
            .select(Calendar::as_select())
            .load(conn)
            .await?;

        Ok(calendar_rows)
    }

    /// Calendar rows of the services active on `date`. Services that are
    /// active purely through an added exception have no calendar row to
    /// return here; they still show up in [`Self::active_service_ids`].
    pub async fn active_calendars(&self, date: NaiveDate) -> Result<Vec<Calendar>, QueryError> {
        let mut conn_guard = self.conn().await?;
        let conn = &mut *conn_guard;

        let calendar_rows = gtfs::calendar::table
            .select(Calendar::as_select())
            .load(conn)
            .await?;
        let exception_rows = exceptions_for_date(conn, date).await?;

        let active = calendar::active_service_ids(date, &calendar_rows, &exception_rows);

        Ok(calendar_rows
            .into_iter()
            .filter(|calendar_row| active.contains(&calendar_row.service_id))
            .collect())
    }

    /// Service ids active on `date`, sorted.
    pub async fn active_service_ids(&self, date: NaiveDate) -> Result<Vec<String>, QueryError> {
        let mut conn_guard = self.conn().await?;
        let conn = &mut *conn_guard;

        load_active_service_ids(conn, date).await
    }

    /// Raw calendar-date exception rows for `date`.
    pub async fn exceptions_on(&self, date: NaiveDate) -> Result<Vec<CalendarDate>, QueryError> {
        let mut conn_guard = self.conn().await?;
        let conn = &mut *conn_guard;

        exceptions_for_date(conn, date).await
    }

    /// Route search by short-name fragment, ordered by short name.
    pub async fn find_route(&self, name_fragment: &str) -> Result<Vec<Route>, QueryError> {
        let mut conn_guard = self.conn().await?;
        let conn = &mut *conn_guard;

        let pattern = format!("%{name_fragment}%");

        let route_rows = gtfs::routes::table
            .filter(gtfs::routes::short_name.like(pattern))
            .order(gtfs::routes::short_name.asc())
            .select(Route::as_select())
            .load(conn)
            .await?;

        Ok(route_rows)
    }

    /// Trips on the route whose service runs on `date`, either direction.
    pub async fn trips_for_route(
        &self,
        route_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<Trip>, QueryError> {
        let mut conn_guard = self.conn().await?;
        let conn = &mut *conn_guard;

        active_trips(conn, route_id, None, date).await
    }

    pub async fn trip(&self, trip_id: &str) -> Result<Vec<Trip>, QueryError> {
        let mut conn_guard = self.conn().await?;
        let conn = &mut *conn_guard;

        let trip_rows = gtfs::trips::table
            .filter(gtfs::trips::trip_id.eq(trip_id))
            .order(gtfs::trips::trip_id.asc())
            .select(Trip::as_select())
            .load(conn)
            .await?;

        Ok(trip_rows)
    }

    /// Distinct stops served by the route in the given direction on `date`.
    pub async fn stops_for_route(
        &self,
        route_id: &str,
        direction_id: i16,
        date: NaiveDate,
    ) -> Result<Vec<Stop>, QueryError> {
        let mut conn_guard = self.conn().await?;
        let conn = &mut *conn_guard;

        stops_for_route_on(conn, route_id, direction_id, date).await
    }

    /// Nearest of the route's stops to `origin`, per the strict-minimum
    /// first-wins scan. `None` when the route serves no stops on `date`.
    pub async fn nearest_stop_for_route(
        &self,
        route_id: &str,
        direction_id: i16,
        date: NaiveDate,
        origin: Point<f64>,
    ) -> Result<Option<Stop>, QueryError> {
        let mut conn_guard = self.conn().await?;
        let conn = &mut *conn_guard;

        let candidates = stops_for_route_on(conn, route_id, direction_id, date).await?;

        Ok(spatial::nearest_stop(origin, &candidates).cloned())
    }

    /// Every stop strictly within `radius` of `origin`, any route.
    pub async fn stops_in_range(
        &self,
        origin: Point<f64>,
        radius: f64,
        unit: DistanceUnit,
    ) -> Result<Vec<Stop>, QueryError> {
        let mut conn_guard = self.conn().await?;
        let conn = &mut *conn_guard;

        let all_stops = gtfs::stops::table
            .select(Stop::as_select())
            .load(conn)
            .await?;

        Ok(spatial::stops_within_radius(origin, &all_stops, radius, unit))
    }

    /// The stop's timetable for one route on `date`, ascending by arrival.
    pub async fn stop_schedule(
        &self,
        stop_id: &str,
        route_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<StopTime>, QueryError> {
        let mut conn_guard = self.conn().await?;
        let conn = &mut *conn_guard;

        let active = active_trips(conn, route_id, None, date).await?;
        let trip_ids: Vec<&str> = active.iter().map(|trip| trip.trip_id.as_str()).collect();

        let stop_times = gtfs::stoptimes::table
            .filter(gtfs::stoptimes::stop_id.eq(stop_id))
            .filter(gtfs::stoptimes::trip_id.eq_any(trip_ids))
            .order(gtfs::stoptimes::arrival_time.asc())
            .select(StopTime::as_select())
            .load(conn)
            .await?;

        Ok(stop_times)
    }

    /// All stop calls of one trip, ascending by arrival.
    pub async fn trip_schedule(&self, trip_id: &str) -> Result<Vec<StopTime>, QueryError> {
        let mut conn_guard = self.conn().await?;
        let conn = &mut *conn_guard;

        let stop_times = gtfs::stoptimes::table
            .filter(gtfs::stoptimes::trip_id.eq(trip_id))
            .order(gtfs::stoptimes::arrival_time.asc())
            .select(StopTime::as_select())
            .load(conn)
            .await?;

        Ok(stop_times)
    }

    /// Simplified encoded paths for every shape the route's active trips
    /// reference in the given direction on `date`.
    pub async fn shapes_for_route(
        &self,
        route_id: &str,
        direction_id: i16,
        date: NaiveDate,
    ) -> Result<Vec<ShapePath>, QueryError> {
        let mut conn_guard = self.conn().await?;
        let conn = &mut *conn_guard;

        let active = active_trips(conn, route_id, Some(direction_id), date).await?;

        let mut shape_ids: Vec<String> = active
            .into_iter()
            .filter_map(|trip| trip.shape_id)
            .collect();
        shape_ids.sort();
        shape_ids.dedup();

        let point_rows = gtfs::shapes::table
            .filter(gtfs::shapes::shape_id.eq_any(&shape_ids))
            .order((
                gtfs::shapes::shape_id.asc(),
                gtfs::shapes::shape_pt_sequence.asc(),
            ))
            .select(ShapePoint::as_select())
            .load(conn)
            .await?;

        shape_export::encode_shape_paths(&point_rows)
    }

    /// Simplified encoded path for a single shape id.
    pub async fn shape_by_id(&self, shape_id: &str) -> Result<Vec<ShapePath>, QueryError> {
        let mut conn_guard = self.conn().await?;
        let conn = &mut *conn_guard;

        let point_rows = gtfs::shapes::table
            .filter(gtfs::shapes::shape_id.eq(shape_id))
            .order((
                gtfs::shapes::shape_id.asc(),
                gtfs::shapes::shape_pt_sequence.asc(),
            ))
            .select(ShapePoint::as_select())
            .load(conn)
            .await?;

        shape_export::encode_shape_paths(&point_rows)
    }
}

async fn exceptions_for_date(
    conn: &mut AsyncPgConnection,
    date: NaiveDate,
) -> Result<Vec<CalendarDate>, QueryError> {
    let exception_rows = gtfs::calendar_dates::table
        .filter(gtfs::calendar_dates::gtfs_date.eq(date))
        .select(CalendarDate::as_select())
        .load(conn)
        .await?;

    Ok(exception_rows)
}

/// Loads the calendar tables and resolves the active service set for `date`.
/// The resolver itself is pure; only this wrapper touches the store.
async fn load_active_service_ids(
    conn: &mut AsyncPgConnection,
    date: NaiveDate,
) -> Result<Vec<String>, QueryError> {
    let calendar_rows = gtfs::calendar::table
        .select(Calendar::as_select())
        .load(conn)
        .await?;
    let exception_rows = exceptions_for_date(conn, date).await?;

    Ok(calendar::active_service_ids(date, &calendar_rows, &exception_rows)
        .into_iter()
        .collect())
}

/// Trips on the route restricted to services active on `date`, optionally
/// narrowed to one direction. Service restriction is a bound `= ANY` list,
/// never interpolated SQL.
async fn active_trips(
    conn: &mut AsyncPgConnection,
    route_id: &str,
    direction_id: Option<i16>,
    date: NaiveDate,
) -> Result<Vec<Trip>, QueryError> {
    let service_ids = load_active_service_ids(conn, date).await?;

    let mut query = gtfs::trips::table
        .filter(gtfs::trips::route_id.eq(route_id))
        .filter(gtfs::trips::service_id.eq_any(service_ids))
        .select(Trip::as_select())
        .into_boxed();

    if let Some(direction) = direction_id {
        query = query.filter(gtfs::trips::direction_id.eq(direction));
    }

    let trip_rows = query.load(conn).await?;

    Ok(trip_rows)
}

async fn stops_for_route_on(
    conn: &mut AsyncPgConnection,
    route_id: &str,
    direction_id: i16,
    date: NaiveDate,
) -> Result<Vec<Stop>, QueryError> {
    let active = active_trips(conn, route_id, Some(direction_id), date).await?;
    let trip_ids: Vec<&str> = active.iter().map(|trip| trip.trip_id.as_str()).collect();

    let stop_ids: Vec<String> = gtfs::stoptimes::table
        .filter(gtfs::stoptimes::trip_id.eq_any(trip_ids))
        .select(gtfs::stoptimes::stop_id)
        .distinct()
        .load(conn)
        .await?;

    let stop_rows = gtfs::stops::table
        .filter(gtfs::stops::stop_id.eq_any(&stop_ids))
        .select(Stop::as_select())
        .load(conn)
        .await?;

    Ok(stop_rows)
}
