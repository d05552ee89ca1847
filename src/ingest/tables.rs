// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Removal of the attribution is not allowed, as covered under the AGPL license

//! Per-entity batch inserts. Each call runs one transaction; within it the
//! rows go in as chunked multi-row statements so a batch never exceeds
//! Postgres' bind parameter limit.

use crate::models::{Agency, Calendar, CalendarDate, Route, ShapePoint, Stop, StopTime, Trip};
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};

/// Rows per INSERT statement. The widest table (stops, 9 columns) stays
/// well under the 65535 bind parameter cap at this size.
pub(crate) const INSERT_CHUNK_ROWS: usize = 2_048;

pub(crate) async fn insert_agencies(
    conn: &mut AsyncPgConnection,
    rows: &[Agency],
) -> Result<usize, diesel::result::Error> {
    use crate::schema::gtfs::agencies::dsl::agencies;

    if rows.is_empty() {
        return Ok(0);
    }

    conn.transaction::<usize, diesel::result::Error, _>(|conn| {
        async move {
            let mut inserted = 0;
            for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
                let values = chunk.to_vec();
                inserted += diesel::insert_into(agencies)
                    .values(values)
                    .execute(conn)
                    .await?;
            }
            Ok(inserted)
        }
        .scope_boxed()
    })
    .await
}

pub(crate) async fn insert_routes(
    conn: &mut AsyncPgConnection,
    rows: &[Route],
) -> Result<usize, diesel::result::Error> {
    use crate::schema::gtfs::routes::dsl::routes;

    if rows.is_empty() {
        return Ok(0);
    }

    conn.transaction::<usize, diesel::result::Error, _>(|conn| {
        async move {
            let mut inserted = 0;
            for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
                let values = chunk.to_vec();
                inserted += diesel::insert_into(routes)
                    .values(values)
                    .execute(conn)
                    .await?;
            }
            Ok(inserted)
        }
        .scope_boxed()
    })
    .await
}

pub(crate) async fn insert_trips(
    conn: &mut AsyncPgConnection,
    rows: &[Trip],
) -> Result<usize, diesel::result::Error> {
    use crate::schema::gtfs::trips::dsl::trips;

    if rows.is_empty() {
        return Ok(0);
    }

    conn.transaction::<usize, diesel::result::Error, _>(|conn| {
        async move {
            let mut inserted = 0;
            for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
                let values = chunk.to_vec();
                inserted += diesel::insert_into(trips)
                    .values(values)
                    .execute(conn)
                    .await?;
            }
            Ok(inserted)
        }
        .scope_boxed()
    })
    .await
}

pub(crate) async fn insert_calendar(
    conn: &mut AsyncPgConnection,
    rows: &[Calendar],
) -> Result<usize, diesel::result::Error> {
    use crate::schema::gtfs::calendar::dsl::calendar;

    if rows.is_empty() {
        return Ok(0);
    }

    conn.transaction::<usize, diesel::result::Error, _>(|conn| {
        async move {
            let mut inserted = 0;
            for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
                let values = chunk.to_vec();
                inserted += diesel::insert_into(calendar)
                    .values(values)
                    .execute(conn)
                    .await?;
            }
            Ok(inserted)
        }
        .scope_boxed()
    })
    .await
}

pub(crate) async fn insert_calendar_dates(
    conn: &mut AsyncPgConnection,
    rows: &[CalendarDate],
) -> Result<usize, diesel::result::Error> {
    use crate::schema::gtfs::calendar_dates::dsl::calendar_dates;

    if rows.is_empty() {
        return Ok(0);
    }

    conn.transaction::<usize, diesel::result::Error, _>(|conn| {
        async move {
            let mut inserted = 0;
            for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
                let values = chunk.to_vec();
                inserted += diesel::insert_into(calendar_dates)
                    .values(values)
                    .execute(conn)
                    .await?;
            }
            Ok(inserted)
        }
        .scope_boxed()
    })
    .await
}

pub(crate) async fn insert_shape_points(
    conn: &mut AsyncPgConnection,
    rows: &[ShapePoint],
) -> Result<usize, diesel::result::Error> {
    use crate::schema::gtfs::shapes::dsl::shapes;

    if rows.is_empty() {
        return Ok(0);
    }

    conn.transaction::<usize, diesel::result::Error, _>(|conn| {
        async move {
            let mut inserted = 0;
            for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
                let values = chunk.to_vec();
                inserted += diesel::insert_into(shapes)
                    .values(values)
                    .execute(conn)
                    .await?;
            }
            Ok(inserted)
        }
        .scope_boxed()
    })
    .await
}

pub(crate) async fn insert_stop_times(
    conn: &mut AsyncPgConnection,
    rows: &[StopTime],
) -> Result<usize, diesel::result::Error> {
    use crate::schema::gtfs::stoptimes::dsl::stoptimes;

    if rows.is_empty() {
        return Ok(0);
    }

    conn.transaction::<usize, diesel::result::Error, _>(|conn| {
        async move {
            let mut inserted = 0;
            for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
                let values = chunk.to_vec();
                inserted += diesel::insert_into(stoptimes)
                    .values(values)
                    .execute(conn)
                    .await?;
            }
            Ok(inserted)
        }
        .scope_boxed()
    })
    .await
}

pub(crate) async fn insert_stops(
    conn: &mut AsyncPgConnection,
    rows: &[Stop],
) -> Result<usize, diesel::result::Error> {
    use crate::schema::gtfs::stops::dsl::stops;

    if rows.is_empty() {
        return Ok(0);
    }

    conn.transaction::<usize, diesel::result::Error, _>(|conn| {
        async move {
            let mut inserted = 0;
            for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
                let values = chunk.to_vec();
                inserted += diesel::insert_into(stops)
                    .values(values)
                    .execute(conn)
                    .await?;
            }
            Ok(inserted)
        }
        .scope_boxed()
    })
    .await
}
