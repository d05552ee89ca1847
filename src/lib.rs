// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Removal of the attribution is not allowed, as covered under the AGPL license

#![deny(
    clippy::mutable_key_type,
    clippy::map_entry,
    clippy::boxed_local,
    clippy::let_unit_value,
    clippy::redundant_allocation,
    clippy::bool_comparison,
    clippy::bind_instead_of_map,
    clippy::vec_box,
    clippy::while_let_loop,
    clippy::useless_asref,
    clippy::repeat_once,
    clippy::deref_addrof,
    clippy::suspicious_map,
    clippy::single_char_pattern,
    clippy::for_kv_map,
    clippy::let_and_return,
    clippy::iter_nth,
    clippy::iter_cloned_collect,
    clippy::match_result_ok,
    clippy::cmp_owned,
    clippy::op_ref
)]

//! Alder is the schedule store of the backend: it swallows a zipped GTFS
//! feed into Postgres and answers the derived questions the dispatch layer
//! asks of it — which services run today, which stops serve a route, which
//! stop is closest to a rider, and a compact encoded path for a shape.
//!
//! The HTTP layer, table migrations and process startup live outside this
//! crate. Everything here works against an explicitly passed
//! [`queries::ScheduleStore`] handle owning the connection pool.

pub mod calendar;
pub mod error;
pub mod ingest;
pub mod models;
pub mod postgres_tools;
pub mod queries;
pub mod schema;
pub mod shape_export;
pub mod spatial;

pub use error::{IngestError, QueryError, RowError};
pub use ingest::{CoordinatePolicy, IngestOptions, IngestReport};
pub use queries::ScheduleStore;
pub use shape_export::ShapePath;
pub use spatial::DistanceUnit;
