// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Removal of the attribution is not allowed, as covered under the AGPL license

use thiserror::Error;

/// Failures while replacing the store contents with a new feed.
///
/// Every variant aborts the load. Batches committed before the failure stay
/// in the store (a reload truncates first and is not atomic), so callers must
/// treat any of these as "store possibly half replaced", never as success.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("could not open feed archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("i/o failure reading feed member: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed csv in {file}: {source}")]
    Csv {
        file: String,
        #[source]
        source: csv::Error,
    },

    /// The member's header row does not have the declared column count.
    /// Positional mapping would misindex every field, so the load stops
    /// before inserting anything from this member.
    #[error("{file}: header has {found} columns, expected {expected}")]
    ColumnCountMismatch {
        file: String,
        expected: usize,
        found: usize,
    },

    /// A row failed to parse under [`crate::CoordinatePolicy::Strict`].
    #[error("{file} line {line}: {source}")]
    Row {
        file: String,
        line: u64,
        #[source]
        source: RowError,
    },

    #[error("database failure during ingest: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("could not check out a database connection: {0}")]
    Pool(String),

    #[error("a feed reload is already in progress")]
    ReloadInProgress,
}

/// Why a single CSV row was rejected. Carried inside [`IngestError::Row`]
/// in strict mode; logged and counted in lenient mode.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RowError {
    #[error("column {column} has no value")]
    MissingColumn { column: &'static str },

    #[error("column {column} value {value:?} is not a valid number")]
    InvalidNumber {
        column: &'static str,
        value: String,
    },

    #[error("column {column} value {value:?} is not a valid YYYYMMDD date")]
    InvalidDate {
        column: &'static str,
        value: String,
    },
}

/// Store-access failures during read queries.
///
/// "Nothing matched" is not an error: lookups return an empty `Vec` or
/// `None` for that. These variants mean the query itself could not run.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("database failure: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("could not check out a database connection: {0}")]
    Pool(String),

    #[error("could not encode shape polyline: {0}")]
    ShapeEncode(String),
}
