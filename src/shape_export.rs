// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Removal of the attribution is not allowed, as covered under the AGPL license

//! Turns ordered shape point rows into simplified, polyline-encoded paths.

use crate::error::QueryError;
use crate::models::ShapePoint;
use geo::Simplify;
use geo::{Coord, LineString, coord};
use serde::{Deserialize, Serialize};

/// Douglas-Peucker tolerance, in coordinate degrees. Roughly a meter at the
/// equator; tight enough that a decoded path stays visually on the street.
pub const SIMPLIFY_TOLERANCE_DEGREES: f64 = 1.0e-5;

/// Standard Google polyline precision (5 decimal places).
pub const POLYLINE_PRECISION: u32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapePath {
    pub shape_id: String,
    /// Polyline-encoded simplified path, reversible with
    /// `polyline::decode_polyline(_, 5)`.
    pub path: String,
}

/// Groups a (shape_id, sequence)-ordered point stream into runs, simplifies
/// each run and encodes it. The stream may carry one shape or many; a run
/// ends where the shape id changes, and the final run is flushed after the
/// scan so no group is dropped.
pub fn encode_shape_paths(points: &[ShapePoint]) -> Result<Vec<ShapePath>, QueryError> {
    let mut paths: Vec<ShapePath> = Vec::new();
    let mut current_id: Option<&str> = None;
    let mut run: Vec<Coord<f64>> = Vec::new();

    for point in points {
        if current_id != Some(point.shape_id.as_str()) {
            if let Some(shape_id) = current_id {
                if !run.is_empty() {
                    paths.push(encode_run(shape_id, std::mem::take(&mut run))?);
                }
            }
            run.clear();
            current_id = Some(point.shape_id.as_str());
        }

        run.push(coord! { x: point.shape_pt_lon, y: point.shape_pt_lat });
    }

    if let Some(shape_id) = current_id {
        if !run.is_empty() {
            paths.push(encode_run(shape_id, run)?);
        }
    }

    Ok(paths)
}

fn encode_run(shape_id: &str, coords: Vec<Coord<f64>>) -> Result<ShapePath, QueryError> {
    let simplified = LineString::new(coords).simplify(&SIMPLIFY_TOLERANCE_DEGREES);

    let path = polyline::encode_coordinates(simplified, POLYLINE_PRECISION)
        .map_err(|encode_error| QueryError::ShapeEncode(encode_error.to_string()))?;

    Ok(ShapePath {
        shape_id: shape_id.to_string(),
        path,
    })
}
