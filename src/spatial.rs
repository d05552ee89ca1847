// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Removal of the attribution is not allowed, as covered under the AGPL license

//! Great-circle distance and stop filtering over raw coordinates.

use crate::models::Stop;
use geo::HaversineDistance;
use geo::Point;
use serde::{Deserialize, Serialize};

pub const METERS_PER_KILOMETER: f64 = 1_000.0;
pub const METERS_PER_MILE: f64 = 1_609.344;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceUnit {
    Kilometers,
    Miles,
}

impl DistanceUnit {
    pub fn from_meters(self, meters: f64) -> f64 {
        match self {
            DistanceUnit::Kilometers => meters / METERS_PER_KILOMETER,
            DistanceUnit::Miles => meters / METERS_PER_MILE,
        }
    }
}

/// The stop's position as a lon/lat point.
pub fn stop_point(stop: &Stop) -> Point<f64> {
    Point::new(stop.stop_lon, stop.stop_lat)
}

/// Haversine great-circle distance in the requested unit. The haversine
/// uses the mean Earth radius (~6371 km).
pub fn distance(a: Point<f64>, b: Point<f64>, unit: DistanceUnit) -> f64 {
    unit.from_meters(a.haversine_distance(&b))
}

/// Linear scan for the candidate closest to `origin`. Comparison is a
/// strict `<` on the running minimum, so among equidistant candidates the
/// first in iteration order wins.
pub fn nearest_stop<'a>(origin: Point<f64>, candidates: &'a [Stop]) -> Option<&'a Stop> {
    let mut nearest: Option<&Stop> = None;
    let mut best = f64::MAX;

    for stop in candidates {
        let current = origin.haversine_distance(&stop_point(stop));
        if current < best {
            nearest = Some(stop);
            best = current;
        }
    }

    nearest
}

/// Every candidate strictly inside the radius. The boundary is exclusive:
/// a stop exactly `radius` away is not returned.
pub fn stops_within_radius(
    origin: Point<f64>,
    candidates: &[Stop],
    radius: f64,
    unit: DistanceUnit,
) -> Vec<Stop> {
    candidates
        .iter()
        .filter(|stop| distance(origin, stop_point(stop), unit) < radius)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop_at(stop_id: &str, lat: f64, lon: f64) -> Stop {
        Stop {
            stop_id: stop_id.to_string(),
            stop_code: Some(stop_id.to_string()),
            stop_name: format!("Stop {stop_id}"),
            stop_desc: None,
            stop_lat: lat,
            stop_lon: lon,
            zone_id: None,
            stop_url: None,
            location_type: None,
        }
    }

    #[test]
    fn test_distance_is_symmetric_and_zero_on_self() {
        let a = Point::new(-114.0708, 51.0486);
        let b = Point::new(-113.4938, 53.5461);

        let ab = distance(a, b, DistanceUnit::Kilometers);
        let ba = distance(b, a, DistanceUnit::Kilometers);
        assert!((ab - ba).abs() < 1e-9);
        assert_eq!(distance(a, a, DistanceUnit::Kilometers), 0.0);
    }

    #[test]
    fn test_unit_conversion_ratio() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(1.0, 0.0);
        let km = distance(a, b, DistanceUnit::Kilometers);
        let miles = distance(a, b, DistanceUnit::Miles);
        assert!((km / miles - METERS_PER_MILE / METERS_PER_KILOMETER).abs() < 1e-9);
        // One degree of longitude at the equator is roughly 111 km
        assert!((km - 111.2).abs() < 1.0);
    }

    #[test]
    fn test_nearest_stop_prefers_smaller_distance() {
        let stops = [stop_at("S1", 0.0, 0.0), stop_at("S2", 1.0, 0.0)];
        let query = Point::new(0.0, 0.4);

        let nearest = nearest_stop(query, &stops).unwrap();
        assert_eq!(nearest.stop_id, "S1");
    }

    #[test]
    fn test_nearest_stop_tie_keeps_first_in_input_order() {
        // Same coordinates, so identical distance; the scan must keep the
        // first candidate it saw.
        let stops = [stop_at("FIRST", 10.0, 10.0), stop_at("SECOND", 10.0, 10.0)];
        let nearest = nearest_stop(Point::new(10.5, 10.5), &stops).unwrap();
        assert_eq!(nearest.stop_id, "FIRST");

        let reversed = [stop_at("SECOND", 10.0, 10.0), stop_at("FIRST", 10.0, 10.0)];
        let nearest = nearest_stop(Point::new(10.5, 10.5), &reversed).unwrap();
        assert_eq!(nearest.stop_id, "SECOND");
    }

    #[test]
    fn test_nearest_stop_empty_candidates() {
        assert!(nearest_stop(Point::new(0.0, 0.0), &[]).is_none());
    }

    #[test]
    fn test_range_filter_boundary_is_exclusive() {
        let near = stop_at("NEAR", 0.1, 0.0);
        let boundary = stop_at("BOUNDARY", 1.0, 0.0);
        let query = Point::new(0.0, 0.0);

        // Radius exactly the distance to BOUNDARY: it must not be returned.
        let radius = distance(query, stop_point(&boundary), DistanceUnit::Kilometers);
        let within = stops_within_radius(
            query,
            &[near.clone(), boundary],
            radius,
            DistanceUnit::Kilometers,
        );

        assert_eq!(within.len(), 1);
        assert_eq!(within[0].stop_id, "NEAR");
    }
}
