//! Geodesic distance on the WGS84 ellipsoid

use std::sync::LazyLock;

use geographiclib_rs::{Geodesic, InverseGeodesic};

use crate::models::Coordinate;

static WGS84: LazyLock<Geodesic> = LazyLock::new(Geodesic::wgs84);

/// Shortest surface distance between two coordinates, in meters
///
/// Solves the inverse geodesic problem on the WGS84 ellipsoid rather than a
/// spherical approximation, so results stay stable for the sub-kilometer
/// radii the proximity filter works with.
#[must_use]
pub fn distance_meters(from: &Coordinate, to: &Coordinate) -> f64 {
    let meters: f64 = WGS84.inverse(from.latitude, from.longitude, to.latitude, to.longitude);
    meters
}
