//! Location models: validated coordinates and caller-supplied location input

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A coordinate pair outside the WGS84 ranges
#[derive(Error, Debug, PartialEq)]
pub enum CoordinateError {
    #[error("latitude {0} outside [-90, 90]")]
    Latitude(f64),
    #[error("longitude {0} outside [-180, 180]")]
    Longitude(f64),
}

/// A validated WGS84 coordinate pair
///
/// Constructed only through [`Coordinate::new`], so any value of this type
/// carries finite, in-range degrees. Serializes as `lat` / `lng` to match
/// the dataset column convention.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Coordinate {
    /// Latitude in decimal degrees
    #[serde(rename = "lat")]
    pub latitude: f64,
    /// Longitude in decimal degrees
    #[serde(rename = "lng")]
    pub longitude: f64,
}

impl Coordinate {
    /// Create a coordinate, rejecting out-of-range or non-finite degrees
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        // NaN fails `contains` on both bounds, so it is rejected here too.
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(CoordinateError::Latitude(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordinateError::Longitude(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Format as a "lat, lng" string for logs
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// How a caller pins the search to a place
///
/// Explicit coordinates bypass geocoding entirely. A name goes through the
/// geocoding provider before any distance is computed.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationInput {
    /// Already-resolved coordinates, used as-is
    Coordinates(Coordinate),
    /// A free-form place name such as "Umeda" or "Osaka Station"
    Name(String),
}
