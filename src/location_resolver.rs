//! Location Resolution Module
//!
//! Turns caller-supplied location input into a reference coordinate for the
//! proximity filter. Explicit coordinates pass through without any network
//! traffic; place names make exactly one geocoding call, with no retries.

use tracing::{debug, error, info};

use crate::error::SearchError;
use crate::geocoding::Geocoder;
use crate::models::{Coordinate, LocationInput};

/// Service for resolving location inputs
pub struct LocationResolver;

impl LocationResolver {
    /// Resolve a location input into a reference coordinate
    pub async fn resolve(
        geocoder: &dyn Geocoder,
        input: &LocationInput,
    ) -> Result<Coordinate, SearchError> {
        match input {
            LocationInput::Coordinates(coordinate) => {
                debug!(
                    coordinates = %coordinate.format_coordinates(),
                    "using caller-supplied coordinates"
                );
                Ok(*coordinate)
            }
            LocationInput::Name(name) => Self::resolve_name(geocoder, name).await,
        }
    }

    /// Resolve a place name to coordinates via geocoding
    async fn resolve_name(
        geocoder: &dyn Geocoder,
        name: &str,
    ) -> Result<Coordinate, SearchError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SearchError::invalid_location(name));
        }

        debug!(place = name, "geocoding place name");
        match geocoder.geocode(name).await {
            Ok(Some(coordinate)) => Ok(coordinate),
            Ok(None) => {
                info!(place = name, "place name did not resolve");
                Err(SearchError::invalid_location(name))
            }
            Err(cause) => {
                error!(place = name, error = format!("{cause:#}"), "geocoding failed");
                Err(SearchError::unexpected(cause))
            }
        }
    }
}
