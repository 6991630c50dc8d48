//! Proximity filtering of dataset rows

use std::collections::BTreeSet;

use tracing::trace;

use crate::dataset::Dataset;
use crate::error::SearchError;
use crate::geo;
use crate::models::Coordinate;

/// Indices of rows within `radius_meters` of the reference point
///
/// Produces a fresh ascending index set instead of mutating the dataset, so
/// the original row order stays intact for rendering and nothing is removed
/// from a sequence while it is being walked. With no reference point every
/// row is retained. The radius test is boundary-inclusive: a row exactly at
/// the radius survives.
pub fn retained_indices(
    dataset: &Dataset,
    reference: Option<&Coordinate>,
    radius_meters: f64,
) -> Result<BTreeSet<usize>, SearchError> {
    let mut retained = BTreeSet::new();

    let Some(reference) = reference else {
        retained.extend(0..dataset.len());
        return Ok(retained);
    };

    for index in 0..dataset.len() {
        let coordinate = dataset.row_coordinate(index)?;
        let distance = geo::distance_meters(reference, &coordinate);
        if distance <= radius_meters {
            retained.insert(index);
        } else {
            trace!(index, distance, radius_meters, "row outside search radius");
        }
    }

    Ok(retained)
}
