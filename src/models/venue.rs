//! Venue models: dataset rows in their client-facing shape

use std::collections::BTreeMap;

use serde::Serialize;

use super::location::Coordinate;

/// A single venue as returned to clients
///
/// The coordinate flattens into `lat` / `lng` and any dataset columns beyond
/// the required six flatten in as extra string fields, so the JSON shape
/// mirrors the dataset header. `distance` is present only when the request
/// carried a resolvable location.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Venue {
    /// Positive dataset identifier
    pub id: u64,
    /// Venue name
    pub name: String,
    #[serde(flatten)]
    pub coordinate: Coordinate,
    /// Neighbourhood or district label
    pub area: String,
    /// Venue category, e.g. "izakaya" or "tachinomi"
    pub category: String,
    /// Meters from the resolved reference point, when one exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    /// Pass-through columns the dataset defines beyond the required ones
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

/// A venue paired with its relevance standing
///
/// Internal to the pipeline. The HTTP layer strips score and rank before
/// responding, but tests and callers of the library see the full ordering.
#[derive(Debug, Clone)]
pub struct RankedVenue {
    pub venue: Venue,
    /// Relevance in [0, 1], higher is more relevant
    pub score: f64,
    /// Zero-based position in the final ordering
    pub rank: usize,
}
