//! Data models for the izakaya search service
//!
//! This module contains the core domain models organized by concern:
//! - Location: validated coordinates and caller location input
//! - Venue: dataset rows in their client-facing shape
//! - Query: the search request the pipeline consumes

pub mod location;
pub mod query;
pub mod venue;

// Re-export all public types for convenient access
pub use location::{Coordinate, CoordinateError, LocationInput};
pub use query::SearchQuery;
pub use venue::{RankedVenue, Venue};
