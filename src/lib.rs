//! Izakaya Search - semantic venue search with geographic filtering
//!
//! This library provides the core functionality for resolving a caller's
//! location, filtering a venue dataset by proximity and ranking the
//! survivors against a free-form prompt via a vector similarity engine.

pub mod config;
pub mod dataset;
pub mod embedding;
pub mod error;
pub mod geo;
pub mod geocoding;
pub mod location_resolver;
pub mod models;
pub mod search;
pub mod web;

// Re-export core types for public API
pub use config::SearchConfig;
pub use dataset::{Dataset, DatasetCache};
pub use embedding::{Embedder, OpenAiEmbedder};
pub use error::SearchError;
pub use geocoding::{Geocoder, OpenMeteoGeocoder};
pub use location_resolver::LocationResolver;
pub use models::{Coordinate, LocationInput, RankedVenue, SearchQuery, Venue};
pub use search::{ChromaClient, SearchPipeline, SimilaritySearch};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, SearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
