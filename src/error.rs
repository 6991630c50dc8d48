//! Error types for the izakaya search pipeline

use thiserror::Error;

/// Terminal outcomes of a search request
///
/// Every stage of the pipeline short-circuits into exactly one of these
/// variants. The wire body a client sees is derived from [`SearchError::reason`],
/// never from the `Display` output, which is free to carry diagnostics.
#[derive(Error, Debug)]
pub enum SearchError {
    /// The dataset file does not exist at the configured path
    #[error("Dataset file not found: {path}")]
    NotFound { path: String },

    /// The dataset exists but violates the tabular contract
    #[error("Malformed dataset: {detail}")]
    Malformed { detail: String },

    /// No candidate rows remain, either in the file or after filtering
    #[error("No candidate venues available")]
    Empty,

    /// A place name could not be resolved to coordinates
    #[error("Could not resolve location: {place}")]
    InvalidLocation { place: String },

    /// The similarity engine answered but returned zero usable hits
    #[error("Similarity search produced no result")]
    NoResult,

    /// Any infrastructure failure: transport, decoding, upstream faults
    #[error("Unexpected failure: {detail}")]
    Unexpected { detail: String },
}

impl SearchError {
    /// Create a new missing-dataset error
    pub fn not_found<S: Into<String>>(path: S) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create a new malformed-dataset error
    pub fn malformed<S: Into<String>>(detail: S) -> Self {
        Self::Malformed {
            detail: detail.into(),
        }
    }

    /// Create a new unresolved-location error
    pub fn invalid_location<S: Into<String>>(place: S) -> Self {
        Self::InvalidLocation {
            place: place.into(),
        }
    }

    /// Create a new unexpected-failure error from any displayable cause
    pub fn unexpected<E: std::fmt::Display>(cause: E) -> Self {
        Self::Unexpected {
            detail: cause.to_string(),
        }
    }

    /// The reason string clients receive in the `{"error": ...}` body
    ///
    /// These strings are the wire contract. Clients match on them verbatim,
    /// so they must never change spelling or casing.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            SearchError::NotFound { .. } => "File not found",
            SearchError::Malformed { .. } => "Empty field found",
            SearchError::Empty => "No data found",
            SearchError::InvalidLocation { .. } => "Invalid location",
            SearchError::NoResult => "No result found",
            SearchError::Unexpected { .. } => "Unexpected error",
        }
    }
}

impl From<anyhow::Error> for SearchError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unexpected {
            detail: format!("{error:#}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let not_found = SearchError::not_found("data/izakaya.csv");
        assert!(matches!(not_found, SearchError::NotFound { .. }));

        let malformed = SearchError::malformed("row 3 has 5 fields, expected 6");
        assert!(matches!(malformed, SearchError::Malformed { .. }));

        let invalid = SearchError::invalid_location("Atlantis");
        assert!(matches!(invalid, SearchError::InvalidLocation { .. }));
    }

    #[test]
    fn test_reason_strings_are_stable() {
        assert_eq!(SearchError::not_found("x").reason(), "File not found");
        assert_eq!(SearchError::malformed("x").reason(), "Empty field found");
        assert_eq!(SearchError::Empty.reason(), "No data found");
        assert_eq!(
            SearchError::invalid_location("x").reason(),
            "Invalid location"
        );
        assert_eq!(SearchError::NoResult.reason(), "No result found");
        assert_eq!(SearchError::unexpected("x").reason(), "Unexpected error");
    }

    #[test]
    fn test_anyhow_conversion_lands_on_unexpected() {
        let cause = anyhow::anyhow!("connection refused").context("engine query failed");
        let error: SearchError = cause.into();
        assert!(matches!(error, SearchError::Unexpected { .. }));
        assert_eq!(error.reason(), "Unexpected error");
    }

    #[test]
    fn test_display_carries_diagnostics() {
        let error = SearchError::malformed("empty value in column \"name\" at row 2");
        assert!(error.to_string().contains("row 2"));
    }
}
