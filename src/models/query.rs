//! Search query model

use super::location::LocationInput;

/// A validated-enough search request as the pipeline consumes it
///
/// `prompt` is checked for emptiness by the pipeline itself. A missing
/// location means no geocoding, no distances and no proximity filtering.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// Where to anchor the proximity filter, if anywhere
    pub location: Option<LocationInput>,
    /// Free-form description of what the caller wants
    pub prompt: String,
}
