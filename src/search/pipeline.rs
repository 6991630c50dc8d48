//! The search pipeline
//!
//! One request flows resolve → load → filter → rank → assemble, in that
//! order. Each stage either produces what the next stage needs or
//! short-circuits the request with a terminal [`SearchError`]; nothing is
//! retried and no stage runs once an earlier one has failed.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::config::SearchConfig;
use crate::dataset::DatasetCache;
use crate::error::SearchError;
use crate::geo;
use crate::geocoding::Geocoder;
use crate::location_resolver::LocationResolver;
use crate::models::{Coordinate, RankedVenue, SearchQuery};
use crate::search::document;
use crate::search::engine::{Document, ScoredDocument, SimilaritySearch};
use crate::search::filter;

/// Orchestrates one search request end to end
pub struct SearchPipeline {
    config: Arc<SearchConfig>,
    dataset: DatasetCache,
    geocoder: Arc<dyn Geocoder>,
    engine: Arc<dyn SimilaritySearch>,
}

impl SearchPipeline {
    #[must_use]
    pub fn new(
        config: Arc<SearchConfig>,
        dataset: DatasetCache,
        geocoder: Arc<dyn Geocoder>,
        engine: Arc<dyn SimilaritySearch>,
    ) -> Self {
        Self {
            config,
            dataset,
            geocoder,
            engine,
        }
    }

    /// Run a search query through the full pipeline
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<RankedVenue>, SearchError> {
        if query.prompt.trim().is_empty() {
            return Err(SearchError::malformed("prompt must not be empty"));
        }

        let reference = match &query.location {
            Some(input) => Some(LocationResolver::resolve(self.geocoder.as_ref(), input).await?),
            None => None,
        };

        let dataset = self.dataset.load().await?;

        let radius_meters = self.config.defaults.radius_meters;
        let retained = filter::retained_indices(&dataset, reference.as_ref(), radius_meters)?;
        if retained.is_empty() {
            info!(radius_meters, "no venues inside the search radius");
            return Err(SearchError::Empty);
        }
        debug!(
            candidates = retained.len(),
            total = dataset.len(),
            "proximity filter applied"
        );

        let documents: Vec<Document> = retained
            .iter()
            .map(|&index| Document {
                id: index.to_string(),
                text: document::render(dataset.header(), &dataset.rows()[index]),
            })
            .collect();

        let hits = self
            .engine
            .rank(documents, &query.prompt, self.config.defaults.result_count)
            .await
            .map_err(|cause| {
                error!(error = format!("{cause:#}"), "similarity ranking failed");
                SearchError::unexpected(cause)
            })?;
        if hits.is_empty() {
            return Err(SearchError::NoResult);
        }

        let ranked = assemble(
            dataset.header(),
            dataset.lat_col(),
            dataset.lng_col(),
            hits,
            reference.as_ref(),
        )?;
        if ranked.is_empty() {
            return Err(SearchError::NoResult);
        }

        info!(results = ranked.len(), "search complete");
        Ok(ranked)
    }
}

/// Turn ranked documents back into venues
///
/// Hits come back ordered by the engine, but the ordering is re-derived
/// from the scores here so the contract does not rest on engine behaviour.
/// A document that exactly matches the header sentinel is dropped; any
/// other unparseable document fails the request, because it means the
/// engine returned text this service never rendered.
pub(crate) fn assemble(
    header: &[String],
    lat_col: usize,
    lng_col: usize,
    hits: Vec<ScoredDocument>,
    reference: Option<&Coordinate>,
) -> Result<Vec<RankedVenue>, SearchError> {
    let sentinel = document::header_document(header);

    let mut ranked: Vec<RankedVenue> = Vec::with_capacity(hits.len());
    for hit in hits {
        if hit.text == sentinel {
            debug!("dropping header document from ranked hits");
            continue;
        }

        let mut venue =
            document::parse(header, lat_col, lng_col, &hit.text).map_err(SearchError::from)?;
        if let Some(reference) = reference {
            venue.distance = Some(geo::distance_meters(reference, &venue.coordinate));
        }
        ranked.push(RankedVenue {
            venue,
            score: hit.score,
            rank: 0,
        });
    }

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    for (position, entry) in ranked.iter_mut().enumerate() {
        entry.rank = position;
    }

    Ok(ranked)
}
