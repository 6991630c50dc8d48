//! Venue dataset loading
//!
//! The dataset is a UTF-8 CSV file whose first record is a header. Six
//! columns are required: `id`, `name`, the two configured coordinate
//! columns, `area` and `category`. Any further columns pass through to
//! clients untouched. Parsing is strict: one bad row fails the whole load.

use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::DatasetConfig;
use crate::error::SearchError;
use crate::models::Coordinate;

/// A parsed venue dataset
///
/// Rows hold every cell as a string in header order. Coordinate cells are
/// validated at parse time, so [`Dataset::row_coordinate`] succeeds for any
/// index this type hands out.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
    lat_col: usize,
    lng_col: usize,
}

impl Dataset {
    /// Parse CSV bytes into a dataset
    pub fn from_csv(bytes: &[u8], config: &DatasetConfig) -> Result<Self, SearchError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(bytes);

        let mut records = reader.records();

        // The header is the first record, never assumed: a file whose first
        // record lacks the required columns fails loudly instead of silently
        // consuming a data row.
        let header: Vec<String> = match records.next() {
            None => return Err(SearchError::Empty),
            Some(Err(cause)) => return Err(SearchError::unexpected(cause)),
            Some(Ok(record)) => record.iter().map(str::to_string).collect(),
        };

        let column = |name: &str| {
            header
                .iter()
                .position(|field| field == name)
                .ok_or_else(|| {
                    SearchError::malformed(format!("header is missing required column {name:?}"))
                })
        };

        let id_col = column("id")?;
        let name_col = column("name")?;
        let lat_col = column(&config.lat_column)?;
        let lng_col = column(&config.lng_column)?;
        let area_col = column("area")?;
        let category_col = column("category")?;
        let required = [id_col, name_col, lat_col, lng_col, area_col, category_col];

        let mut rows: Vec<Vec<String>> = Vec::new();
        for record in records {
            let record = record.map_err(SearchError::unexpected)?;
            let row: Vec<String> = record.iter().map(str::to_string).collect();
            let row_number = rows.len() + 1;

            if row.len() != header.len() {
                return Err(SearchError::malformed(format!(
                    "row {row_number} has {} fields, expected {}",
                    row.len(),
                    header.len()
                )));
            }

            for &index in &required {
                if row[index].is_empty() {
                    return Err(SearchError::malformed(format!(
                        "empty value in column {:?} at row {row_number}",
                        header[index]
                    )));
                }
            }

            match row[id_col].parse::<u64>() {
                Ok(id) if id > 0 => {}
                _ => {
                    return Err(SearchError::malformed(format!(
                        "row {row_number} has invalid id {:?}, expected a positive integer",
                        row[id_col]
                    )));
                }
            }

            let latitude: f64 = row[lat_col].parse().map_err(|_| {
                SearchError::malformed(format!(
                    "row {row_number} has non-numeric latitude {:?}",
                    row[lat_col]
                ))
            })?;
            let longitude: f64 = row[lng_col].parse().map_err(|_| {
                SearchError::malformed(format!(
                    "row {row_number} has non-numeric longitude {:?}",
                    row[lng_col]
                ))
            })?;
            Coordinate::new(latitude, longitude).map_err(|cause| {
                SearchError::malformed(format!("row {row_number}: {cause}"))
            })?;

            rows.push(row);
        }

        if rows.is_empty() {
            return Err(SearchError::Empty);
        }

        Ok(Self {
            header,
            rows,
            lat_col,
            lng_col,
        })
    }

    /// Column names in file order
    #[must_use]
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Data rows in file order, header excluded
    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of data rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the latitude column within the header
    #[must_use]
    pub fn lat_col(&self) -> usize {
        self.lat_col
    }

    /// Index of the longitude column within the header
    #[must_use]
    pub fn lng_col(&self) -> usize {
        self.lng_col
    }

    /// Coordinate of the row at `index`
    pub fn row_coordinate(&self, index: usize) -> Result<Coordinate, SearchError> {
        let row = self.rows.get(index).ok_or_else(|| {
            SearchError::malformed(format!("row index {index} out of bounds"))
        })?;
        let latitude: f64 = row[self.lat_col]
            .parse()
            .map_err(|_| SearchError::malformed(format!("row {index} has a non-numeric latitude")))?;
        let longitude: f64 = row[self.lng_col]
            .parse()
            .map_err(|_| SearchError::malformed(format!("row {index} has a non-numeric longitude")))?;
        Coordinate::new(latitude, longitude)
            .map_err(|cause| SearchError::malformed(format!("row {index}: {cause}")))
    }
}

/// File identity used to decide whether a cached parse is still current
type DatasetVersion = (Option<SystemTime>, u64);

struct CachedDataset {
    version: DatasetVersion,
    dataset: Arc<Dataset>,
}

/// Re-reading cache around the dataset file
///
/// Every search observes the file as it is on disk at request time, but the
/// parse only happens when the file's mtime or size changed. Readers get an
/// `Arc` snapshot, so a reload never mutates a dataset another request is
/// already working with.
pub struct DatasetCache {
    config: DatasetConfig,
    state: RwLock<Option<CachedDataset>>,
}

impl DatasetCache {
    #[must_use]
    pub fn new(config: DatasetConfig) -> Self {
        Self {
            config,
            state: RwLock::new(None),
        }
    }

    /// Load the dataset, reusing the cached parse when the file is unchanged
    pub async fn load(&self) -> Result<Arc<Dataset>, SearchError> {
        let metadata = tokio::fs::metadata(&self.config.path)
            .await
            .map_err(|cause| self.map_io_error(cause))?;
        let version: DatasetVersion = (metadata.modified().ok(), metadata.len());

        {
            let state = self.state.read().await;
            if let Some(cached) = state.as_ref() {
                if cached.version == version {
                    debug!(path = %self.config.path, "serving dataset from cache");
                    return Ok(Arc::clone(&cached.dataset));
                }
            }
        }

        let mut state = self.state.write().await;
        // Another request may have refreshed the cache while we waited.
        if let Some(cached) = state.as_ref() {
            if cached.version == version {
                return Ok(Arc::clone(&cached.dataset));
            }
        }

        info!(path = %self.config.path, "loading venue dataset");
        let bytes = tokio::fs::read(&self.config.path)
            .await
            .map_err(|cause| self.map_io_error(cause))?;
        let dataset = Arc::new(Dataset::from_csv(&bytes, &self.config)?);
        debug!(
            rows = dataset.len(),
            columns = dataset.header().len(),
            "venue dataset loaded"
        );

        *state = Some(CachedDataset {
            version,
            dataset: Arc::clone(&dataset),
        });
        Ok(dataset)
    }

    fn map_io_error(&self, cause: std::io::Error) -> SearchError {
        if cause.kind() == std::io::ErrorKind::NotFound {
            SearchError::not_found(&self.config.path)
        } else {
            SearchError::unexpected(cause)
        }
    }
}
