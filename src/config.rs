//! Configuration management for the izakaya search service
//!
//! Handles loading configuration from an optional TOML file and from
//! environment variables, and validates all settings before the service
//! starts serving.

use anyhow::{Context, Result, bail};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure for the search service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Venue dataset settings
    #[serde(default)]
    pub dataset: DatasetConfig,
    /// Geocoding provider settings
    #[serde(default)]
    pub geocoding: GeocodingConfig,
    /// Embedding provider settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Similarity engine settings
    #[serde(default)]
    pub engine: EngineConfig,
    /// Default search behaviour
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port the API listens on
    #[serde(default = "default_server_port")]
    pub port: u16,
}

/// Venue dataset settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Path to the venue CSV file
    #[serde(default = "default_dataset_path")]
    pub path: String,
    /// Header name of the latitude column
    #[serde(default = "default_lat_column")]
    pub lat_column: String,
    /// Header name of the longitude column
    #[serde(default = "default_lng_column")]
    pub lng_column: String,
}

/// Geocoding provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingConfig {
    /// Base URL of the geocoding API
    #[serde(default = "default_geocoding_base_url")]
    pub base_url: String,
    /// API key, not needed for the public Open-Meteo endpoint
    #[serde(default)]
    pub api_key: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_geocoding_timeout")]
    pub timeout_seconds: u32,
}

/// Embedding provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL of the embeddings API
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,
    /// API key for the embeddings provider
    #[serde(default)]
    pub api_key: Option<String>,
    /// Embedding model identifier
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_seconds: u32,
}

/// Similarity engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base URL of the vector search engine
    #[serde(default = "default_engine_base_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_engine_timeout")]
    pub timeout_seconds: u32,
}

/// Default search behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Proximity filter radius in meters
    #[serde(default = "default_radius_meters")]
    pub radius_meters: f64,
    /// Maximum number of venues to return
    #[serde(default = "default_result_count")]
    pub result_count: usize,
}

// Default value functions
fn default_server_port() -> u16 {
    8080
}

fn default_dataset_path() -> String {
    "data/izakaya.csv".to_string()
}

fn default_lat_column() -> String {
    "lat".to_string()
}

fn default_lng_column() -> String {
    "lng".to_string()
}

fn default_geocoding_base_url() -> String {
    "https://geocoding-api.open-meteo.com/v1".to_string()
}

fn default_geocoding_timeout() -> u32 {
    10
}

fn default_embedding_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_timeout() -> u32 {
    30
}

fn default_engine_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_engine_timeout() -> u32 {
    30
}

fn default_radius_meters() -> f64 {
    3000.0
}

fn default_result_count() -> usize {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_server_port(),
        }
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: default_dataset_path(),
            lat_column: default_lat_column(),
            lng_column: default_lng_column(),
        }
    }
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            base_url: default_geocoding_base_url(),
            api_key: None,
            timeout_seconds: default_geocoding_timeout(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_embedding_base_url(),
            api_key: None,
            model: default_embedding_model(),
            timeout_seconds: default_embedding_timeout(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: default_engine_base_url(),
            timeout_seconds: default_engine_timeout(),
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            radius_meters: default_radius_meters(),
            result_count: default_result_count(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            dataset: DatasetConfig::default(),
            geocoding: GeocodingConfig::default(),
            embedding: EmbeddingConfig::default(),
            engine: EngineConfig::default(),
            defaults: DefaultsConfig::default(),
        }
    }
}

impl SearchConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from a specific file path
    ///
    /// Environment variables with the `IZAKAYA_` prefix override file values,
    /// using `__` to separate section from key, e.g. `IZAKAYA_SERVER__PORT`.
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.unwrap_or_else(|| PathBuf::from("config.toml"));
        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix("IZAKAYA")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let config: SearchConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_api_keys()?;
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate API keys and credentials
    fn validate_api_keys(&self) -> Result<()> {
        for (name, key) in [
            ("Geocoding", self.geocoding.api_key.as_deref()),
            ("Embedding", self.embedding.api_key.as_deref()),
        ] {
            let Some(key) = key else { continue };
            if key.is_empty() {
                bail!("{name} API key cannot be empty if provided. Either remove it or provide a valid key.");
            }
            if key.len() < 8 {
                bail!("{name} API key appears to be invalid (too short). Please check your API key.");
            }
            if key.len() > 256 {
                bail!("{name} API key appears to be invalid (too long). Please check your API key.");
            }
        }

        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.server.port == 0 {
            bail!("Server port must be non-zero");
        }

        for (name, timeout) in [
            ("Geocoding", self.geocoding.timeout_seconds),
            ("Embedding", self.embedding.timeout_seconds),
            ("Engine", self.engine.timeout_seconds),
        ] {
            if timeout == 0 {
                bail!("{name} timeout must be at least 1 second");
            }
            if timeout > 300 {
                bail!("{name} timeout cannot exceed 300 seconds");
            }
        }

        if !self.defaults.radius_meters.is_finite() || self.defaults.radius_meters < 0.0 {
            bail!("Search radius must be a non-negative number of meters");
        }
        if self.defaults.radius_meters > 100_000.0 {
            bail!("Search radius cannot exceed 100000 meters");
        }

        if self.defaults.result_count == 0 {
            bail!("Result count must be at least 1");
        }
        if self.defaults.result_count > 100 {
            bail!("Result count cannot exceed 100");
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        if self.dataset.path.is_empty() {
            bail!("Dataset path cannot be empty");
        }

        for (name, column) in [
            ("lat_column", &self.dataset.lat_column),
            ("lng_column", &self.dataset.lng_column),
        ] {
            if column.is_empty() {
                bail!("Dataset {name} cannot be empty");
            }
        }
        if self.dataset.lat_column == self.dataset.lng_column {
            bail!("Dataset lat_column and lng_column must name different columns");
        }

        for (name, url) in [
            ("Geocoding", &self.geocoding.base_url),
            ("Embedding", &self.embedding.base_url),
            ("Engine", &self.engine.base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                bail!("{name} base URL must be a valid HTTP or HTTPS URL");
            }
        }

        Ok(())
    }
}
