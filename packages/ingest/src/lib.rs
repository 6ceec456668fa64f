#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Imports land-price survey years into the reconciled store.
//!
//! For each year, in ascending order: resolve the schema profile, read the
//! extract, keep the configured city, normalize and match addresses against
//! the town-block catalog, sanitize prices, aggregate per block, annotate
//! change rates against the stored series, and upsert. Blocks within a year
//! are written concurrently; years are not.

pub mod config;
pub mod import;
pub mod progress;
pub mod recompute;
pub mod source;

pub use config::ImportConfig;
pub use import::Importer;
pub use recompute::{RecomputeReport, load_time_series, recompute};
pub use source::{FeatureSource, GeoJsonDirectorySource, SurveyFeature};

use landprice_database::DbError;
use landprice_models::ErrorKind;
use landprice_schema::SchemaError;

/// Errors that can occur while importing.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Profile resolution or loading failed.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Store access failed.
    #[error(transparent)]
    Database(#[from] DbError),

    /// I/O error reading an extract or config file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Extract is not valid `GeoJSON`.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// Config file is not valid TOML.
    #[error("Config TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A blocking worker panicked or was cancelled.
    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// No extract exists for the year.
    #[error("No extract found for {year} (searched {searched:?})")]
    SourceNotFound {
        /// Survey year.
        year: u16,
        /// Relative paths tried, in order.
        searched: Vec<String>,
    },

    /// Invalid configuration value.
    #[error("Config error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },
}

impl IngestError {
    /// Summary bucket for a failure that stopped a whole year, if any.
    #[must_use]
    pub const fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Schema(SchemaError::UnknownYearProfile { .. }) => {
                Some(ErrorKind::UnknownYearProfile)
            }
            Self::SourceNotFound { .. } | Self::Io(_) | Self::GeoJson(_) => {
                Some(ErrorKind::SourceUnavailable)
            }
            Self::Database(_) => Some(ErrorKind::StoreWriteConflict),
            Self::Schema(_) | Self::Toml(_) | Self::Join(_) | Self::Config { .. } => None,
        }
    }
}
