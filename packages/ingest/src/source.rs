//! Decoded survey features.
//!
//! A [`FeatureSource`] turns one year's extract into property maps plus a
//! representative point. [`GeoJsonDirectorySource`] reads `GeoJSON` files
//! laid out by the profile path templates; shapefile vintages are expected
//! to have been converted to `GeoJSON` beforehand.

use std::path::{Path, PathBuf};

use geo::Centroid as _;
use geojson::GeoJson;
use landprice_models::Coordinates;
use landprice_schema::{SchemaProfile, SourceFormat};
use serde_json::{Map, Value};

use crate::IngestError;

/// File extension appended to every path template.
pub const GEOJSON_EXTENSION: &str = "geojson";

/// One surveyed point as published.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurveyFeature {
    /// Raw attribute table row, keyed by publisher field identifier.
    pub properties: Map<String, Value>,
    /// Point location, or the centroid of a non-point geometry.
    pub coordinates: Option<Coordinates>,
}

/// Provides the features of one survey year.
pub trait FeatureSource: Send + Sync {
    /// Reads every feature of `year` using `profile` to locate the extract.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] if the extract is missing or unreadable.
    fn features(&self, year: u16, profile: &SchemaProfile) -> Result<Vec<SurveyFeature>, IngestError>;
}

/// Reads `<root>/<template>.geojson`, trying templates in profile order.
#[derive(Debug, Clone)]
pub struct GeoJsonDirectorySource {
    root: PathBuf,
}

impl GeoJsonDirectorySource {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// First existing extract for `year`.
    #[must_use]
    pub fn locate(&self, year: u16, profile: &SchemaProfile) -> Option<PathBuf> {
        profile
            .path_candidates(year)
            .into_iter()
            .map(|candidate| {
                self.root
                    .join(candidate)
                    .with_extension(GEOJSON_EXTENSION)
            })
            .find(|path| path.is_file())
    }
}

impl FeatureSource for GeoJsonDirectorySource {
    fn features(&self, year: u16, profile: &SchemaProfile) -> Result<Vec<SurveyFeature>, IngestError> {
        let Some(path) = self.locate(year, profile) else {
            return Err(IngestError::SourceNotFound {
                year,
                searched: profile.path_candidates(year),
            });
        };
        if profile.source_format == SourceFormat::Shapefile {
            log::debug!("{year}: reading converted shapefile extract {}", path.display());
        } else {
            log::debug!("{year}: reading {}", path.display());
        }

        let text = std::fs::read_to_string(&path)?;
        parse_features(&text)
    }
}

/// Parses a `GeoJSON` document into features. A bare `Feature` is accepted
/// as a one-element collection.
///
/// # Errors
///
/// Returns [`IngestError::GeoJson`] if the text is not valid `GeoJSON`.
pub fn parse_features(text: &str) -> Result<Vec<SurveyFeature>, IngestError> {
    let features = match text.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(collection) => collection.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(_) => Vec::new(),
    };

    Ok(features
        .into_iter()
        .map(|feature| SurveyFeature {
            coordinates: feature.geometry.and_then(representative_point),
            properties: feature.properties.unwrap_or_default(),
        })
        .collect())
}

fn representative_point(geometry: geojson::Geometry) -> Option<Coordinates> {
    let geometry: geo::Geometry<f64> = geometry.try_into().ok()?;
    let point = geometry.centroid()?;
    Some(Coordinates {
        latitude: point.y(),
        longitude: point.x(),
    })
}
