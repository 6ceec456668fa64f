//! Schema profile definitions parsed from TOML.
//!
//! A [`SchemaProfile`] says which literal field identifier carries each
//! logical role in one contiguous range of survey years, and where that
//! year's extract lives relative to the data directory.

use serde::Deserialize;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use crate::SchemaError;

/// Logical role a field plays in a survey record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, AsRefStr, EnumIter,
)]
#[strum(serialize_all = "camelCase")]
pub enum FieldRole {
    /// Municipality code.
    CityCode,
    /// Municipality name.
    CityName,
    /// Street address.
    Address,
    /// Published price.
    Price,
    /// Land area.
    LandArea,
    /// Land-use code.
    LandUse,
    /// Building coverage ratio.
    BuildingCoverage,
    /// Floor area ratio.
    FloorAreaRatio,
    /// Frontage road direction.
    RoadDirection,
    /// Frontage road width.
    RoadWidth,
    /// Nearest station.
    NearestStation,
    /// Distance to the nearest station.
    StationDistance,
}

/// On-disk format the publisher used for a vintage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceFormat {
    /// ESRI shapefile (converted to `GeoJSON` before import).
    Shapefile,
    /// `GeoJSON` feature collection.
    GeoJson,
}

/// Role-to-identifier map. Only `city_code` and `address` are mandatory;
/// a vintage without prices leaves `price` unset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldMap {
    pub city_code: String,
    #[serde(default)]
    pub city_name: Option<String>,
    pub address: String,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub land_area: Option<String>,
    #[serde(default)]
    pub land_use: Option<String>,
    #[serde(default)]
    pub building_coverage: Option<String>,
    #[serde(default)]
    pub floor_area_ratio: Option<String>,
    #[serde(default)]
    pub road_direction: Option<String>,
    #[serde(default)]
    pub road_width: Option<String>,
    #[serde(default)]
    pub nearest_station: Option<String>,
    #[serde(default)]
    pub station_distance: Option<String>,
}

impl FieldMap {
    /// Returns the field identifier for `role`, if this profile maps it.
    #[must_use]
    pub fn get(&self, role: FieldRole) -> Option<&str> {
        match role {
            FieldRole::CityCode => Some(&self.city_code),
            FieldRole::Address => Some(&self.address),
            FieldRole::CityName => self.city_name.as_deref(),
            FieldRole::Price => self.price.as_deref(),
            FieldRole::LandArea => self.land_area.as_deref(),
            FieldRole::LandUse => self.land_use.as_deref(),
            FieldRole::BuildingCoverage => self.building_coverage.as_deref(),
            FieldRole::FloorAreaRatio => self.floor_area_ratio.as_deref(),
            FieldRole::RoadDirection => self.road_direction.as_deref(),
            FieldRole::RoadWidth => self.road_width.as_deref(),
            FieldRole::NearestStation => self.nearest_station.as_deref(),
            FieldRole::StationDistance => self.station_distance.as_deref(),
        }
    }
}

/// Field layout valid for an inclusive range of survey years.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SchemaProfile {
    /// Profile identifier (e.g. `"pattern_c"`).
    pub id: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// First year covered (inclusive).
    pub start_year: u16,
    /// Last year covered (inclusive).
    pub end_year: u16,
    /// Publisher file format.
    pub source_format: SourceFormat,
    /// Extract locations relative to the data directory, without extension.
    /// Tried in order; `{year}` and `{yy}` are substituted.
    pub path_templates: Vec<String>,
    /// Field identifiers.
    pub fields: FieldMap,
}

impl SchemaProfile {
    /// Returns `true` if this profile covers `year`.
    #[must_use]
    pub const fn covers(&self, year: u16) -> bool {
        self.start_year <= year && year <= self.end_year
    }

    /// Renders the path templates for `year`, in preference order.
    #[must_use]
    pub fn path_candidates(&self, year: u16) -> Vec<String> {
        let yy = format!("{:02}", year % 100);
        self.path_templates
            .iter()
            .map(|t| t.replace("{year}", &year.to_string()).replace("{yy}", &yy))
            .collect()
    }
}

/// Parses a [`SchemaProfile`] from a TOML string and checks its year range.
///
/// # Errors
///
/// Returns [`SchemaError::Toml`] if the TOML is malformed or missing
/// required fields, or [`SchemaError::Coverage`] if the range is inverted.
pub fn parse_profile_toml(toml_str: &str) -> Result<SchemaProfile, SchemaError> {
    let profile: SchemaProfile = toml::de::from_str(toml_str)?;
    if profile.start_year > profile.end_year {
        return Err(SchemaError::Coverage {
            message: format!(
                "{}: start_year {} is after end_year {}",
                profile.id, profile.start_year, profile.end_year
            ),
        });
    }
    if profile.fields.city_code.is_empty() || profile.fields.address.is_empty() {
        return Err(SchemaError::Coverage {
            message: format!("{}: city_code and address must be mapped", profile.id),
        });
    }
    Ok(profile)
}
