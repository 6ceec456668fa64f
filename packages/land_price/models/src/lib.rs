#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared domain types for the land-price reconciliation pipeline.
//!
//! Every stage of the pipeline (schema extraction, address normalization,
//! block matching, aggregation, persistence) exchanges the types defined
//! here, so this crate has no dependencies beyond `serde` and `strum`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

// ── Raw input ────────────────────────────────────────────────────────────

/// A price value exactly as it appeared in a survey extract.
///
/// Depending on the vintage the publisher wrote prices as integers, floats,
/// numeric strings, or placeholder tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RawPrice {
    /// Field absent or JSON `null`.
    Missing,
    /// Numeric value.
    Number(f64),
    /// String value, possibly numeric, possibly a placeholder.
    Text(String),
    /// Boolean value (some vintages write `false` for "no price").
    Flag(bool),
}

impl std::fmt::Display for RawPrice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => Ok(()),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
            Self::Flag(b) => write!(f, "{b}"),
        }
    }
}

/// WGS84 point, usually the centroid of a survey point's geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

/// Optional per-point attributes carried by some survey vintages.
///
/// Every field is independent: a vintage may publish road width but not
/// land use, and individual points frequently leave fields blank.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attributes {
    /// Land area in square meters.
    pub land_area: Option<i64>,
    /// Land-use classification code.
    pub land_use: Option<String>,
    /// Building coverage ratio (percent).
    pub building_coverage: Option<i64>,
    /// Floor area ratio (percent).
    pub floor_area_ratio: Option<i64>,
    /// Frontage road direction.
    pub road_direction: Option<String>,
    /// Frontage road width in meters.
    pub road_width: Option<f64>,
    /// Nearest station name.
    pub nearest_station: Option<String>,
    /// Distance to the nearest station in meters.
    pub station_distance: Option<i64>,
}

impl Attributes {
    /// Overwrites each field of `self` with the corresponding field of
    /// `newer` when `newer` carries a value for it.
    pub fn overlay(&mut self, newer: &Self) {
        fn take<T: Clone>(slot: &mut Option<T>, value: Option<&T>) {
            if let Some(v) = value {
                *slot = Some(v.clone());
            }
        }

        take(&mut self.land_area, newer.land_area.as_ref());
        take(&mut self.land_use, newer.land_use.as_ref());
        take(&mut self.building_coverage, newer.building_coverage.as_ref());
        take(&mut self.floor_area_ratio, newer.floor_area_ratio.as_ref());
        take(&mut self.road_direction, newer.road_direction.as_ref());
        take(&mut self.road_width, newer.road_width.as_ref());
        take(&mut self.nearest_station, newer.nearest_station.as_ref());
        take(&mut self.station_distance, newer.station_distance.as_ref());
    }

    /// Returns `true` if no attribute is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.land_area.is_none()
            && self.land_use.is_none()
            && self.building_coverage.is_none()
            && self.floor_area_ratio.is_none()
            && self.road_direction.is_none()
            && self.road_width.is_none()
            && self.nearest_station.is_none()
            && self.station_distance.is_none()
    }
}

/// One survey point as read from a single year's extract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Survey year (vintage).
    pub survey_year: u16,
    /// Five-digit municipality code.
    pub city_code: String,
    /// Municipality name, when the vintage publishes it.
    pub city_name: Option<String>,
    /// Address exactly as published.
    pub address: String,
    /// Price exactly as published.
    pub price: RawPrice,
    /// Centroid of the point geometry.
    pub coordinates: Option<Coordinates>,
    /// Optional attributes available for this vintage.
    pub attributes: Attributes,
}

// ── Catalog ──────────────────────────────────────────────────────────────

/// A town block from the master catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TownBlock {
    /// Stable block identifier.
    pub block_code: String,
    /// Canonical block name without the parent city (e.g. `"三軒茶屋2丁目"`).
    pub block_name: String,
    /// Parent municipality code.
    pub city_code: String,
    /// Whether the block is currently in use.
    pub active: bool,
}

// ── Normalization & matching ─────────────────────────────────────────────

/// Which generator produced a [`NormalizedAddressCandidate`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CandidateKind {
    /// The address already names the block (`<area><n>丁目`).
    BlockMarker,
    /// Block synthesized from a hyphenated lot number (`<area><n>-...`).
    HyphenSynthesized,
    /// Kanji-numeral rendering of a digit-bearing sibling.
    NumeralVariant,
    /// Leading area name without any block number.
    AreaOnly,
}

/// One alternative canonical rendering of a raw address.
///
/// Lower `rank` means more specific; candidates are always handed to the
/// matcher sorted by rank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedAddressCandidate {
    /// Candidate text.
    pub text: String,
    /// Specificity rank, `0` being the most specific.
    pub rank: u8,
    /// Generator that produced this candidate.
    pub kind: CandidateKind,
}

/// Matching tier that resolved a record.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchTier {
    /// Exact canonical name.
    Exact,
    /// Exact after removing the block-unit marker on both sides.
    MarkerInsensitive,
    /// Substring containment, longest overlap.
    Containment,
}

/// Why a record could not be resolved to a block.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum UnresolvedReason {
    /// The normalizer produced no candidates.
    NoCandidates,
    /// No tier matched any candidate.
    NoMatch,
    /// A tier matched several blocks equally well.
    Ambiguous,
}

/// Result of matching one record against the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchOutcome {
    /// Resolved to exactly one block.
    Resolved {
        /// Catalog block code.
        block_code: String,
        /// Tier that produced the match.
        tier: MatchTier,
        /// Candidate text that matched.
        candidate: String,
    },
    /// No single block could be chosen.
    Unresolved {
        /// Why matching failed.
        reason: UnresolvedReason,
    },
}

impl MatchOutcome {
    /// Returns the resolved block code, if any.
    #[must_use]
    pub fn block_code(&self) -> Option<&str> {
        match self {
            Self::Resolved { block_code, .. } => Some(block_code),
            Self::Unresolved { .. } => None,
        }
    }
}

/// A raw record after matching and price sanitization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedRecord {
    /// Source record.
    pub record: RawRecord,
    /// Match result.
    pub outcome: MatchOutcome,
    /// Best candidate the normalizer produced (used as the disambiguator
    /// when aggregating per address).
    pub normalized_address: Option<String>,
    /// Sanitized price in yen per square meter.
    pub price: Option<i64>,
}

impl MatchedRecord {
    /// Returns the resolved block code, if any.
    #[must_use]
    pub fn block_code(&self) -> Option<&str> {
        self.outcome.block_code()
    }
}

// ── Aggregated output ────────────────────────────────────────────────────

/// Percentage changes of a yearly average against earlier years.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeRates {
    /// Versus the nearest earlier year present in the series.
    pub vs_prior_year: Option<f64>,
    /// Versus the Nth-earlier year present in the series.
    pub vs_n_years_ago: Option<f64>,
    /// Versus the earliest year present in the series.
    pub vs_first_year: Option<f64>,
}

/// One aggregated row per (block, year, disambiguator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedYearlyPrice {
    /// Catalog block code.
    pub block_code: String,
    /// Survey year.
    pub survey_year: u16,
    /// Empty for per-block rows; the normalized address for per-address rows.
    pub disambiguator: String,
    /// Number of survey points in the group.
    pub point_count: u32,
    /// Mean of the non-null prices.
    pub avg_price: Option<f64>,
    /// Minimum non-null price.
    pub min_price: Option<i64>,
    /// Maximum non-null price.
    pub max_price: Option<i64>,
    /// Per-field most recent non-null attribute values.
    pub attributes: Attributes,
    /// Address of the most recently added point in the group.
    pub representative_address: String,
    /// Mean centroid of the points in the group.
    pub coordinates: Option<Coordinates>,
    /// Change rates against earlier years of the same block.
    pub changes: ChangeRates,
}

/// Year-ordered rows for one block (and disambiguator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    /// Catalog block code.
    pub block_code: String,
    /// Disambiguator shared by every row.
    pub disambiguator: String,
    /// Horizon used for `vs_n_years_ago`.
    pub horizon: usize,
    /// Rows sorted by ascending survey year.
    pub rows: Vec<AggregatedYearlyPrice>,
}

/// A record that could not be matched, kept for catalog maintenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedRecord {
    /// Survey year.
    pub survey_year: u16,
    /// Address exactly as published.
    pub raw_address: String,
    /// Price exactly as published, rendered as text.
    pub raw_price: String,
    /// Why the record was not matched.
    pub reason: UnresolvedReason,
}

// ── Run summary ──────────────────────────────────────────────────────────

/// Error taxonomy used to aggregate non-fatal failures across a run.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// No schema profile covers the year; the whole year is skipped.
    UnknownYearProfile,
    /// A record's address matched no catalog block.
    AddressUnmatched,
    /// A record's price could not be used.
    PriceInvalid,
    /// An aggregated row broke `min <= avg <= max` or `count >= 1`.
    AggregationInvariantViolation,
    /// A store write failed after one retry.
    StoreWriteConflict,
    /// The year's extract could not be read.
    SourceUnavailable,
}

/// Counts for one imported year.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearReport {
    /// Survey year.
    pub survey_year: u16,
    /// Records read from the extract (after city filtering).
    pub records_seen: u64,
    /// Records resolved to a block.
    pub records_matched: u64,
    /// Aggregated rows written.
    pub rows_written: u64,
}

/// Per-run summary surfaced to the caller instead of individual errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Years that completed.
    pub years: Vec<YearReport>,
    /// Years that were skipped entirely.
    pub skipped_years: Vec<u16>,
    /// Non-fatal error counts by kind.
    pub errors: BTreeMap<ErrorKind, u64>,
}

impl RunSummary {
    /// Increments the counter for `kind` by `n`.
    pub fn record(&mut self, kind: ErrorKind, n: u64) {
        if n > 0 {
            *self.errors.entry(kind).or_default() += n;
        }
    }

    /// Returns the count recorded for `kind`.
    #[must_use]
    pub fn count(&self, kind: ErrorKind) -> u64 {
        self.errors.get(&kind).copied().unwrap_or(0)
    }

    /// Folds another summary into this one.
    pub fn merge(&mut self, other: Self) {
        self.years.extend(other.years);
        self.skipped_years.extend(other.skipped_years);
        for (kind, n) in other.errors {
            self.record(kind, n);
        }
    }

    /// Total records seen across all completed years.
    #[must_use]
    pub fn records_seen(&self) -> u64 {
        self.years.iter().map(|y| y.records_seen).sum()
    }

    /// Total aggregated rows written across all completed years.
    #[must_use]
    pub fn rows_written(&self) -> u64 {
        self.years.iter().map(|y| y.rows_written).sum()
    }
}
