#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Year-to-schema resolution for land-price survey extracts.
//!
//! The publisher changed both file format and field numbering several times
//! across the survey's history. Rather than sniffing columns, each vintage
//! range is described by an embedded TOML [`SchemaProfile`], and a
//! validated [`ProfileTable`] maps a survey year to exactly one profile.

pub mod extract;
pub mod profile;
pub mod registry;
pub mod table;

pub use extract::extract_record;
pub use profile::{FieldMap, FieldRole, SchemaProfile, SourceFormat};
pub use registry::default_table;
pub use table::ProfileTable;

/// Errors that can occur while loading or resolving schema profiles.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// No profile covers the year.
    #[error("No schema profile covers survey year {year}")]
    UnknownYearProfile {
        /// Requested year.
        year: u16,
    },

    /// The year exists but its layout was never classified.
    #[error("Survey year {year} has an unclassified schema and is skipped")]
    UnclassifiedYear {
        /// Requested year.
        year: u16,
    },

    /// Profile TOML could not be parsed.
    #[error("Profile TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// An embedded profile file failed to parse or validate.
    #[error("Profile {file}.toml: {source}")]
    Profile {
        /// Profile file stem.
        file: String,
        /// Underlying parse or range error.
        #[source]
        source: Box<Self>,
    },

    /// Profiles do not cover the import span exactly once.
    #[error("Profile coverage error: {message}")]
    Coverage {
        /// Description of what went wrong.
        message: String,
    },
}

impl SchemaError {
    /// Returns `true` for years that are expected to be skipped silently
    /// rather than reported as failures.
    #[must_use]
    pub const fn is_skippable(&self) -> bool {
        matches!(self, Self::UnclassifiedYear { .. })
    }
}
