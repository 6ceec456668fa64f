//! Schema profile registry: loads the profile table from embedded TOML.
//!
//! Each `.toml` file in `packages/schema/profiles/` is baked into the
//! binary at compile time via [`include_str!`]. Supporting a new vintage
//! layout means adding a TOML file and listing it below.

use crate::SchemaError;
use crate::profile::{SchemaProfile, parse_profile_toml};
use crate::table::{ProfileTable, TableConfig};

/// Import span and unclassified years.
const TABLE_TOML: &str = include_str!("../profiles/table.toml");

/// Profile TOMLs embedded at compile time, oldest first.
const PROFILE_TOMLS: &[(&str, &str)] = &[
    // ── Shapefile vintages ───────────────────────────────────────────
    ("pattern_a", include_str!("../profiles/pattern_a.toml")),
    ("pattern_b", include_str!("../profiles/pattern_b.toml")),
    // ── GeoJSON vintages ─────────────────────────────────────────────
    ("pattern_c", include_str!("../profiles/pattern_c.toml")),
    ("pattern_c_v2", include_str!("../profiles/pattern_c_v2.toml")),
    ("pattern_c_v3", include_str!("../profiles/pattern_c_v3.toml")),
];

/// Returns every embedded profile, parsed.
///
/// # Errors
///
/// Returns [`SchemaError`] naming the file if any embedded TOML is
/// malformed.
pub fn all_profiles() -> Result<Vec<SchemaProfile>, SchemaError> {
    PROFILE_TOMLS
        .iter()
        .map(|(name, toml)| parse_named(name, toml))
        .collect()
}

fn parse_named(name: &str, toml: &str) -> Result<SchemaProfile, SchemaError> {
    parse_profile_toml(toml).map_err(|e| SchemaError::Profile {
        file: name.to_string(),
        source: Box::new(e),
    })
}

/// Builds and validates the embedded [`ProfileTable`].
///
/// # Errors
///
/// Returns [`SchemaError`] if any embedded TOML is malformed or the
/// profiles do not cover the import span exactly once.
pub fn default_table() -> Result<ProfileTable, SchemaError> {
    let config: TableConfig = toml::de::from_str(TABLE_TOML)?;
    ProfileTable::new(config, all_profiles()?)
}
