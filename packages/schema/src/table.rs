//! Year-range lookup table over [`SchemaProfile`]s.
//!
//! The table is validated once when it is built: every year of the import
//! span must be covered by exactly one profile or be explicitly listed as
//! unclassified, and no two profiles may overlap.

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::SchemaError;
use crate::profile::SchemaProfile;

/// Import span and unclassified vintages, parsed from `table.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct TableConfig {
    /// First year of the import span.
    pub first_year: u16,
    /// Last year of the import span.
    pub last_year: u16,
    /// Years whose layout is unknown and must be skipped.
    #[serde(default)]
    pub unclassified_years: Vec<u16>,
}

/// Validated, ordered table of schema profiles.
#[derive(Debug, Clone)]
pub struct ProfileTable {
    first_year: u16,
    last_year: u16,
    profiles: Vec<SchemaProfile>,
    unclassified: BTreeSet<u16>,
}

impl ProfileTable {
    /// Builds a table, sorting profiles by start year and checking coverage.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Coverage`] if two profiles overlap, if a year
    /// in the span is neither covered nor unclassified, or if an
    /// unclassified year is also covered by a profile.
    pub fn new(config: TableConfig, mut profiles: Vec<SchemaProfile>) -> Result<Self, SchemaError> {
        if config.first_year > config.last_year {
            return Err(SchemaError::Coverage {
                message: format!(
                    "import span {}..={} is inverted",
                    config.first_year, config.last_year
                ),
            });
        }

        profiles.sort_by_key(|p| p.start_year);

        for pair in profiles.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if b.start_year <= a.end_year {
                return Err(SchemaError::Coverage {
                    message: format!(
                        "profiles {} ({}..={}) and {} ({}..={}) overlap",
                        a.id, a.start_year, a.end_year, b.id, b.start_year, b.end_year
                    ),
                });
            }
        }

        let unclassified: BTreeSet<u16> = config.unclassified_years.into_iter().collect();

        let mut gaps = Vec::new();
        for year in config.first_year..=config.last_year {
            let covered = profiles.iter().any(|p| p.covers(year));
            match (covered, unclassified.contains(&year)) {
                (true, true) => {
                    return Err(SchemaError::Coverage {
                        message: format!("{year} is both unclassified and covered by a profile"),
                    });
                }
                (false, false) => gaps.push(year),
                _ => {}
            }
        }

        if !gaps.is_empty() {
            return Err(SchemaError::Coverage {
                message: format!("years without a profile: {gaps:?}"),
            });
        }

        Ok(Self {
            first_year: config.first_year,
            last_year: config.last_year,
            profiles,
            unclassified,
        })
    }

    /// Returns the profile for `year`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnclassifiedYear`] for years listed as
    /// unclassified and [`SchemaError::UnknownYearProfile`] for years no
    /// profile covers.
    pub fn resolve(&self, year: u16) -> Result<&SchemaProfile, SchemaError> {
        if self.unclassified.contains(&year) {
            return Err(SchemaError::UnclassifiedYear { year });
        }
        self.profiles
            .iter()
            .find(|p| p.covers(year))
            .ok_or(SchemaError::UnknownYearProfile { year })
    }

    /// Profiles in ascending year order.
    #[must_use]
    pub fn profiles(&self) -> &[SchemaProfile] {
        &self.profiles
    }

    /// Years listed as unclassified.
    #[must_use]
    pub const fn unclassified(&self) -> &BTreeSet<u16> {
        &self.unclassified
    }

    /// Inclusive import span.
    #[must_use]
    pub const fn span(&self) -> (u16, u16) {
        (self.first_year, self.last_year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::parse_profile_toml;

    fn profile(id: &str, start: u16, end: u16) -> SchemaProfile {
        parse_profile_toml(&format!(
            r#"
            id = "{id}"
            start_year = {start}
            end_year = {end}
            source_format = "SHAPEFILE"
            path_templates = []
            [fields]
            city_code = "c"
            address = "a"
            price = "p"
            "#
        ))
        .unwrap()
    }

    fn config(first: u16, last: u16, unclassified: Vec<u16>) -> TableConfig {
        TableConfig {
            first_year: first,
            last_year: last,
            unclassified_years: unclassified,
        }
    }

    #[test]
    fn resolves_by_year_range_regardless_of_input_order() {
        let table = ProfileTable::new(
            config(2000, 2005, vec![]),
            vec![profile("b", 2003, 2005), profile("a", 2000, 2002)],
        )
        .unwrap();
        assert_eq!(table.resolve(2000).unwrap().id, "a");
        assert_eq!(table.resolve(2002).unwrap().id, "a");
        assert_eq!(table.resolve(2003).unwrap().id, "b");
        assert_eq!(table.profiles()[0].id, "a");
    }

    #[test]
    fn unknown_year_outside_span() {
        let table =
            ProfileTable::new(config(2000, 2002, vec![]), vec![profile("a", 2000, 2002)]).unwrap();
        assert!(matches!(
            table.resolve(1999),
            Err(SchemaError::UnknownYearProfile { year: 1999 })
        ));
    }

    #[test]
    fn rejects_overlap() {
        let err = ProfileTable::new(
            config(2000, 2005, vec![]),
            vec![profile("a", 2000, 2003), profile("b", 2003, 2005)],
        )
        .unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn rejects_gap() {
        let err = ProfileTable::new(
            config(2000, 2005, vec![]),
            vec![profile("a", 2000, 2001), profile("b", 2004, 2005)],
        )
        .unwrap_err();
        assert!(err.to_string().contains("[2002, 2003]"));
    }

    #[test]
    fn unclassified_year_fills_gap_and_is_skippable() {
        let table = ProfileTable::new(
            config(2000, 2002, vec![2001]),
            vec![profile("a", 2000, 2000), profile("b", 2002, 2002)],
        )
        .unwrap();
        let err = table.resolve(2001).unwrap_err();
        assert!(matches!(err, SchemaError::UnclassifiedYear { year: 2001 }));
        assert!(err.is_skippable());
    }

    #[test]
    fn rejects_unclassified_year_that_is_covered() {
        assert!(
            ProfileTable::new(config(2000, 2000, vec![2000]), vec![profile("a", 2000, 2000)])
                .is_err()
        );
    }
}
