//! Import settings.
//!
//! Resolution order, later wins: built-in defaults, `landprice.toml`,
//! `LANDPRICE_*` environment variables, then whatever the caller (usually
//! CLI flags) sets on the returned struct.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use landprice_aggregate::{DEFAULT_HORIZON, Grouping};
use serde::Deserialize;

use crate::IngestError;

/// Config file looked up in the working directory when no path is given.
pub const CONFIG_FILE_NAME: &str = "landprice.toml";

/// Settings for one import run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImportConfig {
    /// `DuckDB` file holding the catalog and reconciled rows.
    pub db_path: PathBuf,
    /// Directory the profile path templates are resolved against.
    pub data_dir: PathBuf,
    /// Municipality whose records are imported.
    pub city_code: String,
    /// Prefixes stripped from raw addresses, in order.
    pub city_prefixes: Vec<String>,
    /// Positional look-back for the N-years-ago change rate.
    pub horizon: usize,
    /// Concurrent block writers per year.
    pub workers: usize,
    /// First survey year of the default import range.
    pub first_year: u16,
    /// Last survey year of the default import range.
    pub last_year: u16,
    /// Row granularity.
    pub grouping: Grouping,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            db_path: landprice_database::paths::landprice_db_path(),
            data_dir: landprice_database::paths::raw_dir(),
            city_code: "13112".to_string(),
            city_prefixes: vec!["東京都".to_string(), "世田谷区".to_string()],
            horizon: DEFAULT_HORIZON,
            workers: 8,
            first_year: 2000,
            last_year: 2025,
            grouping: Grouping::Block,
        }
    }
}

impl ImportConfig {
    /// Loads settings from `path`, or from [`CONFIG_FILE_NAME`] in the
    /// working directory if it exists, then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] if an explicitly given file is missing, a
    /// file is not valid TOML, or an override does not parse.
    pub fn load(path: Option<&Path>) -> Result<Self, IngestError> {
        let config = match path {
            Some(path) => Self::from_toml_str(&std::fs::read_to_string(path)?)?,
            None => {
                let default_path = Path::new(CONFIG_FILE_NAME);
                if default_path.is_file() {
                    log::debug!("Reading {}", default_path.display());
                    Self::from_toml_str(&std::fs::read_to_string(default_path)?)?
                } else {
                    Self::default()
                }
            }
        };

        config.with_overrides(|key| std::env::var(key).ok())
    }

    /// Parses settings from TOML; omitted keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Toml`] if the TOML is malformed or names an
    /// unknown key.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, IngestError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()
    }

    /// Applies `LANDPRICE_DB`, `LANDPRICE_DATA_DIR`, `LANDPRICE_CITY_CODE`,
    /// `LANDPRICE_CITY_PREFIXES` (comma separated) and `LANDPRICE_WORKERS`
    /// as returned by `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Config`] if `LANDPRICE_WORKERS` is not a
    /// positive integer.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, IngestError> {
        if let Some(db) = lookup("LANDPRICE_DB") {
            self.db_path = PathBuf::from(db);
        }
        if let Some(dir) = lookup("LANDPRICE_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        let prefixes: Vec<String> = lookup("LANDPRICE_CITY_PREFIXES")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if let Some(code) = lookup("LANDPRICE_CITY_CODE") {
            self = self.with_city(&code, prefixes)?;
        } else if !prefixes.is_empty() {
            self.city_prefixes = prefixes;
        }
        if let Some(workers) = lookup("LANDPRICE_WORKERS") {
            self.workers = workers.trim().parse().map_err(|_| IngestError::Config {
                message: format!("LANDPRICE_WORKERS must be a positive integer, got {workers:?}"),
            })?;
        }
        self.validate()
    }

    /// Switches the imported municipality. Non-empty `prefixes` replace the
    /// configured ones; otherwise the old prefixes are kept and a changed
    /// city is warned about, since addresses of another municipality will
    /// not lose their ward prefix.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Config`] if `code` is empty.
    pub fn with_city(mut self, code: &str, prefixes: Vec<String>) -> Result<Self, IngestError> {
        let code = code.trim();
        if prefixes.is_empty() {
            if code != self.city_code {
                log::warn!(
                    "City changed from {} to {code} but prefixes are still {:?}; pass --prefix or set city_prefixes",
                    self.city_code,
                    self.city_prefixes
                );
            }
        } else {
            self.city_prefixes = prefixes;
        }
        self.city_code = code.to_string();
        self.validate()
    }

    /// Default year range.
    #[must_use]
    pub const fn years(&self) -> RangeInclusive<u16> {
        self.first_year..=self.last_year
    }

    fn validate(self) -> Result<Self, IngestError> {
        let invalid = |message: String| Err(IngestError::Config { message });
        if self.workers == 0 {
            return invalid("workers must be at least 1".to_string());
        }
        if self.first_year > self.last_year {
            return invalid(format!(
                "first_year {} is after last_year {}",
                self.first_year, self.last_year
            ));
        }
        if self.city_code.is_empty() {
            return invalid("city_code must not be empty".to_string());
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_setagaya() {
        let config = ImportConfig::default();
        assert_eq!(config.city_code, "13112");
        assert_eq!(config.city_prefixes, vec!["東京都", "世田谷区"]);
        assert_eq!(config.horizon, 5);
        assert_eq!(config.years(), 2000..=2025);
    }

    #[test]
    fn toml_overrides_only_given_keys() {
        let config = ImportConfig::from_toml_str(
            "city_code = \"13113\"\ncity_prefixes = [\"東京都\", \"渋谷区\"]\ngrouping = \"block-and-address\"\n",
        )
        .unwrap();
        assert_eq!(config.city_code, "13113");
        assert_eq!(config.grouping, Grouping::BlockAndAddress);
        assert_eq!(config.workers, 8);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            ImportConfig::from_toml_str("citycode = \"1\"\n"),
            Err(IngestError::Toml(_))
        ));
    }

    #[test]
    fn environment_wins_over_file() {
        let config = ImportConfig::from_toml_str("workers = 2\n")
            .unwrap()
            .with_overrides(|key| match key {
                "LANDPRICE_WORKERS" => Some("16".to_string()),
                "LANDPRICE_DB" => Some("/tmp/x.duckdb".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.workers, 16);
        assert_eq!(config.db_path, PathBuf::from("/tmp/x.duckdb"));
    }

    #[test]
    fn switching_city_takes_new_prefixes() {
        let config = ImportConfig::default()
            .with_city("13113", vec!["東京都".to_string(), "渋谷区".to_string()])
            .unwrap();
        assert_eq!(config.city_code, "13113");
        assert_eq!(config.city_prefixes, vec!["東京都", "渋谷区"]);

        let kept = ImportConfig::default().with_city(" 13113 ", Vec::new()).unwrap();
        assert_eq!(kept.city_code, "13113");
        assert_eq!(kept.city_prefixes, vec!["東京都", "世田谷区"]);

        assert!(ImportConfig::default().with_city("", Vec::new()).is_err());
    }

    #[test]
    fn city_prefixes_come_from_the_environment() {
        let config = ImportConfig::default()
            .with_overrides(|key| match key {
                "LANDPRICE_CITY_CODE" => Some("13113".to_string()),
                "LANDPRICE_CITY_PREFIXES" => Some("東京都, 渋谷区,".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.city_code, "13113");
        assert_eq!(config.city_prefixes, vec!["東京都", "渋谷区"]);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let result = ImportConfig::default().with_overrides(|key| {
            (key == "LANDPRICE_WORKERS").then(|| "0".to_string())
        });
        assert!(matches!(result, Err(IngestError::Config { .. })));
    }

    #[test]
    fn inverted_year_range_is_rejected() {
        assert!(ImportConfig::from_toml_str("first_year = 2020\nlast_year = 2010\n").is_err());
    }
}
