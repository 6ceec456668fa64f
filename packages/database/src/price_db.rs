//! Reconciled yearly price rows.
//!
//! Rows are keyed by `(block_code, survey_year, disambiguator)`. Each row
//! is written by its own statement so one failing row never rolls back the
//! rest of a batch.

use duckdb::Connection;
use landprice_models::{AggregatedYearlyPrice, ChangeRates, Coordinates};

use crate::DbError;
use crate::store::{ATTRIBUTE_COLUMNS, read_attributes, year_from_sql};

const UPSERT_SQL: &str = "INSERT INTO yearly_prices (
        block_code, survey_year, disambiguator, point_count,
        avg_price, min_price, max_price,
        land_area, land_use, building_coverage, floor_area_ratio,
        road_direction, road_width, nearest_station, station_distance,
        representative_address, latitude, longitude,
        change_vs_prior_year, change_vs_n_years_ago, change_vs_first_year
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT (block_code, survey_year, disambiguator) DO UPDATE SET
        point_count = EXCLUDED.point_count,
        avg_price = EXCLUDED.avg_price,
        min_price = EXCLUDED.min_price,
        max_price = EXCLUDED.max_price,
        land_area = EXCLUDED.land_area,
        land_use = EXCLUDED.land_use,
        building_coverage = EXCLUDED.building_coverage,
        floor_area_ratio = EXCLUDED.floor_area_ratio,
        road_direction = EXCLUDED.road_direction,
        road_width = EXCLUDED.road_width,
        nearest_station = EXCLUDED.nearest_station,
        station_distance = EXCLUDED.station_distance,
        representative_address = EXCLUDED.representative_address,
        latitude = EXCLUDED.latitude,
        longitude = EXCLUDED.longitude,
        change_vs_prior_year = EXCLUDED.change_vs_prior_year,
        change_vs_n_years_ago = EXCLUDED.change_vs_n_years_ago,
        change_vs_first_year = EXCLUDED.change_vs_first_year";

/// Outcome of a batch upsert.
#[derive(Debug, Default)]
pub struct UpsertReport {
    /// Rows written.
    pub written: u64,
    /// Rows that failed, with their key and error.
    pub failed: Vec<(RowKey, DbError)>,
}

/// Natural key of a yearly row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RowKey {
    pub block_code: String,
    pub survey_year: u16,
    pub disambiguator: String,
}

impl From<&AggregatedYearlyPrice> for RowKey {
    fn from(row: &AggregatedYearlyPrice) -> Self {
        Self {
            block_code: row.block_code.clone(),
            survey_year: row.survey_year,
            disambiguator: row.disambiguator.clone(),
        }
    }
}

impl std::fmt::Display for RowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.disambiguator.is_empty() {
            write!(f, "{}/{}", self.block_code, self.survey_year)
        } else {
            write!(
                f,
                "{}/{}/{}",
                self.block_code, self.survey_year, self.disambiguator
            )
        }
    }
}

/// Inserts or updates a single row.
///
/// # Errors
///
/// Returns [`DbError`] if the statement fails.
pub fn upsert_row(conn: &Connection, row: &AggregatedYearlyPrice) -> Result<(), DbError> {
    let a = &row.attributes;
    let c = &row.changes;
    conn.execute(
        UPSERT_SQL,
        duckdb::params![
            row.block_code,
            i32::from(row.survey_year),
            row.disambiguator,
            i64::from(row.point_count),
            row.avg_price,
            row.min_price,
            row.max_price,
            a.land_area,
            a.land_use,
            a.building_coverage,
            a.floor_area_ratio,
            a.road_direction,
            a.road_width,
            a.nearest_station,
            a.station_distance,
            row.representative_address,
            row.coordinates.map(|p| p.latitude),
            row.coordinates.map(|p| p.longitude),
            c.vs_prior_year,
            c.vs_n_years_ago,
            c.vs_first_year,
        ],
    )?;
    Ok(())
}

/// Upserts every row independently and returns how many succeeded.
/// Failures are collected, not propagated.
#[must_use]
pub fn upsert_rows(conn: &Connection, rows: &[AggregatedYearlyPrice]) -> UpsertReport {
    let mut report = UpsertReport::default();
    for row in rows {
        match upsert_row(conn, row) {
            Ok(()) => report.written += 1,
            Err(e) => {
                let key = RowKey::from(row);
                log::warn!("{key}: upsert failed: {e}");
                report.failed.push((key, e));
            }
        }
    }
    report
}

/// Raw column values before range-checked conversion.
struct StoredRow {
    block_code: String,
    survey_year: i32,
    disambiguator: String,
    point_count: i64,
    row: AggregatedYearlyPrice,
}

fn select_sql(filter: &str) -> String {
    format!(
        "SELECT block_code, survey_year, disambiguator, point_count,
                avg_price, min_price, max_price,
                {ATTRIBUTE_COLUMNS},
                representative_address, latitude, longitude,
                change_vs_prior_year, change_vs_n_years_ago, change_vs_first_year
         FROM yearly_prices {filter}
         ORDER BY block_code, disambiguator, survey_year"
    )
}

fn read_row(row: &duckdb::Row<'_>) -> duckdb::Result<StoredRow> {
    let latitude: Option<f64> = row.get(16)?;
    let longitude: Option<f64> = row.get(17)?;
    Ok(StoredRow {
        block_code: row.get(0)?,
        survey_year: row.get(1)?,
        disambiguator: row.get(2)?,
        point_count: row.get(3)?,
        row: AggregatedYearlyPrice {
            block_code: String::new(),
            survey_year: 0,
            disambiguator: String::new(),
            point_count: 0,
            avg_price: row.get(4)?,
            min_price: row.get(5)?,
            max_price: row.get(6)?,
            attributes: read_attributes(row, 7)?,
            representative_address: row.get(15)?,
            coordinates: latitude.zip(longitude).map(|(latitude, longitude)| Coordinates {
                latitude,
                longitude,
            }),
            changes: ChangeRates {
                vs_prior_year: row.get(18)?,
                vs_n_years_ago: row.get(19)?,
                vs_first_year: row.get(20)?,
            },
        },
    })
}

fn finish(stored: StoredRow) -> Result<AggregatedYearlyPrice, DbError> {
    let mut row = stored.row;
    row.block_code = stored.block_code;
    row.survey_year = year_from_sql(stored.survey_year)?;
    row.disambiguator = stored.disambiguator;
    row.point_count = u32::try_from(stored.point_count).map_err(|_| DbError::Conversion {
        message: format!("point_count {} out of range", stored.point_count),
    })?;
    Ok(row)
}

/// Loads the stored series for one block and disambiguator, oldest first.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a stored value is out of range.
pub fn load_series(
    conn: &Connection,
    block_code: &str,
    disambiguator: &str,
) -> Result<Vec<AggregatedYearlyPrice>, DbError> {
    let mut stmt = conn.prepare(&select_sql("WHERE block_code = ? AND disambiguator = ?"))?;
    let stored = stmt
        .query_map([block_code, disambiguator], read_row)?
        .collect::<Result<Vec<_>, _>>()?;
    stored.into_iter().map(finish).collect()
}

/// Loads every stored row, ordered by block, disambiguator, and year.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a stored value is out of range.
pub fn load_all(conn: &Connection) -> Result<Vec<AggregatedYearlyPrice>, DbError> {
    let mut stmt = conn.prepare(&select_sql(""))?;
    let stored = stmt
        .query_map([], read_row)?
        .collect::<Result<Vec<_>, _>>()?;
    stored.into_iter().map(finish).collect()
}

/// Distinct `(block_code, disambiguator)` pairs with stored rows.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn series_keys(conn: &Connection) -> Result<Vec<(String, String)>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT block_code, disambiguator FROM yearly_prices
         ORDER BY block_code, disambiguator",
    )?;
    let keys = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(keys)
}

/// Returns the latest survey year with stored rows, if any.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or the stored year is out of range.
pub fn max_year(conn: &Connection) -> Result<Option<u16>, DbError> {
    let year: Option<i32> =
        conn.query_row("SELECT MAX(survey_year) FROM yearly_prices", [], |row| row.get(0))?;
    year.map(year_from_sql).transpose()
}

/// Returns the number of stored yearly rows.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn row_count(conn: &Connection) -> Result<u64, DbError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM yearly_prices", [], |row| row.get(0))?;
    #[allow(clippy::cast_sign_loss)]
    Ok(count as u64)
}
