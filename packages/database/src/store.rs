//! Connection management, schema, and import bookkeeping.

use std::path::Path;

use duckdb::Connection;
use landprice_models::Attributes;

use crate::DbError;

/// Opens (or creates) the land-price `DuckDB` and ensures the schema exists.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open(path: &Path) -> Result<Connection, DbError> {
    if let Some(parent) = path.parent() {
        crate::paths::ensure_dir(parent)?;
    }

    let conn = Connection::open(path)?;
    create_schema(&conn)?;
    Ok(conn)
}

/// Opens the database at the default path.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open_default() -> Result<Connection, DbError> {
    open(&crate::paths::landprice_db_path())
}

/// Opens a throwaway in-memory database with the schema applied.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open_in_memory() -> Result<Connection, DbError> {
    let conn = Connection::open_in_memory()?;
    create_schema(&conn)?;
    Ok(conn)
}

const TOWN_BLOCKS_DDL: &str = "CREATE TABLE IF NOT EXISTS town_blocks (
    block_code TEXT NOT NULL PRIMARY KEY,
    block_name TEXT NOT NULL,
    city_code TEXT NOT NULL,
    active BOOLEAN NOT NULL DEFAULT TRUE
);";

const POINTS_DDL: &str = "CREATE TABLE IF NOT EXISTS land_price_points (
    survey_year INTEGER NOT NULL,
    ordinal BIGINT NOT NULL,
    original_address TEXT NOT NULL,
    city_code TEXT NOT NULL,
    block_code TEXT,
    match_tier TEXT,
    matched_candidate TEXT,
    raw_price TEXT,
    price BIGINT,
    latitude DOUBLE,
    longitude DOUBLE,
    land_area BIGINT,
    land_use TEXT,
    building_coverage BIGINT,
    floor_area_ratio BIGINT,
    road_direction TEXT,
    road_width DOUBLE,
    nearest_station TEXT,
    station_distance BIGINT,
    PRIMARY KEY (survey_year, ordinal)
);";

pub(crate) const YEARLY_PRICES_DDL: &str = "CREATE TABLE IF NOT EXISTS yearly_prices (
    block_code TEXT NOT NULL,
    survey_year INTEGER NOT NULL,
    disambiguator TEXT NOT NULL DEFAULT '',
    point_count BIGINT NOT NULL,
    avg_price DOUBLE,
    min_price BIGINT,
    max_price BIGINT,
    land_area BIGINT,
    land_use TEXT,
    building_coverage BIGINT,
    floor_area_ratio BIGINT,
    road_direction TEXT,
    road_width DOUBLE,
    nearest_station TEXT,
    station_distance BIGINT,
    representative_address TEXT NOT NULL,
    latitude DOUBLE,
    longitude DOUBLE,
    change_vs_prior_year DOUBLE,
    change_vs_n_years_ago DOUBLE,
    change_vs_first_year DOUBLE,
    PRIMARY KEY (block_code, survey_year, disambiguator)
);";

const UNRESOLVED_DDL: &str = "CREATE TABLE IF NOT EXISTS unresolved_records (
    survey_year INTEGER NOT NULL,
    ordinal BIGINT NOT NULL,
    raw_address TEXT NOT NULL,
    raw_price TEXT,
    reason TEXT NOT NULL,
    PRIMARY KEY (survey_year, ordinal)
);";

const META_DDL: &str = "CREATE TABLE IF NOT EXISTS _meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);";

fn create_schema(conn: &Connection) -> Result<(), DbError> {
    for ddl in [
        TOWN_BLOCKS_DDL,
        POINTS_DDL,
        YEARLY_PRICES_DDL,
        UNRESOLVED_DDL,
        META_DDL,
    ] {
        conn.execute_batch(ddl)?;
    }
    Ok(())
}

// ── Shared column helpers ────────────────────────────────────────────────

/// Attribute columns, in the order [`read_attributes`] expects.
pub(crate) const ATTRIBUTE_COLUMNS: &str = "land_area, land_use, building_coverage, \
     floor_area_ratio, road_direction, road_width, nearest_station, station_distance";

/// Reads the eight [`ATTRIBUTE_COLUMNS`] starting at column `offset`.
pub(crate) fn read_attributes(row: &duckdb::Row<'_>, offset: usize) -> duckdb::Result<Attributes> {
    Ok(Attributes {
        land_area: row.get(offset)?,
        land_use: row.get(offset + 1)?,
        building_coverage: row.get(offset + 2)?,
        floor_area_ratio: row.get(offset + 3)?,
        road_direction: row.get(offset + 4)?,
        road_width: row.get(offset + 5)?,
        nearest_station: row.get(offset + 6)?,
        station_distance: row.get(offset + 7)?,
    })
}

/// Converts a stored `INTEGER` year back to a survey year.
pub(crate) fn year_from_sql(value: i32) -> Result<u16, DbError> {
    u16::try_from(value).map_err(|_| DbError::Conversion {
        message: format!("survey year {value} out of range"),
    })
}

// ── Metadata ─────────────────────────────────────────────────────────────

/// Gets a metadata value from the `_meta` table.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>, DbError> {
    let mut stmt = conn.prepare("SELECT value FROM _meta WHERE key = ?")?;
    let result = stmt.query_row([key], |row| row.get(0));
    match result {
        Ok(v) => Ok(Some(v)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(DbError::DuckDb(e)),
    }
}

/// Sets a metadata value in the `_meta` table.
///
/// # Errors
///
/// Returns [`DbError`] if the upsert fails.
pub fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO _meta (key, value) VALUES (?, ?)
         ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
        duckdb::params![key, value],
    )?;
    Ok(())
}

/// Records that `year` finished importing.
///
/// # Errors
///
/// Returns [`DbError`] if the metadata update fails.
pub fn record_year_imported(conn: &Connection, year: u16) -> Result<(), DbError> {
    let now = chrono::Utc::now().to_rfc3339();
    set_meta(conn, &format!("imported_at:{year}"), &now)?;
    set_meta(conn, "last_imported_at", &now)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent() {
        let conn = open_in_memory().unwrap();
        create_schema(&conn).unwrap();
    }

    #[test]
    fn meta_round_trip_and_overwrite() {
        let conn = open_in_memory().unwrap();
        assert_eq!(get_meta(&conn, "k").unwrap(), None);
        set_meta(&conn, "k", "a").unwrap();
        set_meta(&conn, "k", "b").unwrap();
        assert_eq!(get_meta(&conn, "k").unwrap().as_deref(), Some("b"));
    }

    #[test]
    fn records_import_timestamp() {
        let conn = open_in_memory().unwrap();
        record_year_imported(&conn, 2020).unwrap();
        assert!(get_meta(&conn, "imported_at:2020").unwrap().is_some());
    }
}
